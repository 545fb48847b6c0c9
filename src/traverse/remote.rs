//! The generic remote `Traverser`: one implementation driving any
//! `BackendAdapter` (Blob, File, BlobFS, S3, or the in-memory mock), the
//! way `conserve::transport::Transport` is dispatched as a trait object per
//! backend rather than reimplemented per transport.

use std::sync::Arc;

use async_trait::async_trait;
use globset::{Glob, GlobSetBuilder};

use crate::backend::{BackendAdapter, ListOptions};
use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;
use crate::monitor::Counter;
use crate::stored_object::{EntityType, FolderPropertyOption, StoredObject};
use crate::traverse::{split_wildcard, Error, ObjectSink, Result, SinkDecision, Traverser, TraverseOptions};

pub struct RemoteTraverser {
    adapter: Arc<dyn BackendAdapter>,
    resource: ResourceRef,
    credential: CredentialDescriptor,
    folder_option: FolderPropertyOption,
}

impl RemoteTraverser {
    pub fn new(
        adapter: Arc<dyn BackendAdapter>,
        resource: ResourceRef,
        credential: CredentialDescriptor,
        folder_option: FolderPropertyOption,
    ) -> Self {
        RemoteTraverser {
            adapter,
            resource,
            credential,
            folder_option,
        }
    }

    /// Service-level search: enumerate buckets/containers matching the
    /// container-name pattern, then list each one in turn.
    async fn traverse_account(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
        let container_pattern = self.resource.container.clone().unwrap_or_default();
        let list_prefix = container_pattern.split('*').next().unwrap_or_default().to_owned();
        let buckets = self
            .adapter
            .list_account(&self.resource, &self.credential, &list_prefix)
            .await?;

        let matcher = if container_pattern.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            builder.add(Glob::new(&container_pattern).map_err(|e| {
                Error::Aborted(format!("invalid container pattern '{container_pattern}': {e}"))
            })?);
            Some(builder.build().map_err(|e| Error::Aborted(e.to_string()))?)
        };

        for bucket in buckets {
            if opts.cancelled.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            if let Some(set) = &matcher {
                if !set.is_match(&bucket.name) {
                    continue;
                }
            }
            let mut child_resource = self.resource.clone_with_container(&bucket.name);
            child_resource.object_key.clear();
            let delegate = RemoteTraverser::new(
                Arc::clone(&self.adapter),
                child_resource,
                self.credential.clone(),
                self.folder_option,
            );
            delegate.traverse(opts, sink).await?;
        }
        Ok(())
    }

    async fn traverse_container(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
        let caps = self.adapter.capabilities();

        let split = split_wildcard(&self.resource.object_key);
        let (list_prefix, relative_root) = match &split {
            Some(s) => (s.list_prefix.clone(), s.relative_root.clone()),
            None => (self.resource.object_key.clone(), self.resource.object_key.clone()),
        };
        let matcher = split.map(|s| {
            let mut builder = GlobSetBuilder::new();
            builder.add(Glob::new(&s.match_pattern).expect("validated wildcard pattern"));
            builder.build().expect("validated wildcard pattern")
        });

        if caps.folders_are_first_class && self.folder_option.admits(true) && list_prefix.is_empty() {
            let root = StoredObject {
                name: String::new(),
                relative_path: String::new(),
                entity_type: EntityType::Folder,
                last_modified: time::OffsetDateTime::UNIX_EPOCH,
                size: 0,
                content_md5: None,
                content_props: Default::default(),
                blob_props: Default::default(),
                metadata: Default::default(),
                container_name: self.resource.container.clone().unwrap_or_default(),
                version_id: None,
            };
            dispatch_one(root, opts, sink).await?;
        }

        let list_opts = ListOptions {
            recursive: opts.recursive,
            ..Default::default()
        };
        let mut continuation: Option<String> = None;
        loop {
            if opts.cancelled.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let page = self
                .adapter
                .list_container_page(
                    &self.resource,
                    &self.credential,
                    &list_prefix,
                    continuation.as_deref(),
                    &list_opts,
                )
                .await?;
            for mut object in page.objects {
                if self.adapter.is_folder_placeholder(&object) && !caps.folders_are_first_class {
                    continue;
                }
                object.entity_type = if self.adapter.is_folder_placeholder(&object) {
                    EntityType::Folder
                } else {
                    object.entity_type
                };
                if object.entity_type == EntityType::Folder && !self.folder_option.admits(object.is_root_folder()) {
                    continue;
                }
                if let Some(set) = &matcher {
                    if !set.is_match(&object.relative_path) {
                        continue;
                    }
                }
                if let Some(root) = strip_root(&object.relative_path, &relative_root) {
                    object.relative_path = root;
                } else {
                    continue;
                }
                opts.monitor.count(Counter::ObjectsEnumerated, 1);
                if !opts.filters.passes(&object) {
                    opts.monitor.count(Counter::ObjectsFiltered, 1);
                    continue;
                }
                opts.preprocessor.apply(&mut object);
                dispatch_one(object, opts, sink).await?;
            }
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        Ok(())
    }
}

async fn dispatch_one(object: StoredObject, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
    let path = object.relative_path.clone();
    match sink.accept(object).await {
        Ok(SinkDecision::Continue) => Ok(()),
        Ok(SinkDecision::Skip) => {
            opts.monitor.problem(crate::monitor::Problem::ObjectError {
                path,
                message: "processor requested skip".to_owned(),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Strip `relative_root` (a `/`-joined prefix) from `path`, returning `None`
/// if `path` does not fall under it.
fn strip_root(path: &str, relative_root: &str) -> Option<String> {
    if relative_root.is_empty() {
        return Some(path.to_owned());
    }
    path.strip_prefix(relative_root)
        .map(|rest| rest.trim_start_matches('/').to_owned())
}

#[async_trait]
impl Traverser for RemoteTraverser {
    async fn is_directory(&self, must_exist: bool) -> Result<bool> {
        if self.resource.is_service_level() || self.resource.is_bucket_level() {
            return Ok(true);
        }
        if self.resource.is_directory_syntactic() {
            return Ok(true);
        }
        match self.adapter.stat_object(&self.resource, &self.credential).await {
            Ok(crate::backend::StatOutcome::Found(object)) => Ok(object.entity_type == EntityType::Folder),
            Ok(crate::backend::StatOutcome::NotFound) => {
                if must_exist {
                    Err(Error::Backend(crate::backend::Error::NotFound {
                        path: self.resource.redacted(),
                    }))
                } else {
                    Ok(false)
                }
            }
            Err(e) => Err(Error::Backend(e)),
        }
    }

    async fn traverse(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
        if self.resource.is_service_level() {
            return self.traverse_account(opts, sink).await;
        }

        if self.resource.is_object_level() && !self.resource.is_directory_syntactic() {
            match self.adapter.stat_object(&self.resource, &self.credential).await? {
                crate::backend::StatOutcome::Found(mut object) => {
                    if object.name.is_empty() {
                        object.name = self
                            .resource
                            .object_key
                            .rsplit('/')
                            .next()
                            .unwrap_or_default()
                            .to_owned();
                    }
                    if object.relative_path.is_empty() {
                        object.relative_path = object.name.clone();
                    }
                    if object.entity_type == EntityType::File {
                        opts.monitor.count(Counter::ObjectsEnumerated, 1);
                        if opts.filters.passes(&object) {
                            opts.preprocessor.apply(&mut object);
                            return dispatch_one(object, opts, sink).await;
                        }
                        opts.monitor.count(Counter::ObjectsFiltered, 1);
                        return Ok(());
                    }
                    // Found a folder at an object-level, non-syntactic
                    // reference: fall through to a container-scoped listing.
                }
                crate::backend::StatOutcome::NotFound => {
                    return Err(Error::Backend(crate::backend::Error::NotFound {
                        path: self.resource.redacted(),
                    }));
                }
            }
        }

        self.traverse_container(opts, sink).await
    }
}
