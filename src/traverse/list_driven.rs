//! List-driven traversal (`spec.md` §4.4, final paragraph): a meta-traverser
//! consuming a queue of child paths under one parent `ResourceRef`, used to
//! back `--list-of-files`/`--include-path`-style enumeration where the set
//! of top-level entries to visit is supplied rather than discovered.

use async_trait::async_trait;

use crate::backend::BackendAdapter;
use crate::credential::CredentialDescriptor;
use crate::location::{Location, ResourceRef};
use crate::stored_object::FolderPropertyOption;
use crate::traverse::local::LocalTraverser;
use crate::traverse::remote::RemoteTraverser;
use crate::traverse::{ObjectSink, Preprocessor, Result, SymlinkPolicy, Traverser, TraverseOptions};

/// Rewrites every emitted object's `relative_path` to `child + "/" +
/// object.relative_path`, so the destination tree mirrors the source tree
/// under each listed child.
struct ChildPrefixPreprocessor<'a> {
    child: &'a str,
    inner: &'a dyn Preprocessor,
}

impl Preprocessor for ChildPrefixPreprocessor<'_> {
    fn apply(&self, object: &mut crate::stored_object::StoredObject) {
        self.inner.apply(object);
        object.relative_path = if object.relative_path.is_empty() {
            self.child.to_owned()
        } else {
            format!("{}/{}", self.child, object.relative_path)
        };
    }
}

pub struct ListDrivenTraverser {
    location: Location,
    adapter: Option<std::sync::Arc<dyn BackendAdapter>>,
    parent: ResourceRef,
    credential: CredentialDescriptor,
    children: Vec<String>,
    symlink_policy: SymlinkPolicy,
    folder_option: FolderPropertyOption,
}

impl ListDrivenTraverser {
    pub fn new(
        location: Location,
        adapter: Option<std::sync::Arc<dyn BackendAdapter>>,
        parent: ResourceRef,
        credential: CredentialDescriptor,
        children: Vec<String>,
        symlink_policy: SymlinkPolicy,
        folder_option: FolderPropertyOption,
    ) -> Self {
        ListDrivenTraverser {
            location,
            adapter,
            parent,
            credential,
            children,
            symlink_policy,
            folder_option,
        }
    }

    fn child_resource(&self, child: &str) -> ResourceRef {
        if self.location == Location::Local {
            let joined = format!("{}/{}", self.parent.object_key.trim_end_matches('/'), child);
            let mut resource = self.parent.clone();
            resource.object_key = joined;
            resource
        } else {
            let mut resource = self.parent.clone_with_container(self.parent.container.as_deref().unwrap_or_default());
            let base = self.parent.object_key.trim_end_matches('/');
            resource.object_key = if base.is_empty() {
                child.to_owned()
            } else {
                format!("{base}/{child}")
            };
            resource
        }
    }

    async fn sub_traverser_for(&self, child_resource: &ResourceRef) -> Box<dyn Traverser> {
        if self.location == Location::Local {
            Box::new(LocalTraverser::new(child_resource, self.symlink_policy, self.folder_option))
        } else {
            let adapter = self.adapter.clone().expect("remote locations carry an adapter");
            Box::new(RemoteTraverser::new(
                adapter,
                child_resource.clone(),
                self.credential.clone(),
                self.folder_option,
            ))
        }
    }
}

#[async_trait]
impl Traverser for ListDrivenTraverser {
    async fn is_directory(&self, _must_exist: bool) -> Result<bool> {
        // A list-driven resource always denotes a directory-like parent:
        // the queue of children is only meaningful against one.
        Ok(true)
    }

    async fn traverse(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
        for child in &self.children {
            if opts.cancelled.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(crate::traverse::Error::Cancelled);
            }
            let child_resource = self.child_resource(child);
            let sub = self.sub_traverser_for(&child_resource).await;

            let is_dir = sub.is_directory(false).await?;
            if is_dir && !opts.recursive {
                continue;
            }

            let child_preprocessor = ChildPrefixPreprocessor {
                child,
                inner: opts.preprocessor,
            };
            let child_opts = TraverseOptions {
                recursive: opts.recursive,
                filters: opts.filters,
                monitor: opts.monitor,
                preprocessor: &child_preprocessor,
                cancelled: opts.cancelled,
            };
            sub.traverse(&child_opts, sink).await?;
        }
        Ok(())
    }
}
