//! The local-filesystem `Traverser`.
//!
//! Grounded on `conserve::live_tree`'s recursive-descent, apath-ordered
//! directory walk; the stack-based descent and single-file-first-class
//! handling are carried over directly, with the symlink tri-state policy
//! and cycle detection added since local is the only backend with symlinks.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::location::ResourceRef;
use crate::monitor::Counter;
use crate::stored_object::{BlobProps, ContentProps, EntityType, FolderPropertyOption, StoredObject};
use crate::traverse::{Error, ObjectSink, Result, SinkDecision, SymlinkPolicy, Traverser, TraverseOptions};

pub struct LocalTraverser {
    root: PathBuf,
    symlink_policy: SymlinkPolicy,
    folder_option: FolderPropertyOption,
}

impl LocalTraverser {
    pub fn new(resource: &ResourceRef, symlink_policy: SymlinkPolicy, folder_option: FolderPropertyOption) -> Self {
        LocalTraverser {
            root: PathBuf::from(&resource.object_key),
            symlink_policy,
            folder_option,
        }
    }

    fn relative_of(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn stored_object_for(relative_path: String, entry_path: &Path, metadata: &fs::Metadata) -> StoredObject {
    let name = entry_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entity_type = if metadata.is_dir() { EntityType::Folder } else { EntityType::File };
    let last_modified = metadata.modified().map(OffsetDateTime::from).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    StoredObject {
        name,
        relative_path,
        entity_type,
        last_modified,
        size: metadata.len(),
        content_md5: None,
        content_props: ContentProps::default(),
        blob_props: BlobProps::default(),
        metadata: Default::default(),
        container_name: String::new(),
        version_id: None,
    }
}

#[async_trait]
impl Traverser for LocalTraverser {
    async fn is_directory(&self, must_exist: bool) -> Result<bool> {
        match fs::metadata(&self.root) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if must_exist {
                    Err(Error::Io(e))
                } else {
                    Ok(false)
                }
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn traverse(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()> {
        // Single-file-syntactic resource: stat first, emit one, terminate.
        let root_metadata = fs::metadata(&self.root)?;

        if !root_metadata.is_dir() {
            let object = stored_object_for(String::new(), &self.root, &root_metadata);
            opts.monitor.count(Counter::ObjectsEnumerated, 1);
            if opts.filters.passes(&object) {
                let mut object = object;
                opts.preprocessor.apply(&mut object);
                return dispatch_one(object, opts, sink).await;
            }
            opts.monitor.count(Counter::ObjectsFiltered, 1);
            return Ok(());
        }

        if self.folder_option.admits(true) {
            let root_object = stored_object_for(String::new(), &self.root, &root_metadata);
            dispatch_one(root_object, opts, sink).await?;
        }

        let mut visited = HashSet::new();
        if let Ok(canonical) = fs::canonicalize(&self.root) {
            visited.insert(canonical);
        }

        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            if opts.cancelled.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    opts.monitor.problem(crate::monitor::Problem::ObjectError {
                        path: dir.to_string_lossy().into_owned(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            for entry in entries {
                let entry = entry?;
                let path = entry.path();
                let metadata = entry.symlink_metadata()?;

                if metadata.file_type().is_symlink() {
                    match self.symlink_policy {
                        SymlinkPolicy::Skip => continue,
                        SymlinkPolicy::Preserve => {
                            let object = stored_object_for(self.relative_of(&path), &path, &metadata);
                            opts.monitor.count(Counter::ObjectsEnumerated, 1);
                            if opts.filters.passes(&object) {
                                let mut object = object;
                                opts.preprocessor.apply(&mut object);
                                dispatch_one(object, opts, sink).await?;
                            } else {
                                opts.monitor.count(Counter::ObjectsFiltered, 1);
                            }
                            continue;
                        }
                        SymlinkPolicy::Follow => {
                            let Ok(target_metadata) = fs::metadata(&path) else {
                                continue;
                            };
                            if target_metadata.is_dir() {
                                let Ok(canonical) = fs::canonicalize(&path) else {
                                    continue;
                                };
                                if !visited.insert(canonical) {
                                    // Cycle: this directory was already visited
                                    // through another path.
                                    continue;
                                }
                                if opts.recursive {
                                    stack.push(path);
                                }
                                continue;
                            }
                            let object = stored_object_for(self.relative_of(&path), &path, &target_metadata);
                            opts.monitor.count(Counter::ObjectsEnumerated, 1);
                            if opts.filters.passes(&object) {
                                let mut object = object;
                                opts.preprocessor.apply(&mut object);
                                dispatch_one(object, opts, sink).await?;
                            } else {
                                opts.monitor.count(Counter::ObjectsFiltered, 1);
                            }
                            continue;
                        }
                    }
                }

                if metadata.is_dir() {
                    let relative_path = self.relative_of(&path);
                    if self.folder_option.admits(false) {
                        let object = stored_object_for(relative_path, &path, &metadata);
                        opts.monitor.count(Counter::ObjectsEnumerated, 1);
                        if opts.filters.passes(&object) {
                            let mut object = object;
                            opts.preprocessor.apply(&mut object);
                            dispatch_one(object, opts, sink).await?;
                        } else {
                            opts.monitor.count(Counter::ObjectsFiltered, 1);
                        }
                    }
                    if opts.recursive {
                        stack.push(path);
                    }
                    continue;
                }

                let object = stored_object_for(self.relative_of(&path), &path, &metadata);
                opts.monitor.count(Counter::ObjectsEnumerated, 1);
                if opts.filters.passes(&object) {
                    let mut object = object;
                    opts.preprocessor.apply(&mut object);
                    dispatch_one(object, opts, sink).await?;
                } else {
                    opts.monitor.count(Counter::ObjectsFiltered, 1);
                }
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
