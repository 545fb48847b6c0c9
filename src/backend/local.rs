//! Local filesystem Backend Adapter.
//!
//! Grounded on `conserve::transport::local::LocalTransport`: a root path
//! plus straightforward `std::fs` calls underneath a narrow trait.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::backend::{
    BackendAdapter, BucketItem, Capabilities, Error, ListOptions, ListPage, Result, StatOutcome,
};
use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;
use crate::stored_object::{BlobProps, ContentProps, EntityType, StoredObject};

#[derive(Debug, Default)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub fn new() -> Self {
        LocalAdapter
    }

    fn root_path(resource: &ResourceRef) -> PathBuf {
        PathBuf::from(&resource.object_key)
    }
}

fn entity_type_of(metadata: &fs::Metadata) -> EntityType {
    if metadata.is_dir() {
        EntityType::Folder
    } else {
        EntityType::File
    }
}

fn stored_object_for(root: &Path, entry_path: &Path, metadata: fs::Metadata) -> std::io::Result<StoredObject> {
    let relative_path = entry_path
        .strip_prefix(root)
        .unwrap_or(entry_path)
        .to_string_lossy()
        .replace('\\', "/");
    let name = entry_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let last_modified = metadata
        .modified()
        .map(OffsetDateTime::from)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    Ok(StoredObject {
        name,
        relative_path,
        entity_type: entity_type_of(&metadata),
        last_modified,
        size: metadata.len(),
        content_md5: None,
        content_props: ContentProps::default(),
        blob_props: BlobProps::default(),
        metadata: HashMap::new(),
        container_name: String::new(),
        version_id: None,
    })
}

#[async_trait]
impl BackendAdapter for LocalAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            folders_are_first_class: true,
            supports_metadata: false,
            supports_trailing_dot: true,
            supports_versions: false,
            supports_hierarchical_list: true,
        }
    }

    async fn list_container_page(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        prefix: &str,
        _continuation: Option<&str>,
        opts: &ListOptions,
    ) -> Result<ListPage> {
        let root = Self::root_path(resource);
        let dir = if prefix.is_empty() {
            root.clone()
        } else {
            root.join(prefix)
        };
        let mut objects = Vec::new();
        list_dir_shallow(&root, &dir, opts.recursive, &mut objects).map_err(|e| Error::Request {
            path: dir.to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;
        // Local listing never paginates: one call returns everything under
        // `prefix` (bounded by what fits in memory, same contract as
        // `conserve::transport::local` reading whole directories at once).
        Ok(ListPage {
            objects,
            continuation: None,
        })
    }

    async fn list_account(
        &self,
        _resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        _container_prefix: &str,
    ) -> Result<Vec<BucketItem>> {
        // The local filesystem has no service/account level above a root
        // directory; a single pseudo-bucket represents the root.
        Ok(vec![BucketItem {
            name: String::new(),
        }])
    }

    async fn stat_object(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
    ) -> Result<StatOutcome> {
        let path = Self::root_path(resource);
        match fs::symlink_metadata(&path) {
            Ok(metadata) => Ok(StatOutcome::Found(stored_object_for(
                path.parent().unwrap_or(&path),
                &path,
                metadata,
            )?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatOutcome::NotFound),
            Err(e) => Err(Error::Request {
                path: path.to_string_lossy().into_owned(),
                message: e.to_string(),
            }),
        }
    }

    async fn create_container(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        _metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let path = Self::root_path(resource);
        fs::create_dir_all(&path).or_else(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Ok(())
            } else {
                Err(Error::Request {
                    path: path.to_string_lossy().into_owned(),
                    message: e.to_string(),
                })
            }
        })
    }

    async fn delete_object(&self, resource: &ResourceRef, _credential: &CredentialDescriptor) -> Result<()> {
        let path = Self::root_path(resource);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Request {
                path: path.to_string_lossy().into_owned(),
                message: e.to_string(),
            }),
        }
    }

    async fn delete_container(&self, resource: &ResourceRef, _credential: &CredentialDescriptor) -> Result<()> {
        let path = Self::root_path(resource);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Request {
                path: path.to_string_lossy().into_owned(),
                message: e.to_string(),
            }),
        }
    }
}

/// Read `dir`'s entries; when `recursive`, descend into subdirectories too.
/// Mirrors the non-recursive/recursive duality of `conserve::live_tree`'s
/// deque-based walk, but flattened into a plain recursive helper since the
/// local adapter returns one page synchronously.
fn list_dir_shallow(
    root: &Path,
    dir: &Path,
    recursive: bool,
    out: &mut Vec<StoredObject>,
) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let path = entry.path();
            out.push(stored_object_for(root, &path, metadata.clone())?);
            if metadata.is_dir() && recursive {
                stack.push(path);
            }
        }
    }
    Ok(())
}
