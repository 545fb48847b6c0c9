//! The `StoredObject` entity: one enumerated source or destination entity,
//! file or folder (`spec.md` §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of entity a `StoredObject` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    File,
    Folder,
}

/// Policy controlling whether folder entities enter the enumerated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderPropertyOption {
    NoFolders,
    AllFolders,
    AllFoldersExceptRoot,
}

impl FolderPropertyOption {
    /// Whether a folder-entity `StoredObject` at `is_root` should be kept,
    /// assuming the source+destination pair is folder-aware to begin with.
    pub fn admits(self, is_root: bool) -> bool {
        match self {
            FolderPropertyOption::NoFolders => false,
            FolderPropertyOption::AllFolders => true,
            FolderPropertyOption::AllFoldersExceptRoot => !is_root,
        }
    }
}

/// MIME/cache/content-MD5 properties, optional per object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProps {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    pub content_md5: Option<Vec<u8>>,
}

/// Blob-type/tier/lease-state properties, optional per object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProps {
    pub blob_type: Option<String>,
    pub access_tier: Option<String>,
    pub lease_state: Option<String>,
}

/// One enumerated source or destination entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    /// Leaf name.
    pub name: String,
    /// Path relative to the traversal root, always `/`-separated, never
    /// empty except for a root folder entity.
    pub relative_path: String,
    pub entity_type: EntityType,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub size: u64,
    pub content_md5: Option<Vec<u8>>,
    pub content_props: ContentProps,
    pub blob_props: BlobProps,
    pub metadata: HashMap<String, String>,
    pub container_name: String,
    pub version_id: Option<String>,
}

/// The reserved metadata key Blob-family adapters use to mark an
/// HDFS-style empty-folder placeholder blob. Wire-visible, must be
/// preserved bit-exact (`spec.md` §6).
pub const HDI_ISFOLDER_KEY: &str = "hdi_isfolder";

/// The POSIX folder marker metadata key, also wire-visible.
pub const POSIX_FOLDER_KEY: &str = "is_symlink_placeholder_dir";

impl StoredObject {
    pub fn is_folder_placeholder(&self) -> bool {
        self.metadata
            .get(HDI_ISFOLDER_KEY)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn is_root_folder(&self) -> bool {
        self.entity_type == EntityType::Folder && self.relative_path.is_empty()
    }
}
