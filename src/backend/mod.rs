//! Backend Adapter (`spec.md` §4.3): the capability set each backend
//! implements. The core depends only on this contract, never on a
//! specific cloud SDK directly outside of an adapter module.

pub mod local;
pub mod mock;

pub mod azure_common;
pub mod blob;
pub mod blobfs;
pub mod file;
pub mod s3;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;
use crate::stored_object::StoredObject;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{path}' does not exist")]
    NotFound { path: String },

    #[error("backend request for '{path}' failed: {message}")]
    Request { path: String, message: String },

    #[error("backend request for '{path}' was throttled or timed out after retrying")]
    RetriesExhausted { path: String },

    #[error("credential rejected by backend: {0}")]
    Credential(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Distinguishes "does not exist" from other errors (network, auth),
/// surfaced separately so traversers and `StatObject` callers can branch on
/// it without string-matching an error message.
#[derive(Debug)]
pub enum StatOutcome {
    Found(StoredObject),
    NotFound,
}

/// Options controlling one `ListContainer` call.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub metadata_requested: bool,
    pub recursive: bool,
    pub segment_size: usize,
}

/// One page of a `ListContainer` call, honoring a continuation token.
#[derive(Debug, Default)]
pub struct ListPage {
    pub objects: Vec<StoredObject>,
    pub continuation: Option<String>,
}

/// One entry from a service-level (`ListAccount`) enumeration: a bucket,
/// container, share, or filesystem name.
#[derive(Debug, Clone)]
pub struct BucketItem {
    pub name: String,
}

/// Static capability descriptor for one backend.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub folders_are_first_class: bool,
    pub supports_metadata: bool,
    pub supports_trailing_dot: bool,
    pub supports_versions: bool,
    pub supports_hierarchical_list: bool,
}

/// The capability set each backend implements. Implementations MUST honor
/// continuation tokens and emit each object exactly once per logical
/// listing (across however many pages it takes).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// List one page of a container/share/bucket/filesystem under `prefix`.
    async fn list_container_page(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        prefix: &str,
        continuation: Option<&str>,
        opts: &ListOptions,
    ) -> Result<ListPage>;

    /// Service-level enumeration of buckets/containers matching
    /// `container_prefix`.
    async fn list_account(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        container_prefix: &str,
    ) -> Result<Vec<BucketItem>>;

    /// Stat a single object, distinguishing "does not exist" from other
    /// errors.
    async fn stat_object(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
    ) -> Result<StatOutcome>;

    /// Idempotent: "already exists" and "forbidden but bucket exists" are
    /// both treated as success by implementations.
    async fn create_container(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    async fn delete_object(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
    ) -> Result<()>;

    async fn delete_container(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
    ) -> Result<()>;

    /// Folder semantics: adapters that represent directories via a reserved
    /// metadata key MUST expose this predicate so file-mode listings can
    /// filter placeholders, and folder-aware traversals can re-emit them.
    fn is_folder_placeholder(&self, object: &StoredObject) -> bool {
        object.is_folder_placeholder()
    }
}
