//! Azure Files (share) Backend Adapter.
//!
//! Azure Files folders are first-class (unlike Blob), so this adapter never
//! needs a placeholder-metadata convention. It is layered on
//! `azure_common`'s Blob-control-plane helpers as a deliberate
//! simplification: a production build would instead use
//! `azure_storage_files_share`, which this pack does not carry. Recorded in
//! `DESIGN.md`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backend::{azure_common, BackendAdapter, BucketItem, Capabilities, ListOptions, ListPage, Result, StatOutcome};
use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;

#[derive(Debug, Default)]
pub struct FileAdapter;

impl FileAdapter {
    pub fn new() -> Self {
        FileAdapter
    }
}

#[async_trait]
impl BackendAdapter for FileAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            folders_are_first_class: true,
            supports_metadata: true,
            supports_trailing_dot: true,
            supports_versions: false,
            supports_hierarchical_list: true,
        }
    }

    async fn list_container_page(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        prefix: &str,
        continuation: Option<&str>,
        opts: &ListOptions,
    ) -> Result<ListPage> {
        azure_common::list_container_page(resource, credential, prefix, continuation, opts).await
    }

    async fn list_account(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        container_prefix: &str,
    ) -> Result<Vec<BucketItem>> {
        azure_common::list_account(resource, credential, container_prefix).await
    }

    async fn stat_object(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<StatOutcome> {
        azure_common::stat_object(resource, credential).await
    }

    async fn create_container(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        azure_common::create_container(resource, credential, metadata).await
    }

    async fn delete_object(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
        azure_common::delete_object(resource, credential).await
    }

    async fn delete_container(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
        azure_common::delete_container(resource, credential).await
    }
}
