//! Azure Blob Storage Backend Adapter.
//!
//! Blob containers have no native folders: directories are represented by
//! zero-length placeholder blobs carrying the `hdi_isfolder=true` metadata
//! key (`spec.md` §6). File-mode listings filter them out; folder-aware
//! traversals re-emit them as folder `StoredObject`s.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backend::{
    azure_common, BackendAdapter, BucketItem, Capabilities, ListOptions, ListPage, Result,
    StatOutcome,
};
use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;
use crate::stored_object::{StoredObject, HDI_ISFOLDER_KEY};

#[derive(Debug, Default)]
pub struct BlobAdapter;

impl BlobAdapter {
    pub fn new() -> Self {
        BlobAdapter
    }
}

#[async_trait]
impl BackendAdapter for BlobAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            folders_are_first_class: false,
            supports_metadata: true,
            supports_trailing_dot: false,
            supports_versions: true,
            supports_hierarchical_list: false,
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
        let mut page = azure_common::list_container_page(resource, credential, prefix, continuation, opts).await?;
        if !opts.recursive {
            // Non-recursive listings should not surface folder placeholders
            // as regular files; callers that want folders ask for them
            // explicitly via the traverser's folder-aware mode.
            page.objects.retain(|o| !self.is_folder_placeholder(o));
        }
        Ok(page)
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

    fn is_folder_placeholder(&self, object: &StoredObject) -> bool {
        object
            .metadata
            .get(HDI_ISFOLDER_KEY)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}
