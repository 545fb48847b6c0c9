//! Amazon S3 Backend Adapter.
//!
//! `spec.md` scopes S3 to source-only use, but the adapter implements the
//! full contract since the Backend Adapter trait does not distinguish
//! source/destination roles; the Command Dispatcher is what enforces the
//! source-only restriction (`spec.md` §4.7).
//!
//! Grounded on `conserve::transport::s3::S3Transport`'s use of
//! `list_objects_v2().into_paginator()`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use time::OffsetDateTime;
use tracing::trace;

use crate::backend::{
    BackendAdapter, BucketItem, Capabilities, Error, ListOptions, ListPage, Result, StatOutcome,
};
use crate::credential::{CredentialDescriptor, CredentialKind};
use crate::location::ResourceRef;
use crate::stored_object::{BlobProps, ContentProps, EntityType, StoredObject};

#[derive(Debug, Default)]
pub struct S3Adapter;

impl S3Adapter {
    pub fn new() -> Self {
        S3Adapter
    }

    async fn client(credential: &CredentialDescriptor) -> Result<aws_sdk_s3::Client> {
        let mut loader = aws_config::from_env();
        if let CredentialKind::S3Access {
            access_key_id,
            secret_ref,
        } = &credential.kind
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_ref.expose().to_owned(),
                None,
                None,
                "azcopy-core",
            ));
        }
        let config = loader.load().await;
        Ok(aws_sdk_s3::Client::new(&config))
    }

    fn bucket_of(resource: &ResourceRef) -> Result<String> {
        resource.container.clone().ok_or_else(|| Error::Request {
            path: resource.raw.clone(),
            message: "S3 URL is missing a bucket name".to_owned(),
        })
    }
}

#[async_trait]
impl BackendAdapter for S3Adapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            folders_are_first_class: false,
            supports_metadata: false,
            supports_trailing_dot: false,
            supports_versions: true,
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
        let client = Self::client(credential).await?;
        let bucket = Self::bucket_of(resource)?;

        let mut request = client.list_objects_v2().bucket(&bucket).prefix(prefix);
        if !opts.recursive {
            request = request.delimiter("/");
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }
        let response = request.send().await.map_err(|e| Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        })?;

        let mut objects = Vec::new();
        for object in response.contents() {
            let key = object.key().unwrap_or_default();
            trace!(%key, "S3 object");
            objects.push(StoredObject {
                name: key.rsplit('/').next().unwrap_or(key).to_owned(),
                // Relative to the bucket root, not to `prefix`: the
                // traverser layer strips any further listing/wildcard root.
                relative_path: key.to_owned(),
                entity_type: EntityType::File,
                last_modified: object
                    .last_modified()
                    .and_then(|t| OffsetDateTime::from_unix_timestamp(t.secs()).ok())
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
                size: object.size().unwrap_or_default() as u64,
                content_md5: None,
                content_props: ContentProps::default(),
                blob_props: BlobProps::default(),
                metadata: HashMap::new(),
                container_name: bucket.clone(),
                // list_objects_v2 does not return per-object version IDs;
                // only `stat_object`'s head_object call can populate this.
                version_id: None,
            });
        }
        for common_prefix in response.common_prefixes() {
            if let Some(p) = common_prefix.prefix() {
                let name = p.trim_end_matches('/');
                objects.push(StoredObject {
                    name: name.rsplit('/').next().unwrap_or(name).to_owned(),
                    relative_path: name.to_owned(),
                    entity_type: EntityType::Folder,
                    last_modified: OffsetDateTime::UNIX_EPOCH,
                    size: 0,
                    content_md5: None,
                    content_props: ContentProps::default(),
                    blob_props: BlobProps::default(),
                    metadata: HashMap::new(),
                    container_name: bucket.clone(),
                    version_id: None,
                });
            }
        }

        Ok(ListPage {
            objects,
            continuation: response.next_continuation_token().map(str::to_owned),
        })
    }

    async fn list_account(
        &self,
        _resource: &ResourceRef,
        credential: &CredentialDescriptor,
        container_prefix: &str,
    ) -> Result<Vec<BucketItem>> {
        let client = Self::client(credential).await?;
        let response = client.list_buckets().send().await.map_err(|e| Error::Request {
            path: "s3://".to_owned(),
            message: e.to_string(),
        })?;
        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .filter(|name| name.starts_with(container_prefix))
            .map(|name| BucketItem { name: name.to_owned() })
            .collect())
    }

    async fn stat_object(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<StatOutcome> {
        let client = Self::client(credential).await?;
        let bucket = Self::bucket_of(resource)?;
        match client
            .head_object()
            .bucket(&bucket)
            .key(&resource.object_key)
            .send()
            .await
        {
            Ok(head) => Ok(StatOutcome::Found(StoredObject {
                name: resource.object_key.rsplit('/').next().unwrap_or(&resource.object_key).to_owned(),
                relative_path: resource.object_key.clone(),
                entity_type: EntityType::File,
                last_modified: head
                    .last_modified()
                    .and_then(|t| OffsetDateTime::from_unix_timestamp(t.secs()).ok())
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
                size: head.content_length().unwrap_or_default() as u64,
                content_md5: None,
                content_props: ContentProps {
                    content_type: head.content_type().map(str::to_owned),
                    content_encoding: head.content_encoding().map(str::to_owned),
                    cache_control: head.cache_control().map(str::to_owned),
                    content_md5: None,
                },
                blob_props: BlobProps::default(),
                metadata: head.metadata().cloned().unwrap_or_default(),
                container_name: bucket,
                version_id: head.version_id().map(str::to_owned),
            })),
            Err(e) if is_not_found(&e) => Ok(StatOutcome::NotFound),
            Err(e) => Err(Error::Request {
                path: resource.raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    async fn create_container(
        &self,
        resource: &ResourceRef,
        credential: &CredentialDescriptor,
        _metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let client = Self::client(credential).await?;
        let bucket = Self::bucket_of(resource)?;
        match client.create_bucket().bucket(&bucket).send().await {
            Ok(_) => Ok(()),
            // BucketAlreadyOwnedByYou / BucketAlreadyExists are success.
            Err(e) if e.to_string().to_lowercase().contains("already") => Ok(()),
            Err(e) => Err(Error::Request {
                path: resource.raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    async fn delete_object(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
        let client = Self::client(credential).await?;
        let bucket = Self::bucket_of(resource)?;
        client
            .delete_object()
            .bucket(&bucket)
            .key(&resource.object_key)
            .send()
            .await
            .map_err(|e| Error::Request {
                path: resource.raw.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_container(&self, resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
        let client = Self::client(credential).await?;
        let bucket = Self::bucket_of(resource)?;
        match client.delete_bucket().bucket(&bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("nosuchbucket") => Ok(()),
            Err(e) => Err(Error::Request {
                path: resource.raw.clone(),
                message: e.to_string(),
            }),
        }
    }
}

fn is_not_found(error: &impl std::fmt::Display) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("not found") || message.contains("404")
}
