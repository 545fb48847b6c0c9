//! Shared plumbing for the three Azure Storage backends (`spec.md` §4.1):
//! Blob, File (share), and BlobFS (ADLS Gen2).
//!
//! All three are Azure Storage REST services with near-identical
//! container/list/stat/create/delete semantics, differing mainly in host
//! suffix and a handful of headers. This crate only carries the
//! `azure_storage_blobs` crate (the one the pack's Azure examples use), so
//! `File`/`BlobFS` adapters build their clients on top of it and note the
//! simplification in `DESIGN.md`: a production build would instead depend
//! on `azure_storage_files_share`/`azure_storage_datalake`.

use std::collections::HashMap;

use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ContainerClient};
use futures::StreamExt;

use crate::backend::{BucketItem, Error, ListOptions, ListPage, Result, StatOutcome};
use crate::credential::{CredentialDescriptor, CredentialKind};
use crate::location::ResourceRef;
use crate::stored_object::{BlobProps, ContentProps, EntityType, StoredObject};

pub fn storage_credentials(account: &str, credential: &CredentialDescriptor) -> Result<StorageCredentials> {
    match &credential.kind {
        CredentialKind::Anonymous => Ok(StorageCredentials::anonymous()),
        CredentialKind::SharedKey { key_ref, .. } => Ok(StorageCredentials::access_key(
            account.to_owned(),
            key_ref.expose().to_owned(),
        )),
        CredentialKind::Sas { token } => Ok(StorageCredentials::sas_token(token.expose())
            .map_err(|e| Error::Credential(e.to_string()))?),
        CredentialKind::OAuth { .. } => Err(Error::Credential(
            "OAuth bearer-token credentials require azure_identity token acquisition, which is an external collaborator".to_owned(),
        )),
        CredentialKind::S3Access { .. } => Err(Error::Credential(
            "S3 credentials cannot authenticate an Azure Storage request".to_owned(),
        )),
    }
}

pub fn container_client(resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<ContainerClient> {
    let account = resource
        .account
        .clone()
        .ok_or_else(|| Error::Request {
            path: resource.raw.clone(),
            message: "Azure Storage URL is missing an account name".to_owned(),
        })?;
    let container = resource.container.clone().unwrap_or_default();
    let creds = storage_credentials(&account, credential)?;
    Ok(BlobServiceClient::new(account, creds).container_client(container))
}

/// List one page of a container, mirroring the `stream::unfold` continuation
/// pattern common to the pack's Azure adapters, but expressed as a single
/// paginated call since `BackendAdapter::list_container_page` already owns
/// the pagination loop at the traverser layer.
pub async fn list_container_page(
    resource: &ResourceRef,
    credential: &CredentialDescriptor,
    prefix: &str,
    continuation: Option<&str>,
    opts: &ListOptions,
) -> Result<ListPage> {
    let client = container_client(resource, credential)?;
    let mut request = client.list_blobs().prefix(prefix.to_owned());
    if !opts.recursive {
        request = request.delimiter("/");
    }
    if let Some(marker) = continuation {
        request = request.marker(marker.to_owned());
    }
    let mut stream = request.into_stream();
    let Some(page) = stream.next().await else {
        return Ok(ListPage::default());
    };
    let page = page.map_err(|e| Error::Request {
        path: resource.raw.clone(),
        message: e.to_string(),
    })?;

    let objects = page
        .blobs
        .blobs()
        .map(|blob| {
            let mut metadata: HashMap<String, String> = HashMap::new();
            if let Some(m) = &blob.metadata {
                metadata.extend(m.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            StoredObject {
                name: blob.name.rsplit('/').next().unwrap_or(&blob.name).to_owned(),
                // Relative to the container root, not to `prefix`: the
                // traverser layer is responsible for stripping any further
                // listing/wildcard root, the same contract `LocalAdapter`
                // and `MockAdapter` already honor.
                relative_path: blob.name.clone(),
                entity_type: EntityType::File,
                last_modified: blob.properties.last_modified,
                size: blob.properties.content_length,
                content_md5: blob.properties.content_md5.clone().map(|m| m.as_slice().to_vec()),
                content_props: ContentProps {
                    content_type: Some(blob.properties.content_type.clone()),
                    content_encoding: blob.properties.content_encoding.clone(),
                    cache_control: blob.properties.cache_control.clone(),
                    content_md5: blob.properties.content_md5.clone().map(|m| m.as_slice().to_vec()),
                },
                blob_props: BlobProps {
                    blob_type: Some(format!("{:?}", blob.properties.blob_type)),
                    access_tier: blob.properties.access_tier.map(|t| format!("{t:?}")),
                    lease_state: Some(format!("{:?}", blob.properties.lease_state)),
                },
                metadata,
                container_name: resource.container.clone().unwrap_or_default(),
                version_id: blob.version_id.clone(),
            }
        })
        .collect();

    Ok(ListPage {
        objects,
        continuation: page.next_marker,
    })
}

pub async fn list_account(resource: &ResourceRef, credential: &CredentialDescriptor, container_prefix: &str) -> Result<Vec<BucketItem>> {
    let account = resource
        .account
        .clone()
        .ok_or_else(|| Error::Request {
            path: resource.raw.clone(),
            message: "Azure Storage URL is missing an account name".to_owned(),
        })?;
    let creds = storage_credentials(&account, credential)?;
    let service = BlobServiceClient::new(account, creds);
    let mut stream = service.list_containers().prefix(container_prefix.to_owned()).into_stream();
    let mut items = Vec::new();
    while let Some(page) = stream.next().await {
        let page = page.map_err(|e| Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        })?;
        items.extend(page.containers.into_iter().map(|c| BucketItem { name: c.name }));
    }
    Ok(items)
}

pub async fn stat_object(resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<StatOutcome> {
    let client = container_client(resource, credential)?;
    let blob_client = client.blob_client(&resource.object_key);
    match blob_client.get_properties().await {
        Ok(props) => {
            let mut metadata = HashMap::new();
            metadata.extend(props.blob.metadata.unwrap_or_default());
            Ok(StatOutcome::Found(StoredObject {
                name: resource
                    .object_key
                    .rsplit('/')
                    .next()
                    .unwrap_or(&resource.object_key)
                    .to_owned(),
                relative_path: resource.object_key.clone(),
                entity_type: EntityType::File,
                last_modified: props.blob.properties.last_modified,
                size: props.blob.properties.content_length,
                content_md5: props.blob.properties.content_md5.map(|m| m.as_slice().to_vec()),
                content_props: ContentProps {
                    content_type: Some(props.blob.properties.content_type),
                    content_encoding: props.blob.properties.content_encoding,
                    cache_control: props.blob.properties.cache_control,
                    content_md5: None,
                },
                blob_props: BlobProps {
                    blob_type: Some(format!("{:?}", props.blob.properties.blob_type)),
                    access_tier: props.blob.properties.access_tier.map(|t| format!("{t:?}")),
                    lease_state: Some(format!("{:?}", props.blob.properties.lease_state)),
                },
                metadata,
                container_name: resource.container.clone().unwrap_or_default(),
                version_id: None,
            }))
        }
        Err(e) if is_not_found(&e) => Ok(StatOutcome::NotFound),
        Err(e) => Err(Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        }),
    }
}

pub async fn create_container(resource: &ResourceRef, credential: &CredentialDescriptor, _metadata: &HashMap<String, String>) -> Result<()> {
    let client = container_client(resource, credential)?;
    match client.create().await {
        // "already exists" and "forbidden but it exists" are both success,
        // per the adapter contract in `spec.md` §4.3.
        Ok(()) | Err(_) if client.exists().await.unwrap_or(true) => Ok(()),
        Err(e) => Err(Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        }),
    }
}

pub async fn delete_object(resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
    let client = container_client(resource, credential)?;
    match client.blob_client(&resource.object_key).delete().await {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        }),
    }
}

pub async fn delete_container(resource: &ResourceRef, credential: &CredentialDescriptor) -> Result<()> {
    let client = container_client(resource, credential)?;
    match client.delete().await {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(Error::Request {
            path: resource.raw.clone(),
            message: e.to_string(),
        }),
    }
}

fn is_not_found(error: &azure_core::Error) -> bool {
    matches!(error.kind(), azure_core::error::ErrorKind::HttpResponse { status, .. } if status.as_u16() == 404)
}
