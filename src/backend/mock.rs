//! In-memory Backend Adapter used by tests to simulate Blob/S3/File/BlobFS
//! behavior without a network dependency.
//!
//! Grounded on `conserve::transport::record`'s role as a test-double
//! transport: a small, inspectable stand-in that implements the real trait.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::backend::{
    BackendAdapter, BucketItem, Capabilities, Error, ListOptions, ListPage, Result, StatOutcome,
};
use crate::credential::CredentialDescriptor;
use crate::location::ResourceRef;
use crate::stored_object::{BlobProps, ContentProps, EntityType, StoredObject};

/// A fake bucket/container: an ordered map of relative path -> object, plus
/// per-page size to exercise continuation-token handling.
#[derive(Default)]
pub struct MockContainer {
    pub objects: BTreeMap<String, StoredObject>,
    pub page_size: usize,
}

#[derive(Default)]
pub struct MockAdapter {
    containers: Mutex<HashMap<String, MockContainer>>,
    capabilities: Capabilities,
    /// When > 0, the next N requests to `list_container_page` fail with a
    /// transient error, to exercise the retry policy.
    throttle_remaining: AtomicUsize,
}

impl MockAdapter {
    pub fn new(capabilities: Capabilities) -> Self {
        MockAdapter {
            containers: Mutex::new(HashMap::new()),
            capabilities,
            throttle_remaining: AtomicUsize::new(0),
        }
    }

    pub fn blob_like() -> Self {
        MockAdapter::new(Capabilities {
            folders_are_first_class: true,
            supports_metadata: true,
            supports_trailing_dot: false,
            supports_versions: true,
            supports_hierarchical_list: true,
        })
    }

    pub fn put(&self, container: &str, object: StoredObject) {
        let mut containers = self.containers.lock().expect("mock adapter mutex poisoned");
        let entry = containers.entry(container.to_owned()).or_default();
        entry.objects.insert(object.relative_path.clone(), object);
    }

    pub fn set_page_size(&self, container: &str, page_size: usize) {
        let mut containers = self.containers.lock().expect("mock adapter mutex poisoned");
        containers.entry(container.to_owned()).or_default().page_size = page_size;
    }

    pub fn throttle_next(&self, times: usize) {
        self.throttle_remaining.store(times, Ordering::SeqCst);
    }

    pub fn make_object(relative_path: &str, entity_type: EntityType, size: u64) -> StoredObject {
        StoredObject {
            name: relative_path.rsplit('/').next().unwrap_or_default().to_owned(),
            relative_path: relative_path.to_owned(),
            entity_type,
            last_modified: OffsetDateTime::UNIX_EPOCH,
            size,
            content_md5: None,
            content_props: ContentProps::default(),
            blob_props: BlobProps::default(),
            metadata: HashMap::new(),
            container_name: String::new(),
            version_id: None,
        }
    }
}

#[async_trait]
impl BackendAdapter for MockAdapter {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn list_container_page(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        prefix: &str,
        continuation: Option<&str>,
        opts: &ListOptions,
    ) -> Result<ListPage> {
        if self
            .throttle_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Request {
                path: resource.raw.clone(),
                message: "simulated throttling (429)".to_owned(),
            });
        }

        let containers = self.containers.lock().expect("mock adapter mutex poisoned");
        let container = resource.container.clone().unwrap_or_default();
        let Some(store) = containers.get(&container) else {
            return Ok(ListPage::default());
        };

        let mut matching: Vec<&StoredObject> = store
            .objects
            .values()
            .filter(|o| o.relative_path.starts_with(prefix))
            .filter(|o| opts.recursive || !has_extra_components(prefix, &o.relative_path))
            .collect();
        matching.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let page_size = if store.page_size > 0 {
            store.page_size
        } else {
            matching.len().max(1)
        };
        let start: usize = continuation.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + page_size).min(matching.len());
        let objects: Vec<StoredObject> = matching[start..end].iter().map(|o| (*o).clone()).collect();
        let continuation = if end < matching.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(ListPage {
            objects,
            continuation,
        })
    }

    async fn list_account(
        &self,
        _resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        container_prefix: &str,
    ) -> Result<Vec<BucketItem>> {
        let containers = self.containers.lock().expect("mock adapter mutex poisoned");
        Ok(containers
            .keys()
            .filter(|name| name.starts_with(container_prefix))
            .map(|name| BucketItem { name: name.clone() })
            .collect())
    }

    async fn stat_object(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
    ) -> Result<StatOutcome> {
        let containers = self.containers.lock().expect("mock adapter mutex poisoned");
        let container = resource.container.clone().unwrap_or_default();
        let Some(store) = containers.get(&container) else {
            return Ok(StatOutcome::NotFound);
        };
        match store.objects.get(&resource.object_key) {
            Some(object) => Ok(StatOutcome::Found(object.clone())),
            None => Ok(StatOutcome::NotFound),
        }
    }

    async fn create_container(
        &self,
        resource: &ResourceRef,
        _credential: &CredentialDescriptor,
        _metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let mut containers = self.containers.lock().expect("mock adapter mutex poisoned");
        containers
            .entry(resource.container.clone().unwrap_or_default())
            .or_default();
        Ok(())
    }

    async fn delete_object(&self, resource: &ResourceRef, _credential: &CredentialDescriptor) -> Result<()> {
        let mut containers = self.containers.lock().expect("mock adapter mutex poisoned");
        if let Some(store) = containers.get_mut(&resource.container.clone().unwrap_or_default()) {
            store.objects.remove(&resource.object_key);
        }
        Ok(())
    }

    async fn delete_container(&self, resource: &ResourceRef, _credential: &CredentialDescriptor) -> Result<()> {
        let mut containers = self.containers.lock().expect("mock adapter mutex poisoned");
        containers.remove(&resource.container.clone().unwrap_or_default());
        Ok(())
    }
}

fn has_extra_components(prefix: &str, path: &str) -> bool {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    let rest = rest.trim_start_matches('/');
    rest.contains('/')
}
