//! Sync Differencer (`spec.md` §4.6): a bi-directional variant that builds a
//! destination index, diffs the source against it, and schedules copies and
//! (optionally) deletions of destination-only entities.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::filter::FilterChain;
use crate::monitor::Monitor;
use crate::processor::TransferProcessor;
use crate::stored_object::StoredObject;
use crate::traverse::{IdentityPreprocessor, ObjectSink, SinkDecision, Traverser, TraverseOptions};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Traverse(#[from] crate::traverse::Error),

    #[error(transparent)]
    Processor(#[from] crate::error::Error),

    #[error("destination has more than {limit} entries; sync aborted rather than risk an unbounded diff")]
    MaxFilesInSyncExceeded { limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// What to do with destination-only entities found in Stage C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDestinationPolicy {
    Always,
    Never,
    Prompt,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub compare_hash: bool,
    pub delete_destination: DeleteDestinationPolicy,
    pub max_files_in_sync: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            compare_hash: false,
            delete_destination: DeleteDestinationPolicy::Prompt,
            max_files_in_sync: 10_000_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub copied: u64,
    pub deleted: u64,
    pub destination_only_pending_prompt: u64,
}

/// Stage A value: the destination's observable state for one relative path.
#[derive(Debug, Clone)]
struct IndexEntry {
    last_modified: OffsetDateTime,
    size: u64,
    content_md5: Option<Vec<u8>>,
}

/// Stage A sink: inserts every destination object into the index, bounded
/// by `MaxFilesInSync`.
struct IndexBuildSink {
    index: HashMap<String, IndexEntry>,
    limit: usize,
}

#[async_trait]
impl ObjectSink for IndexBuildSink {
    async fn accept(&mut self, object: StoredObject) -> crate::traverse::Result<SinkDecision> {
        if object.entity_type == crate::stored_object::EntityType::Folder {
            return Ok(SinkDecision::Continue);
        }
        if self.index.len() >= self.limit {
            return Err(crate::traverse::Error::Aborted(format!(
                "destination index exceeded MaxFilesInSync={}",
                self.limit
            )));
        }
        self.index.insert(
            object.relative_path,
            IndexEntry {
                last_modified: object.last_modified,
                size: object.size,
                content_md5: object.content_md5,
            },
        );
        Ok(SinkDecision::Continue)
    }
}

/// Stage B sink: for every source object, look it up in the destination
/// index. Schedule a copy when absent or strictly newer; either way, remove
/// the key so what remains in the index is destination-only.
struct DiffSink<'a> {
    index: &'a mut HashMap<String, IndexEntry>,
    processor: &'a mut TransferProcessor,
    compare_hash: bool,
    copied: u64,
}

impl DiffSink<'_> {
    fn needs_copy(&self, object: &StoredObject, existing: Option<&IndexEntry>) -> bool {
        let Some(existing) = existing else {
            return true;
        };
        if self.compare_hash {
            if let (Some(source_md5), Some(dest_md5)) = (&object.content_md5, &existing.content_md5) {
                return source_md5 != dest_md5;
            }
        }
        // Strictly newer only: equal timestamps do not trigger a transfer.
        object.last_modified > existing.last_modified
    }
}

#[async_trait]
impl ObjectSink for DiffSink<'_> {
    async fn accept(&mut self, object: StoredObject) -> crate::traverse::Result<SinkDecision> {
        if object.entity_type == crate::stored_object::EntityType::Folder {
            return Ok(SinkDecision::Continue);
        }
        let existing = self.index.get(&object.relative_path);
        let copy = self.needs_copy(&object, existing);
        self.index.remove(&object.relative_path);
        if copy {
            self.processor
                .schedule(&object)
                .await
                .map_err(|e| crate::traverse::Error::Aborted(e.to_string()))?;
            self.copied += 1;
        }
        Ok(SinkDecision::Continue)
    }
}

/// Stage A: enumerate the destination into an in-memory index.
async fn build_destination_index(
    destination_traverser: &dyn Traverser,
    filters: &FilterChain,
    monitor: &dyn Monitor,
    cancelled: &AtomicBool,
    limit: usize,
) -> Result<HashMap<String, IndexEntry>> {
    let preprocessor = IdentityPreprocessor;
    let opts = TraverseOptions {
        recursive: true,
        filters,
        monitor,
        preprocessor: &preprocessor,
        cancelled,
    };
    let mut sink = IndexBuildSink {
        index: HashMap::new(),
        limit,
    };
    match destination_traverser.traverse(&opts, &mut sink).await {
        Ok(()) => Ok(sink.index),
        Err(crate::traverse::Error::Aborted(_)) if sink.index.len() >= limit => {
            Err(Error::MaxFilesInSyncExceeded { limit })
        }
        Err(e) => Err(Error::Traverse(e)),
    }
}

/// Run Stages A and B: build the destination index, then diff the source
/// against it, scheduling copies as they're found. Returns the still-open
/// destination-only index (Stage C input) plus a running summary.
pub async fn diff_and_schedule_copies(
    source_traverser: &dyn Traverser,
    destination_traverser: &dyn Traverser,
    filters: &FilterChain,
    monitor: &dyn Monitor,
    copy_processor: &mut TransferProcessor,
    options: &SyncOptions,
    cancelled: &AtomicBool,
) -> Result<(SyncSummary, Vec<String>)> {
    let mut index = build_destination_index(destination_traverser, filters, monitor, cancelled, options.max_files_in_sync).await?;

    let preprocessor = IdentityPreprocessor;
    let opts = TraverseOptions {
        recursive: true,
        filters,
        monitor,
        preprocessor: &preprocessor,
        cancelled,
    };
    let mut sink = DiffSink {
        index: &mut index,
        processor: copy_processor,
        compare_hash: options.compare_hash,
        copied: 0,
    };
    source_traverser.traverse(&opts, &mut sink).await?;

    let summary = SyncSummary {
        copied: sink.copied,
        deleted: 0,
        destination_only_pending_prompt: index.len() as u64,
    };
    let destination_only: Vec<String> = index.into_keys().collect();
    Ok((summary, destination_only))
}

/// Stage C: schedule deletions for `destination_only` paths, each becoming
/// a `CopyTransfer` against the virtual `Trash` destination, per the
/// `--delete-destination` policy.
pub async fn schedule_deletions(
    destination_only: Vec<String>,
    delete_processor: &mut TransferProcessor,
    policy: DeleteDestinationPolicy,
) -> Result<u64> {
    if destination_only.is_empty() || policy == DeleteDestinationPolicy::Never {
        return Ok(0);
    }
    // `Prompt` is resolved by the Command Dispatcher before this point (it
    // owns the stdin interaction); by the time `schedule_deletions` runs the
    // policy has already been collapsed to `Always` or `Never`.
    let mut deleted = 0u64;
    for path in destination_only {
        let object = StoredObject {
            name: path.rsplit('/').next().unwrap_or(&path).to_owned(),
            relative_path: path,
            entity_type: crate::stored_object::EntityType::File,
            last_modified: OffsetDateTime::UNIX_EPOCH,
            size: 0,
            content_md5: None,
            content_props: Default::default(),
            blob_props: Default::default(),
            metadata: Default::default(),
            container_name: String::new(),
            version_id: None,
        };
        delete_processor.schedule(&object).await?;
        deleted += 1;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockAdapter;
    use crate::credential::CredentialDescriptor;
    use crate::job::{JobID, JobPartTemplate};
    use crate::location::{FromTo, Location, ResourceRef};
    use crate::monitor::collect::CollectingMonitor;
    use crate::monitor::void::NullMonitor;
    use crate::ste::InProcessSte;
    use crate::stored_object::{BlobProps, ContentProps, EntityType, FolderPropertyOption};
    use crate::traverse::remote::RemoteTraverser;
    use std::sync::Arc;

    fn object(relative_path: &str, last_modified: OffsetDateTime) -> StoredObject {
        StoredObject {
            name: relative_path.to_owned(),
            relative_path: relative_path.to_owned(),
            entity_type: EntityType::File,
            last_modified,
            size: 1,
            content_md5: None,
            content_props: ContentProps::default(),
            blob_props: BlobProps::default(),
            metadata: Default::default(),
            container_name: "c".to_owned(),
            version_id: None,
        }
    }

    fn template(job_id: JobID, from_to: FromTo) -> JobPartTemplate {
        JobPartTemplate {
            job_id,
            from_to,
            source_root: "/tmp/dir".to_owned(),
            destination_root: "https://acct.blob.core.windows.net/c/dir".to_owned(),
            source_credential: CredentialDescriptor::anonymous(),
            destination_credential: CredentialDescriptor::anonymous(),
            put_md5: false,
            preserve_permissions: false,
            preserve_smb_info: false,
            preserve_posix_properties: false,
            s2s_preserve_access_tier: false,
        }
    }

    #[tokio::test]
    async fn destination_only_files_are_offered_for_deletion() {
        let adapter = Arc::new(MockAdapter::blob_like());
        adapter.put("c", MockAdapter::make_object("dir/only-remote.txt", EntityType::File, 1));
        let destination_resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/dir/").unwrap();
        let destination_traverser = RemoteTraverser::new(
            adapter.clone(),
            destination_resource,
            CredentialDescriptor::anonymous(),
            FolderPropertyOption::NoFolders,
        );

        let empty_source = Arc::new(MockAdapter::blob_like());
        let source_resource = ResourceRef::parse("https://acct.blob.core.windows.net/empty/").unwrap();
        let source_traverser = RemoteTraverser::new(
            empty_source,
            source_resource,
            CredentialDescriptor::anonymous(),
            FolderPropertyOption::NoFolders,
        );

        let filters = FilterChain::new();
        let monitor = CollectingMonitor::new();
        let cancelled = AtomicBool::new(false);
        let job_id = JobID::for_test(42);
        let ste = Arc::new(InProcessSte::new());
        let mut copy_processor = TransferProcessor::new(
            template(job_id, FromTo::new(Location::Local, Location::Blob)),
            ste.clone(),
            Arc::new(NullMonitor),
            10_000,
        );
        let options = SyncOptions::default();

        let (summary, destination_only) = diff_and_schedule_copies(
            &source_traverser,
            &destination_traverser,
            &filters,
            &monitor,
            &mut copy_processor,
            &options,
            &cancelled,
        )
        .await
        .unwrap();

        assert_eq!(summary.copied, 0);
        assert_eq!(destination_only, vec!["only-remote.txt".to_owned()]);

        let mut delete_processor = TransferProcessor::new(
            template(job_id, FromTo::to_trash(Location::Blob)),
            ste.clone(),
            Arc::new(NullMonitor),
            10_000,
        );
        let deleted = schedule_deletions(destination_only, &mut delete_processor, DeleteDestinationPolicy::Always)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        delete_processor.dispatch_final().await.unwrap();
        let parts = ste.accepted_parts();
        let delete_part = parts.iter().find(|p| p.from_to.is_delete()).unwrap();
        assert_eq!(delete_part.transfers.len(), 1);
    }

    #[tokio::test]
    async fn newer_source_triggers_copy_equal_does_not() {
        let destination = Arc::new(MockAdapter::blob_like());
        destination.put("c", MockAdapter::make_object("a.txt", EntityType::File, 1));
        let destination_resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/").unwrap();
        let destination_traverser = RemoteTraverser::new(
            destination.clone(),
            destination_resource,
            CredentialDescriptor::anonymous(),
            FolderPropertyOption::NoFolders,
        );

        let source = Arc::new(MockAdapter::blob_like());
        source.put("src", object("a.txt", OffsetDateTime::UNIX_EPOCH));
        let source_resource = ResourceRef::parse("https://acct.blob.core.windows.net/src/").unwrap();
        let source_traverser = RemoteTraverser::new(
            source,
            source_resource,
            CredentialDescriptor::anonymous(),
            FolderPropertyOption::NoFolders,
        );

        let filters = FilterChain::new();
        let monitor = CollectingMonitor::new();
        let cancelled = AtomicBool::new(false);
        let ste = Arc::new(InProcessSte::new());
        let mut copy_processor = TransferProcessor::new(
            template(JobID::for_test(1), FromTo::new(Location::Blob, Location::Blob)),
            ste,
            Arc::new(NullMonitor),
            10_000,
        );
        let options = SyncOptions::default();

        let (summary, destination_only) = diff_and_schedule_copies(
            &source_traverser,
            &destination_traverser,
            &filters,
            &monitor,
            &mut copy_processor,
            &options,
            &cancelled,
        )
        .await
        .unwrap();

        assert_eq!(summary.copied, 0, "equal timestamps must not trigger a transfer");
        assert!(destination_only.is_empty());
    }
}
