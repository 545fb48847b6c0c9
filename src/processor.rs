//! Transfer Processor (`spec.md` §4.5): converts passing `StoredObject`s
//! into `CopyTransfer`s, batches them into `MaxTransfersPerPart`-bounded
//! `JobPart`s, and dispatches each to the Storage Transfer Engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::job::{CopyTransfer, JobID, JobPart, JobPartTemplate, PartNum};
use crate::monitor::{Counter, Monitor};
use crate::ste::StorageTransferEngine;
use crate::stored_object::StoredObject;
use crate::traverse::{ObjectSink, SinkDecision};

/// Join a root and a relative path with a single `/`, tolerating either side
/// already carrying a trailing/leading separator.
fn join_path(root: &str, relative_path: &str) -> String {
    if relative_path.is_empty() {
        return root.to_owned();
    }
    if root.is_empty() {
        return relative_path.to_owned();
    }
    format!("{}/{}", root.trim_end_matches('/'), relative_path)
}

pub struct TransferProcessor {
    template: JobPartTemplate,
    ste: Arc<dyn StorageTransferEngine>,
    monitor: Arc<dyn Monitor>,
    max_transfers_per_part: usize,
    transfers: Vec<CopyTransfer>,
    next_part_num: PartNum,
    frozen: bool,
    first_part_fired: bool,
}

impl TransferProcessor {
    pub fn new(
        template: JobPartTemplate,
        ste: Arc<dyn StorageTransferEngine>,
        monitor: Arc<dyn Monitor>,
        max_transfers_per_part: usize,
    ) -> Self {
        TransferProcessor {
            template,
            ste,
            monitor,
            max_transfers_per_part,
            transfers: Vec::new(),
            next_part_num: 0,
            frozen: false,
            first_part_fired: false,
        }
    }

    pub fn job_id(&self) -> JobID {
        self.template.job_id
    }

    pub fn parts_dispatched(&self) -> PartNum {
        self.next_part_num
    }

    /// `Schedule(storedObject)`: converts `object` to a `CopyTransfer` and
    /// appends it to the in-flight part, dispatching a non-final part when
    /// `MaxTransfersPerPart` is reached.
    pub async fn schedule(&mut self, object: &StoredObject) -> Result<()> {
        if self.frozen {
            return Err(Error::Invariant(
                "schedule called after the final part was dispatched".to_owned(),
            ));
        }
        let is_folder = object.entity_type == crate::stored_object::EntityType::Folder;
        let transfer = CopyTransfer {
            source: join_path(&self.template.source_root, &object.relative_path),
            destination: join_path(&self.template.destination_root, &object.relative_path),
            last_modified: object.last_modified,
            source_size: object.size,
            content_props: object.content_props.clone(),
            blob_props: object.blob_props.clone(),
            entity_type: object.entity_type,
        };
        self.transfers.push(transfer);
        self.monitor.count(
            if is_folder { Counter::FoldersScheduled } else { Counter::ObjectsScheduled },
            1,
        );

        if self.transfers.len() >= self.max_transfers_per_part {
            self.dispatch(false).await?;
        }
        Ok(())
    }

    /// `DispatchFinal()`: marks the current part final, submits it (even if
    /// empty, so the STE always sees a terminating part for this job), and
    /// freezes the processor against further scheduling.
    pub async fn dispatch_final(&mut self) -> Result<bool> {
        if self.frozen {
            return Err(Error::Invariant("dispatch_final called twice".to_owned()));
        }
        let started = self.dispatch(true).await?;
        self.frozen = true;
        Ok(started)
    }

    async fn dispatch(&mut self, is_final: bool) -> Result<bool> {
        if self.frozen {
            return Err(Error::Invariant(
                "attempted to dispatch a part after the final part was frozen".to_owned(),
            ));
        }
        let part_num = self.next_part_num;
        let transfers = std::mem::take(&mut self.transfers);
        let mut part = JobPart::from_template(&self.template, part_num, is_final, transfers);
        // Deliberate wire-compatibility shuffle (`spec.md` §5, §9): defeats
        // single-partition hotspotting downstream. Ordering across parts is
        // untouched; only the transfers within this part are permuted.
        part.shuffle();

        let response = self.ste.copy_job_part_order(part).await;
        if !response.job_started {
            return Err(Error::JobPartRejected {
                job_id: self.template.job_id,
                part_num,
                message: response.error_msg.unwrap_or_default(),
            });
        }

        self.next_part_num += 1;
        self.monitor.count(Counter::PartsDispatched, 1);
        if part_num == 0 && !self.first_part_fired {
            self.first_part_fired = true;
            self.monitor.on_first_part_accepted(self.template.job_id);
        }
        Ok(response.job_started)
    }
}

#[async_trait]
impl ObjectSink for TransferProcessor {
    async fn accept(&mut self, object: StoredObject) -> crate::traverse::Result<SinkDecision> {
        match self.schedule(&object).await {
            Ok(()) => Ok(SinkDecision::Continue),
            Err(e) => Err(crate::traverse::Error::Aborted(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialDescriptor;
    use crate::location::FromTo;
    use crate::monitor::collect::CollectingMonitor;
    use crate::ste::InProcessSte;
    use crate::stored_object::{BlobProps, ContentProps, EntityType};
    use time::OffsetDateTime;

    fn object(relative_path: &str) -> StoredObject {
        StoredObject {
            name: relative_path.to_owned(),
            relative_path: relative_path.to_owned(),
            entity_type: EntityType::File,
            last_modified: OffsetDateTime::UNIX_EPOCH,
            size: 1,
            content_md5: None,
            content_props: ContentProps::default(),
            blob_props: BlobProps::default(),
            metadata: Default::default(),
            container_name: "c".to_owned(),
            version_id: None,
        }
    }

    fn template() -> JobPartTemplate {
        JobPartTemplate {
            job_id: JobID::for_test(1),
            from_to: FromTo::new(crate::location::Location::Local, crate::location::Location::Blob),
            source_root: "/tmp/dir".to_owned(),
            destination_root: "https://acct.blob.core.windows.net/c".to_owned(),
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
    async fn part_boundedness_splits_at_max_transfers() {
        let ste = Arc::new(InProcessSte::new());
        let monitor = Arc::new(CollectingMonitor::new());
        let mut processor = TransferProcessor::new(template(), ste.clone(), monitor.clone(), 2);

        for i in 0..5 {
            processor.schedule(&object(&format!("f{i}"))).await.unwrap();
        }
        processor.dispatch_final().await.unwrap();

        let parts = ste.accepted_parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].transfers.len(), 2);
        assert_eq!(parts[1].transfers.len(), 2);
        assert_eq!(parts[2].transfers.len(), 1);
        assert!(parts[2].is_final_part);
        assert!(!parts[0].is_final_part);
        let part_nums: Vec<_> = parts.iter().map(|p| p.part_num).collect();
        assert_eq!(part_nums, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn first_part_accepted_fires_once() {
        let ste = Arc::new(InProcessSte::new());
        let monitor = Arc::new(CollectingMonitor::new());
        let mut processor = TransferProcessor::new(template(), ste, monitor.clone(), 1);
        processor.schedule(&object("a")).await.unwrap();
        processor.schedule(&object("b")).await.unwrap();
        processor.dispatch_final().await.unwrap();
        assert_eq!(monitor.first_part_accepted_count(), 1);
    }

    #[tokio::test]
    async fn empty_enumeration_still_dispatches_one_final_part() {
        let ste = Arc::new(InProcessSte::new());
        let monitor = Arc::new(CollectingMonitor::new());
        let mut processor = TransferProcessor::new(template(), ste.clone(), monitor, 10_000);
        processor.dispatch_final().await.unwrap();
        let parts = ste.accepted_parts();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_final_part);
        assert!(parts[0].transfers.is_empty());
    }

    #[tokio::test]
    async fn schedule_after_final_is_an_invariant_violation() {
        let ste = Arc::new(InProcessSte::new());
        let monitor = Arc::new(CollectingMonitor::new());
        let mut processor = TransferProcessor::new(template(), ste, monitor, 10);
        processor.dispatch_final().await.unwrap();
        assert!(matches!(
            processor.schedule(&object("late")).await,
            Err(Error::Invariant(_))
        ));
    }
}
