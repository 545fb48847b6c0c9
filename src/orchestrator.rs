//! Enumeration Orchestrator (`spec.md` §4.5): owns a Traverser, the filter
//! chain, and a Transfer Processor, and drives one end-to-end enumeration
//! into dispatched `JobPart`s.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::filter::FilterChain;
use crate::job::PartNum;
use crate::monitor::Monitor;
use crate::processor::TransferProcessor;
use crate::stored_object::StoredObject;
use crate::traverse::{IdentityPreprocessor, ObjectSink, SinkDecision, Traverser, TraverseOptions};

/// End-of-run aggregate returned to the Command Dispatcher for the
/// exit-code and summary-line decisions of `spec.md` §7–§8.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub transfers_scheduled: u64,
    pub folders_scheduled: u64,
    pub objects_skipped_by_filter: u64,
    pub objects_failed: u64,
    pub parts_dispatched: PartNum,
}

impl JobSummary {
    pub fn nothing_scheduled(&self) -> bool {
        self.transfers_scheduled == 0 && self.folders_scheduled == 0
    }
}

/// Wraps the `TransferProcessor` as an `ObjectSink`, counting what it sees
/// into a `JobSummary` alongside whatever the `Monitor` independently
/// records.
struct CountingSink<'a> {
    processor: &'a mut TransferProcessor,
    summary: JobSummary,
}

#[async_trait]
impl ObjectSink for CountingSink<'_> {
    async fn accept(&mut self, object: StoredObject) -> crate::traverse::Result<SinkDecision> {
        let is_folder = object.entity_type == crate::stored_object::EntityType::Folder;
        match self.processor.schedule(&object).await {
            Ok(()) => {
                if is_folder {
                    self.summary.folders_scheduled += 1;
                } else {
                    self.summary.transfers_scheduled += 1;
                }
                Ok(SinkDecision::Continue)
            }
            Err(e) => Err(crate::traverse::Error::Aborted(e.to_string())),
        }
    }
}

pub struct EnumerationOrchestrator {
    traverser: Box<dyn Traverser>,
    filters: FilterChain,
    monitor: Arc<dyn Monitor>,
    recursive: bool,
}

impl EnumerationOrchestrator {
    pub fn new(traverser: Box<dyn Traverser>, filters: FilterChain, monitor: Arc<dyn Monitor>, recursive: bool) -> Self {
        EnumerationOrchestrator {
            traverser,
            filters,
            monitor,
            recursive,
        }
    }

    /// Run the enumeration to completion, dispatching every scheduled part
    /// plus the final part. On cancellation, the in-flight part is dropped
    /// rather than dispatched, per `spec.md` §5.
    pub async fn run(&self, processor: &mut TransferProcessor, cancelled: &AtomicBool) -> Result<JobSummary> {
        let preprocessor = IdentityPreprocessor;
        let opts = TraverseOptions {
            recursive: self.recursive,
            filters: &self.filters,
            monitor: self.monitor.as_ref(),
            preprocessor: &preprocessor,
            cancelled,
        };

        let mut sink = CountingSink {
            processor,
            summary: JobSummary::default(),
        };

        match self.traverser.traverse(&opts, &mut sink).await {
            Ok(()) => {}
            Err(crate::traverse::Error::Cancelled) => {
                return Err(Error::Invariant("enumeration cancelled; final part not dispatched".to_owned()));
            }
            Err(e) => return Err(Error::Traverse(e)),
        }

        let mut summary = sink.summary;
        sink.processor.dispatch_final().await?;
        summary.parts_dispatched = sink.processor.parts_dispatched();
        Ok(summary)
    }
}
