//! The fixed set of named counters the pipeline reports against.
//!
//! Modeled on `conserve::monitor::counters::Counter`: a `strum`-enumerable
//! enum rather than a free-form string key, so a `Monitor` implementation
//! can keep one array/atomic per variant.

use strum_macros::{EnumCount, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter)]
pub enum Counter {
    ObjectsEnumerated,
    ObjectsFiltered,
    ObjectsScheduled,
    ObjectsFailed,
    FoldersScheduled,
    PartsDispatched,
    DeleteTransfersScheduled,
}

impl Counter {
    pub fn label(self) -> &'static str {
        match self {
            Counter::ObjectsEnumerated => "objects enumerated",
            Counter::ObjectsFiltered => "objects filtered out",
            Counter::ObjectsScheduled => "objects scheduled",
            Counter::ObjectsFailed => "objects failed",
            Counter::FoldersScheduled => "folders scheduled",
            Counter::PartsDispatched => "parts dispatched",
            Counter::DeleteTransfersScheduled => "delete transfers scheduled",
        }
    }
}
