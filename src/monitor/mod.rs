//! Communication from the pipeline to an observer: a logger, a test
//! collector, a progress UI (`spec.md` §4.8 / §7).
//!
//! Grounded on `conserve::monitor::Monitor`: a small trait receiving
//! counters and problems, rather than a bespoke reporting type per
//! component.

pub mod collect;
pub mod counters;
pub mod tracing_monitor;
pub mod void;

use crate::job::JobID;

pub use counters::Counter;

/// Observability seam. Every component that can increment a counter,
/// report a per-object problem, or needs to know when the first job part
/// was accepted takes a `&dyn Monitor`.
pub trait Monitor: Send + Sync {
    fn count(&self, counter: Counter, increment: usize);

    fn set_counter(&self, counter: Counter, value: usize);

    /// A per-object error during enumeration: logged, not fatal. The
    /// object is skipped and traversal continues (`spec.md` §7).
    fn problem(&self, problem: Problem);

    /// Fired exactly once, the first time a `JobPart` with `partNum == 0`
    /// is accepted by the Storage Transfer Engine. Used by the progress
    /// subsystem to begin polling (`spec.md` §4.5).
    fn on_first_part_accepted(&self, job_id: JobID);
}

#[derive(Debug)]
pub enum Problem {
    /// A per-object error encountered while enumerating; the path is kept
    /// separately so it can be redacted before being logged.
    ObjectError { path: String, message: String },
    /// Any other non-fatal problem worth surfacing in an end-of-run
    /// summary.
    Other(String),
}
