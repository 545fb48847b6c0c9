//! Crate-wide error type.
//!
//! Each component gets its own error enum (mirroring the narrow, matchable
//! style used at component boundaries), and this top-level `Error` unifies
//! them with `#[from]` so callers at the edges can match on a single type.

use thiserror::Error;

use crate::job::{JobID, PartNum};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Location(#[from] crate::location::Error),

    #[error(transparent)]
    Filter(#[from] crate::filter::Error),

    #[error(transparent)]
    Backend(#[from] crate::backend::Error),

    #[error(transparent)]
    Traverse(#[from] crate::traverse::Error),

    #[error(transparent)]
    Sync(#[from] crate::sync::Error),

    #[error(transparent)]
    Cli(#[from] crate::cli::Error),

    /// The Transfer Processor refused to schedule any work.
    #[error("{context}: nothing to do")]
    NothingScheduled { context: String },

    /// A job part was rejected by the Storage Transfer Engine.
    #[error("job {job_id} part {part_num} was not accepted by the Storage Transfer Engine: {message}")]
    JobPartRejected {
        job_id: JobID,
        part_num: PartNum,
        message: String,
    },

    /// A state mismatch that should be unreachable if the pipeline's
    /// invariants hold (e.g. dispatching after the final part).
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
