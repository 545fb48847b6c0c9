//! Storage Transfer Engine seam (`spec.md` §4.9, ambient addition).
//!
//! `spec.md` §6 describes the STE RPC surface as an external collaborator:
//! the core only ever calls `CopyJobPartOrder` and reads back
//! `{JobStarted, ErrorMsg}`. `StorageTransferEngine` is that narrow seam;
//! `InProcessSte` is the in-crate reference implementation used by tests and
//! the bundled binary so the pipeline is exercisable without a real STE
//! process.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::job::JobPart;

/// Response to a `CopyJobPartOrder` RPC, named after the wire fields of
/// `spec.md` §6.
#[derive(Debug, Clone)]
pub struct SteResponse {
    pub job_started: bool,
    pub error_msg: Option<String>,
}

impl SteResponse {
    pub fn accepted() -> Self {
        SteResponse {
            job_started: true,
            error_msg: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        SteResponse {
            job_started: false,
            error_msg: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait StorageTransferEngine: Send + Sync {
    async fn copy_job_part_order(&self, part: JobPart) -> SteResponse;
}

/// Accepts every `JobPart` into an in-memory queue and always reports
/// `JobStarted: true`. Sufficient to exercise the Transfer Processor's
/// dispatch protocol end to end without a real STE process; a production
/// deployment would satisfy the same trait over an IPC/gRPC channel, which
/// is out of scope here (`spec.md` §1).
#[derive(Default)]
pub struct InProcessSte {
    accepted: Mutex<Vec<JobPart>>,
}

impl InProcessSte {
    pub fn new() -> Self {
        InProcessSte::default()
    }

    pub fn accepted_parts(&self) -> Vec<JobPart> {
        self.accepted.lock().expect("STE mutex poisoned").clone()
    }
}

#[async_trait]
impl StorageTransferEngine for InProcessSte {
    async fn copy_job_part_order(&self, part: JobPart) -> SteResponse {
        self.accepted.lock().expect("STE mutex poisoned").push(part);
        SteResponse::accepted()
    }
}
