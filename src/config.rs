//! Process-wide tunables (`spec.md` §9, ambient addition). Loaded from CLI
//! flags, never from a config file — mirrors `conserve`, which also takes
//! all configuration from `clap` rather than a config format of its own.

use std::path::PathBuf;

use crate::job::MAX_TRANSFERS_PER_PART;
use crate::retry::RetryPolicy;
use crate::sync::SyncOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_transfers_per_part: usize,
    pub retry_policy: RetryPolicy,
    pub max_files_in_sync: usize,
    pub log_dir: Option<PathBuf>,
    pub job_plan_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_transfers_per_part: MAX_TRANSFERS_PER_PART,
            retry_policy: RetryPolicy::default(),
            max_files_in_sync: SyncOptions::default().max_files_in_sync,
            log_dir: None,
            job_plan_dir: None,
        }
    }
}
