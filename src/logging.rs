//! Logging setup (ambient addition, `spec.md` §4.8 / §9).
//!
//! Grounded on `conserve::bin::conserve::log`: a `tracing_subscriber`
//! registry built from an env-driven filter, returning a guard the caller
//! holds for the process lifetime. Where `conserve` parks a `lazy_static`
//! `TerminalWriter` to coordinate stderr with its progress bar, this crate
//! has no terminal progress bar to coordinate with, so the stderr layer
//! just writes directly; the per-`JobID` log file route instead uses
//! `tracing-appender`'s non-blocking writer, whose flush-on-drop guard this
//! module returns as part of `LogGuard`.

use std::path::PathBuf;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::job::JobID;

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub verbose: bool,
    /// When set together with `job_id`, a `<job_id>.log` file is created
    /// under this directory and receives debug-level events regardless of
    /// the stderr filter.
    pub log_dir: Option<PathBuf>,
    pub job_id: Option<JobID>,
}

/// Holds the file appender's worker thread alive. Dropping it flushes
/// pending log lines before the process exits.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global `tracing` subscriber for the `azcopy` binary.
///
/// The stderr layer's level comes from the `AZCOPY_LOG` environment
/// variable when set, falling back to `debug` under `--verbose` or `info`
/// otherwise. The optional file layer is always `debug`, independent of
/// the stderr filter, since it exists specifically for post-hoc
/// troubleshooting of one job.
pub fn init(options: LoggingOptions) -> Result<LogGuard, String> {
    let env_filter = EnvFilter::try_from_env("AZCOPY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if options.verbose { "debug" } else { "info" })
    });

    let stderr_layer = fmt::Layer::default()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let (file_layer, file_guard) = match (&options.log_dir, options.job_id) {
        (Some(dir), Some(job_id)) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("could not create log directory '{}': {e}", dir.display()))?;
            let file_appender = tracing_appender::rolling::never(dir, format!("{job_id}.log"));
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::default()
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let registry = tracing_subscriber::registry().with(stderr_layer).with(file_layer);

    tracing::subscriber::set_global_default(registry)
        .map_err(|e| format!("could not install global tracing subscriber: {e}"))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
