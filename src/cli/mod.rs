//! Command Dispatcher: CLI surface (`spec.md` §4.7, §6).
//!
//! Grounded on `conserve::bin::conserve::main`'s `clap::Parser` +
//! `Subcommand` layout: a top-level `Cli` carrying global flags plus a
//! `Command` enum, one variant per subcommand, each an args struct with
//! doc comments doubling as `--help` text.

pub mod cook;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

pub use cook::{cook, Action, CopyPlan, ListPlan, RemovePlan, SetPropertiesPlan, SyncPlan};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Location(#[from] crate::location::Error),

    #[error(transparent)]
    Filter(#[from] crate::filter::Error),

    #[error("invalid date '{value}' for --{flag}: {message}")]
    InvalidDate {
        flag: &'static str,
        value: String,
        message: String,
    },

    #[error("a service-level (account) source requires --recursive")]
    ServiceLevelRequiresRecursive,

    #[error("'{from_to}' does not support --preserve-posix-properties (only Local<->Blob or Blob<->Blob)")]
    PosixPropertiesUnsupported { from_to: String },

    #[error("piped stdin source requires an object-level, non-recursive destination")]
    PipeRequiresSingleObjectDestination,

    #[error("unsupported From-To combination: {source}{destination}")]
    UnsupportedFromTo { source: String, destination: String },

    #[error("{0}")]
    IncompatibleFlags(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[command(name = "azcopy", version, about = "Multi-cloud data-movement engine (frontend enumeration and job-submission pipeline)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit debug-level logging to stderr.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Directory to write a per-JobID log file under, in addition to stderr.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy objects from one endpoint to another.
    #[command(alias = "cp")]
    Copy(CopyArgs),

    /// Make the destination match the source, optionally removing
    /// destination-only entities.
    Sync(SyncArgs),

    /// Delete objects at one endpoint.
    #[command(alias = "rm")]
    Remove(RemoveArgs),

    /// List objects under a container URI.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Update tier, metadata, or tags on existing objects.
    SetProperties(SetPropertiesArgs),

    /// Acquire and cache a credential (external collaborator).
    Login,

    /// Clear a cached credential (external collaborator).
    Logout,

    /// Print environment configuration (external collaborator).
    Env,

    /// List, resume, pause, cancel, or remove jobs (external collaborator).
    Jobs,
}

/// Filter flags shared by `copy`, `sync`, `remove`, and `set-properties`.
#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Semicolon-separated include patterns, matched against the relative path.
    #[arg(long, default_value = "")]
    pub include_pattern: String,

    /// Semicolon-separated exclude-by-name patterns.
    #[arg(long, default_value = "")]
    pub exclude_pattern: String,

    /// Semicolon-separated exclude-by-path-prefix patterns.
    #[arg(long, default_value = "")]
    pub exclude_path: String,

    /// Only include entities last modified at or after this RFC 3339 timestamp.
    #[arg(long)]
    pub include_after: Option<String>,

    /// Only include entities last modified at or before this RFC 3339 timestamp.
    #[arg(long)]
    pub include_before: Option<String>,
}

#[derive(Debug, Args)]
pub struct CopyArgs {
    pub source: String,
    pub destination: String,

    #[arg(long)]
    pub recursive: bool,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Force a specific `Location-Location` pair instead of inferring it
    /// from the endpoint URLs.
    #[arg(long)]
    pub from_to: Option<String>,

    #[arg(long)]
    pub put_md5: bool,

    #[arg(long)]
    pub preserve_permissions: bool,

    #[arg(long)]
    pub preserve_smb_info: bool,

    #[arg(long)]
    pub preserve_posix_properties: bool,

    #[arg(long)]
    pub blob_type: Option<String>,

    #[arg(long)]
    pub block_size_mb: Option<f64>,

    #[arg(long)]
    pub content_type: Option<String>,

    #[arg(long)]
    pub cache_control: Option<String>,

    /// Semicolon-separated `key=value` pairs.
    #[arg(long)]
    pub metadata: Option<String>,

    #[arg(long)]
    pub s2s_preserve_access_tier: bool,

    /// File containing one relative path per line, restricting the copy to
    /// exactly those entries under `source`.
    #[arg(long)]
    pub list_of_files: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeleteDestinationArg {
    True,
    False,
    Prompt,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    pub source: String,
    pub destination: String,

    #[arg(long, default_value_t = true)]
    pub recursive: bool,

    #[arg(long, value_enum, default_value_t = DeleteDestinationArg::Prompt)]
    pub delete_destination: DeleteDestinationArg,

    #[arg(long)]
    pub put_md5: bool,

    #[arg(long)]
    pub compare_hash: bool,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PermanentDeleteArg {
    None,
    Snapshots,
    Versions,
    SnapshotsAndVersions,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub uri: String,

    #[arg(long)]
    pub recursive: bool,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long)]
    pub list_of_files: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = PermanentDeleteArg::None)]
    pub permanent_delete: PermanentDeleteArg,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    pub container_uri: String,

    /// Semicolon-separated list of properties to print (e.g. `LastModifiedTime;ContentLength`).
    #[arg(long)]
    pub properties: Option<String>,

    #[arg(long)]
    pub machine_readable: bool,

    #[arg(long)]
    pub running_tally: bool,

    #[arg(long)]
    pub mega_units: bool,
}

#[derive(Debug, Args)]
pub struct SetPropertiesArgs {
    pub uri: String,

    #[arg(long)]
    pub tier: Option<String>,

    #[arg(long)]
    pub metadata: Option<String>,

    #[arg(long)]
    pub tags: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,
}
