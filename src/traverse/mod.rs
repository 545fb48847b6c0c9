//! Traversers (`spec.md` §4.4): polymorphic per-`Location` enumerators
//! producing a lazy stream of `StoredObject`s.

pub mod list_driven;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use thiserror::Error;

use crate::filter::FilterChain;
use crate::monitor::Monitor;
use crate::stored_object::StoredObject;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] crate::backend::Error),

    #[error(transparent)]
    Location(#[from] crate::location::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("traversal aborted: {0}")]
    Aborted(String),

    #[error("traversal was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Returned by a processor for each passing entity. `Skip` lets the
/// traversal continue past a per-object error; any other outcome aborts
/// the walk (`spec.md` §4.4).
pub enum SinkDecision {
    Continue,
    Skip,
}

/// The callback a `Traverse` call feeds every passing entity to, after the
/// preprocessor has had a chance to mutate it (e.g. to prepend a
/// list-driven child path).
#[async_trait]
pub trait ObjectSink: Send {
    async fn accept(&mut self, object: StoredObject) -> Result<SinkDecision>;
}

/// Mutates a `StoredObject` before it reaches the sink. The identity
/// preprocessor is used by every traverser except the list-driven
/// meta-traverser of `spec.md` §4.4, which rewrites `relative_path` to
/// `child + "/" + object.relative_path`.
pub trait Preprocessor: Send + Sync {
    fn apply(&self, object: &mut StoredObject);
}

pub struct IdentityPreprocessor;

impl Preprocessor for IdentityPreprocessor {
    fn apply(&self, _object: &mut StoredObject) {}
}

/// Tri-state local symlink policy (`spec.md` §4.4). Only meaningful for
/// the local traverser; remote backends have no symlink concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkPolicy {
    Follow,
    Preserve,
    Skip,
}

/// Per-call traversal parameters shared by every `Traverser` impl.
pub struct TraverseOptions<'a> {
    pub recursive: bool,
    pub filters: &'a FilterChain,
    pub monitor: &'a dyn Monitor,
    pub preprocessor: &'a dyn Preprocessor,
    pub cancelled: &'a std::sync::atomic::AtomicBool,
}

#[async_trait]
pub trait Traverser: Send + Sync {
    /// True if the resource addresses a directory/container-like entity.
    /// When `must_exist` is true, a missing resource is an error rather
    /// than `Ok(false)`.
    async fn is_directory(&self, must_exist: bool) -> Result<bool>;

    /// Visit every entity under the resource, applying each filter in
    /// order and invoking `sink` for everything that passes. Folder-aware
    /// traversers emit the root folder entity first, then its children.
    async fn traverse(&self, opts: &TraverseOptions<'_>, sink: &mut dyn ObjectSink) -> Result<()>;
}

/// Split an object-key at its first wildcard: the part before is the list
/// prefix, the full pattern is the match filter, and the directory
/// immediately above the wildcard is the root for relative paths
/// (`spec.md` §4.4 "wildcard in the object-key section").
pub struct WildcardSplit {
    pub list_prefix: String,
    pub match_pattern: String,
    pub relative_root: String,
}

pub fn split_wildcard(object_key: &str) -> Option<WildcardSplit> {
    let star_pos = object_key.find(['*', '?'])?;
    let prefix = &object_key[..star_pos];
    let list_prefix = match prefix.rfind('/') {
        Some(slash) => prefix[..=slash].to_owned(),
        None => String::new(),
    };
    let relative_root = list_prefix.trim_end_matches('/').to_owned();
    Some(WildcardSplit {
        list_prefix,
        match_pattern: object_key.to_owned(),
        relative_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_first_wildcard() {
        let split = split_wildcard("logs/2024/*.txt").unwrap();
        assert_eq!(split.list_prefix, "logs/2024/");
        assert_eq!(split.match_pattern, "logs/2024/*.txt");
        assert_eq!(split.relative_root, "logs/2024");
    }

    #[test]
    fn no_wildcard_returns_none() {
        assert!(split_wildcard("logs/2024/file.txt").is_none());
    }
}
