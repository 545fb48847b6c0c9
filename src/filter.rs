//! Pattern & Filter Engine (`spec.md` §4.2).
//!
//! Patterns are semicolon-separated globs compiled with `globset`, the same
//! library `conserve::excludes` uses to build its exclude patterns. Filters
//! are composed by AND, in the fixed order: include -> exclude-name ->
//! exclude-path -> include-before/after -> soft-delete.

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use time::OffsetDateTime;

use crate::stored_object::StoredObject;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("failed to build pattern set: {0}")]
    BuildFailed(globset::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Compile a semicolon-separated pattern list into a `GlobSet`.
///
/// An empty list compiles to an empty `GlobSet` (matches nothing), which
/// callers interpret as "no restriction" at the include/exclude layer
/// above, per `spec.md` §3's "empty include list means include all".
pub fn compile_patterns(patterns: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pattern).map_err(|source| Error::BadPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(Error::BuildFailed)
}

/// Whether `path` matches `set`, honoring the recursive/component-wise
/// distinction of `spec.md` §4.2.
///
/// When `recursive`, `*` spans path separators (plain `GlobSet` semantics).
/// When non-recursive, matching is performed component-wise: the pattern
/// and the target must have the same number of `/`-separated components.
pub fn matches(set: &GlobSet, path: &str, pattern_source: &str, recursive: bool) -> bool {
    if recursive {
        return set.is_match(path);
    }
    let target_components = path.split('/').count();
    pattern_source
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|pattern| {
            pattern.split('/').count() == target_components
                && Glob::new(pattern)
                    .map(|g| g.compile_matcher().is_match(path))
                    .unwrap_or(false)
        })
}

/// Predicate over a `StoredObject`. Implementors compose by AND via
/// [`FilterChain`].
pub trait ObjectFilter: Send + Sync {
    fn passes(&self, object: &StoredObject) -> bool;
}

/// Include filter: passes everything when empty, otherwise requires at
/// least one pattern match against the relative path.
pub struct IncludeFilter {
    patterns: String,
    set: GlobSet,
    recursive: bool,
}

impl IncludeFilter {
    pub fn new(patterns: &str, recursive: bool) -> Result<Self> {
        Ok(IncludeFilter {
            patterns: patterns.to_owned(),
            set: compile_patterns(patterns)?,
            recursive,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.trim().is_empty()
    }
}

impl ObjectFilter for IncludeFilter {
    fn passes(&self, object: &StoredObject) -> bool {
        self.is_empty() || matches(&self.set, &object.relative_path, &self.patterns, self.recursive)
    }
}

/// Exclude-by-name filter: evaluated against the full relative path.
pub struct ExcludeNameFilter {
    patterns: String,
    set: GlobSet,
    recursive: bool,
}

impl ExcludeNameFilter {
    pub fn new(patterns: &str, recursive: bool) -> Result<Self> {
        Ok(ExcludeNameFilter {
            patterns: patterns.to_owned(),
            set: compile_patterns(patterns)?,
            recursive,
        })
    }
}

impl ObjectFilter for ExcludeNameFilter {
    fn passes(&self, object: &StoredObject) -> bool {
        !matches(&self.set, &object.relative_path, &self.patterns, self.recursive)
    }
}

/// Exclude-by-path filter: evaluated against any prefix of the relative
/// path (i.e. it also excludes files under an excluded directory prefix).
pub struct ExcludePathFilter {
    patterns: String,
    set: GlobSet,
    recursive: bool,
}

impl ExcludePathFilter {
    pub fn new(patterns: &str, recursive: bool) -> Result<Self> {
        Ok(ExcludePathFilter {
            patterns: patterns.to_owned(),
            set: compile_patterns(patterns)?,
            recursive,
        })
    }
}

impl ObjectFilter for ExcludePathFilter {
    fn passes(&self, object: &StoredObject) -> bool {
        if self.patterns.trim().is_empty() {
            return true;
        }
        let mut prefix = String::new();
        for component in object.relative_path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(component);
            if matches(&self.set, &prefix, &self.patterns, self.recursive) {
                return false;
            }
        }
        true
    }
}

/// Include-before/include-after date filters.
pub struct DateFilter {
    pub after: Option<OffsetDateTime>,
    pub before: Option<OffsetDateTime>,
}

impl ObjectFilter for DateFilter {
    fn passes(&self, object: &StoredObject) -> bool {
        if let Some(after) = self.after {
            if object.last_modified < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if object.last_modified > before {
                return false;
            }
        }
        true
    }
}

/// Soft-delete filter: excludes objects carrying a soft-delete marker
/// unless the caller opted in to include them.
pub struct SoftDeleteFilter {
    pub include_soft_deleted: bool,
}

impl ObjectFilter for SoftDeleteFilter {
    fn passes(&self, object: &StoredObject) -> bool {
        self.include_soft_deleted || object.version_id.is_none() || !object.metadata.contains_key("deleted")
    }
}

/// Ordered AND-composition of filters: include -> exclude-name ->
/// exclude-path -> date -> soft-delete.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn ObjectFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain::default()
    }

    pub fn push(mut self, filter: impl ObjectFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn passes(&self, object: &StoredObject) -> bool {
        self.filters.iter().all(|f| f.passes(object))
    }
}
