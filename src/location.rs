//! URL & Location Model (`spec.md` §4.1).
//!
//! Parses user-supplied endpoints into a tagged [`ResourceRef`] and infers
//! the [`Location`] family it belongs to.

use std::fmt;

use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not parse '{raw}' as a URL or local path: {source}")]
    InvalidUrl { raw: String, source: url::ParseError },

    #[error("wildcards are only permitted in the container/share/bucket name or as a trailing '/*': '{raw}'")]
    WildcardInPath { raw: String },

    #[error("unsupported host for a remote endpoint: '{host}'")]
    UnsupportedHost { host: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed enum identifying an endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Local,
    Blob,
    File,
    BlobFS,
    S3,
    Pipe,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Local => "Local",
            Location::Blob => "Blob",
            Location::File => "File",
            Location::BlobFS => "BlobFS",
            Location::S3 => "S3",
            Location::Pipe => "Pipe",
        };
        f.write_str(s)
    }
}

/// Ordered pair `(source Location, destination Location)`.
///
/// `remove` uses the virtual [`Location::Pipe`]-free `Trash` sink, modeled
/// here as a sibling `FromTo::to_trash` constructor rather than a seventh
/// `Location` variant, since `Trash` is never a traversal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FromTo {
    pub source: Location,
    pub destination: Destination,
}

/// The destination side of a [`FromTo`]: either a real endpoint, or the
/// virtual `Trash` sink used to express deletes through the same
/// `CopyTransfer` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Location(Location),
    Trash,
}

impl FromTo {
    pub fn new(source: Location, destination: Location) -> Self {
        FromTo {
            source,
            destination: Destination::Location(destination),
        }
    }

    pub fn to_trash(source: Location) -> Self {
        FromTo {
            source,
            destination: Destination::Trash,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.destination, Destination::Trash)
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.destination {
            Destination::Location(d) => write!(f, "{}{}", self.source, d),
            Destination::Trash => write!(f, "{}Trash", self.source),
        }
    }
}

/// Parsed endpoint.
#[derive(Debug, Clone)]
pub struct ResourceRef {
    /// The original string as supplied by the user, SAS included.
    pub raw: String,
    /// The SAS query string, if one was detected (never logged unredacted).
    pub sas_token: Option<String>,
    pub location: Location,
    pub account: Option<String>,
    /// Container / share / bucket / filesystem name.
    pub container: Option<String>,
    /// The object key, relative to the container, with `/` separators.
    pub object_key: String,
}

const SIG_PARAM: &str = "sig";

impl ResourceRef {
    /// Parse a raw endpoint string, exactly as supplied on the command line.
    pub fn parse(raw: &str) -> Result<ResourceRef> {
        if raw == "pipe" {
            return Ok(ResourceRef {
                raw: raw.to_owned(),
                sas_token: None,
                location: Location::Pipe,
                account: None,
                container: None,
                object_key: String::new(),
            });
        }

        if let Ok(url) = Url::parse(raw) {
            return Self::parse_remote(raw, &url);
        }

        // Not a URL: a local filesystem path.
        if raw.contains('*') {
            return Err(Error::WildcardInPath {
                raw: raw.to_owned(),
            });
        }
        Ok(ResourceRef {
            raw: raw.to_owned(),
            sas_token: None,
            location: Location::Local,
            account: None,
            container: None,
            object_key: normalize_local(raw),
        })
    }

    fn parse_remote(raw: &str, url: &Url) -> Result<ResourceRef> {
        let host = url.host_str().unwrap_or_default();
        let location = infer_location(host)?;

        let sas_token = url
            .query_pairs()
            .find(|(k, _)| k.eq_ignore_ascii_case(SIG_PARAM))
            .map(|_| url.query().unwrap_or_default().to_owned());

        let account = host.split('.').next().map(str::to_owned);

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let container = if segments.is_empty() {
            None
        } else {
            Some(segments.remove(0).to_owned())
        };
        let mut object_key = segments.join("/");

        // `path_segments()` drops the empty segment a trailing '/' leaves
        // behind, which would otherwise make a directory-syntactic
        // reference ("…/c/dir/") indistinguishable from an exact object key
        // ("…/c/dir"). Restore it before the wildcard handling below, which
        // relies on the trailing slash to recognize "/*".
        if !object_key.is_empty() && url.path().ends_with('/') {
            object_key.push('/');
        }

        // A trailing '/*' means "strip the top directory": drop it here and
        // let the traverser treat the remaining path as the listing root.
        if let Some(stripped) = object_key.strip_suffix("/*") {
            object_key = stripped.to_owned();
        } else if object_key == "*" {
            object_key.clear();
        }

        validate_wildcards(raw, &container, &object_key)?;

        Ok(ResourceRef {
            raw: raw.to_owned(),
            sas_token,
            location,
            account,
            container,
            object_key,
        })
    }

    /// True when the bucket/container/share name is empty or itself
    /// contains a wildcard: a service-level (account-level) reference.
    pub fn is_service_level(&self) -> bool {
        match &self.container {
            None => true,
            Some(c) => c.is_empty() || c.contains('*'),
        }
    }

    /// True when the container is set but the object key is empty.
    pub fn is_bucket_level(&self) -> bool {
        !self.is_service_level() && self.object_key.is_empty()
    }

    /// True when both container and object key are set.
    pub fn is_object_level(&self) -> bool {
        !self.is_service_level() && !self.object_key.is_empty()
    }

    /// True when the reference is object-level and syntactically denotes a
    /// directory (trailing `/` on the object key).
    pub fn is_directory_syntactic(&self) -> bool {
        self.is_object_level() && self.object_key.ends_with('/')
    }

    /// The user-visible form of this reference with any SAS signature
    /// redacted. MUST be used for anything that reaches logs.
    pub fn redacted(&self) -> String {
        redact_sas(&self.raw)
    }

    /// A copy of this reference rebound to a different container/bucket
    /// name, used by account-level traversal to delegate into each
    /// matching container in turn.
    pub fn clone_with_container(&self, container: &str) -> ResourceRef {
        ResourceRef {
            raw: self.raw.clone(),
            sas_token: self.sas_token.clone(),
            location: self.location,
            account: self.account.clone(),
            container: Some(container.to_owned()),
            object_key: self.object_key.clone(),
        }
    }
}

/// Replace the `sig=...` query parameter value with `REDACTED`, matching on
/// the parameter name case-insensitively, without disturbing the rest of
/// the URL.
pub fn redact_sas(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case(SIG_PARAM) {
                (k.into_owned(), "REDACTED".to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if pairs.is_empty() {
        return raw.to_owned();
    }
    url.query_pairs_mut().clear().extend_pairs(&pairs);
    url.to_string()
}

fn normalize_local(raw: &str) -> String {
    raw.replace('\\', "/")
}

fn validate_wildcards(raw: &str, container: &Option<String>, object_key: &str) -> Result<()> {
    // A '*' in the container/share/bucket name is a permitted prefix wildcard.
    // Any other '*' in the object key, other than the already-stripped
    // trailing "/*", is an error.
    if object_key.contains('*') {
        return Err(Error::WildcardInPath {
            raw: raw.to_owned(),
        });
    }
    let _ = container;
    Ok(())
}

/// `InferLocation(raw) -> Location`, applied to a URL host, per the
/// precedence in `spec.md` §4.1.
pub fn infer_location(host: &str) -> Result<Location> {
    if host.is_empty() {
        return Ok(Location::Local);
    }
    if s3_host_re().is_match(host) {
        return Ok(Location::S3);
    }
    if host.contains(".blob.") || host.ends_with(".blob.core.windows.net") {
        return Ok(Location::Blob);
    }
    if host.contains(".file.") || host.ends_with(".file.core.windows.net") {
        return Ok(Location::File);
    }
    if host.contains(".dfs.") || host.ends_with(".dfs.core.windows.net") {
        return Ok(Location::BlobFS);
    }
    Ok(Location::Local)
}

fn s3_host_re() -> Regex {
    // ^(?:[^.]+\.)?s3[.-][a-z0-9-]+\.
    Regex::new(r"^(?:[^.]+\.)?s3[.-][a-z0-9-]+\.").expect("static regex is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_is_exact() {
        let r = ResourceRef::parse("pipe").unwrap();
        assert_eq!(r.location, Location::Pipe);
    }

    #[test]
    fn infers_s3_virtual_hosted() {
        assert_eq!(
            infer_location("mybucket.s3.us-west-2.amazonaws.com").unwrap(),
            Location::S3
        );
        assert_eq!(
            infer_location("s3-us-west-2.amazonaws.com").unwrap(),
            Location::S3
        );
    }

    #[test]
    fn infers_blob_file_dfs() {
        assert_eq!(
            infer_location("acct.blob.core.windows.net").unwrap(),
            Location::Blob
        );
        assert_eq!(
            infer_location("acct.file.core.windows.net").unwrap(),
            Location::File
        );
        assert_eq!(
            infer_location("acct.dfs.core.windows.net").unwrap(),
            Location::BlobFS
        );
    }

    #[test]
    fn local_path_has_no_host() {
        let r = ResourceRef::parse("/tmp/dir/file.txt").unwrap();
        assert_eq!(r.location, Location::Local);
        assert_eq!(r.object_key, "/tmp/dir/file.txt");
    }

    #[test]
    fn wildcard_in_local_path_rejected() {
        assert!(matches!(
            ResourceRef::parse("/tmp/*/file.txt"),
            Err(Error::WildcardInPath { .. })
        ));
    }

    #[test]
    fn trailing_star_strips_top_dir() {
        let r = ResourceRef::parse("https://acct.blob.core.windows.net/c/dir/*").unwrap();
        assert_eq!(r.object_key, "dir");
    }

    #[test]
    fn other_wildcard_in_object_key_rejected() {
        let err = ResourceRef::parse("https://acct.blob.core.windows.net/c/di*r/file").unwrap_err();
        assert!(matches!(err, Error::WildcardInPath { .. }));
    }

    #[test]
    fn service_bucket_object_level_classification() {
        let service = ResourceRef::parse("https://acct.blob.core.windows.net/").unwrap();
        assert!(service.is_service_level());

        let bucket = ResourceRef::parse("https://acct.blob.core.windows.net/c").unwrap();
        assert!(bucket.is_bucket_level());

        let object = ResourceRef::parse("https://acct.blob.core.windows.net/c/a.txt").unwrap();
        assert!(object.is_object_level());
    }

    #[test]
    fn sas_is_detected_and_redacted() {
        let raw = "https://acct.blob.core.windows.net/c/a.txt?sig=SECRET&se=2024";
        let r = ResourceRef::parse(raw).unwrap();
        assert!(r.sas_token.is_some());
        let redacted = r.redacted();
        assert!(!redacted.contains("SECRET"));
        assert!(redacted.contains("sig=REDACTED"));
    }

    #[test]
    fn directory_syntactic() {
        let r = ResourceRef::parse("https://acct.blob.core.windows.net/c/dir/").unwrap();
        assert!(r.is_directory_syntactic());
    }
}
