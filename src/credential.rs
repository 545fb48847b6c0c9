//! Credential descriptors: an opaque handle consumed, never minted, by the
//! core. Token acquisition is an external collaborator (`spec.md` §1); this
//! module only models the shape the dispatcher passes through to the
//! Backend Adapter.

use std::fmt;

/// Opaque handle describing how a Backend Adapter should authenticate.
///
/// The core never inspects the payload beyond its `kind`; it is constructed
/// by the Command Dispatcher from cooked CLI flags / environment and handed
/// unchanged to the adapter.
#[derive(Clone)]
pub struct CredentialDescriptor {
    pub kind: CredentialKind,
}

#[derive(Clone)]
pub enum CredentialKind {
    Anonymous,
    SharedKey { account: String, key_ref: SecretRef },
    OAuth { token_ref: SecretRef },
    Sas { token: SecretRef },
    S3Access { access_key_id: String, secret_ref: SecretRef },
}

/// A reference to a secret value that is never `Debug`-printed or logged in
/// full; callers get a redacted placeholder instead.
#[derive(Clone)]
pub struct SecretRef(String);

impl SecretRef {
    pub fn new(value: impl Into<String>) -> Self {
        SecretRef(value.into())
    }

    /// The underlying secret value, for handing to a backend adapter only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretRef(REDACTED)")
    }
}

impl fmt::Debug for CredentialDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            CredentialKind::Anonymous => "Anonymous",
            CredentialKind::SharedKey { .. } => "SharedKey",
            CredentialKind::OAuth { .. } => "OAuth",
            CredentialKind::Sas { .. } => "Sas",
            CredentialKind::S3Access { .. } => "S3Access",
        };
        f.debug_struct("CredentialDescriptor").field("kind", &kind).finish()
    }
}

impl CredentialDescriptor {
    pub fn anonymous() -> Self {
        CredentialDescriptor {
            kind: CredentialKind::Anonymous,
        }
    }

    pub fn from_sas(token: impl Into<String>) -> Self {
        CredentialDescriptor {
            kind: CredentialKind::Sas {
                token: SecretRef::new(token),
            },
        }
    }

    pub fn oauth(token: impl Into<String>) -> Self {
        CredentialDescriptor {
            kind: CredentialKind::OAuth {
                token_ref: SecretRef::new(token),
            },
        }
    }

    pub fn s3_access(access_key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        CredentialDescriptor {
            kind: CredentialKind::S3Access {
                access_key_id: access_key_id.into(),
                secret_ref: SecretRef::new(secret),
            },
        }
    }
}
