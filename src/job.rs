//! `JobPart`, `JobID`, and `CopyTransfer`: the units handed off to the
//! Storage Transfer Engine (`spec.md` §3).

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::credential::CredentialDescriptor;
use crate::location::FromTo;
use crate::stored_object::{BlobProps, ContentProps, EntityType};

/// Maximum number of `CopyTransfer`s a single `JobPart` may carry.
pub const MAX_TRANSFERS_PER_PART: usize = 10_000;

pub type PartNum = u32;

/// 128-bit identifier, lifetime = one user invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobID(u128);

impl JobID {
    /// Create a new, random `JobID` for one invocation of the dispatcher.
    pub fn new_random() -> Self {
        let mut rng = StdRng::from_entropy();
        JobID(rng.gen())
    }

    #[cfg(test)]
    pub fn for_test(value: u128) -> Self {
        JobID(value)
    }
}

impl fmt::Display for JobID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// One unit of work for the STE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyTransfer {
    /// Source path, relative to the job's source root, SAS-stripped.
    pub source: String,
    /// Destination path, relative to the job's destination root,
    /// SAS-stripped.
    pub destination: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub source_size: u64,
    pub content_props: ContentProps,
    pub blob_props: BlobProps,
    pub entity_type: EntityType,
}

/// Read-only baseline shared by every `JobPart` of one invocation.
///
/// Treated as immutable after construction; each part copies the fields it
/// needs rather than sharing a reference, so no locking is ever required
/// (`spec.md` §5, §9).
#[derive(Debug, Clone)]
pub struct JobPartTemplate {
    pub job_id: JobID,
    pub from_to: FromTo,
    pub source_root: String,
    pub destination_root: String,
    pub source_credential: CredentialDescriptor,
    pub destination_credential: CredentialDescriptor,
    pub put_md5: bool,
    pub preserve_permissions: bool,
    pub preserve_smb_info: bool,
    pub preserve_posix_properties: bool,
    pub s2s_preserve_access_tier: bool,
}

/// Batch of `CopyTransfer`s plus the surrounding job template.
#[derive(Debug, Clone)]
pub struct JobPart {
    pub job_id: JobID,
    pub part_num: PartNum,
    pub is_final_part: bool,
    pub from_to: FromTo,
    pub source_credential: CredentialDescriptor,
    pub destination_credential: CredentialDescriptor,
    pub transfers: Vec<CopyTransfer>,
    pub put_md5: bool,
    pub preserve_permissions: bool,
    pub preserve_smb_info: bool,
    pub preserve_posix_properties: bool,
    pub s2s_preserve_access_tier: bool,
}

impl JobPart {
    pub fn from_template(template: &JobPartTemplate, part_num: PartNum, is_final_part: bool, transfers: Vec<CopyTransfer>) -> Self {
        JobPart {
            job_id: template.job_id,
            part_num,
            is_final_part,
            from_to: template.from_to,
            source_credential: template.source_credential.clone(),
            destination_credential: template.destination_credential.clone(),
            transfers,
            put_md5: template.put_md5,
            preserve_permissions: template.preserve_permissions,
            preserve_smb_info: template.preserve_smb_info,
            preserve_posix_properties: template.preserve_posix_properties,
            s2s_preserve_access_tier: template.s2s_preserve_access_tier,
        }
    }

    /// Randomly permute the transfer list, in place. This is a deliberate
    /// wire-compatibility choice of the downstream service: it defeats
    /// single-partition hotspotting. Keep it until the backend side is
    /// known to tolerate ordered submissions (`spec.md` §9).
    pub fn shuffle(&mut self) {
        let mut rng = StdRng::from_entropy();
        self.transfers.shuffle(&mut rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_renders_as_hex() {
        let id = JobID::for_test(0xdead_beef);
        assert_eq!(
            id.to_string(),
            "000000000000000000000000deadbeef"
        );
    }
}
