//! Per-bucket state.
//!
//! An [`S3Bucket`] holds the bucket's configuration (ACL, CORS rules,
//! versioning status) behind `parking_lot::RwLock`s, its key arena, and its
//! multipart upload table. A separate commit gate orders object commits
//! against bucket deletion: commits hold it for read, deletion takes it for
//! write and closes it for good.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keystore::ObjectStore;
use super::multipart::MultipartUpload;
use super::object::{NULL_VERSION_ID, Owner};
use crate::auth::{CannedAcl, ResourceAcl};
use crate::cors::CorsRule;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::utils::generate_version_id;

// ---------------------------------------------------------------------------
// VersioningStatus
// ---------------------------------------------------------------------------

/// Bucket versioning status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning has never been enabled on this bucket.
    #[default]
    Disabled,
    /// Versioning is currently enabled.
    Enabled,
    /// Versioning was enabled and is now suspended.
    Suspended,
}

impl VersioningStatus {
    /// The S3 wire name; `Disabled` has none and reports an empty string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }

    /// The version ID a new version written under this status receives.
    #[must_use]
    pub fn new_version_id(self) -> String {
        match self {
            Self::Enabled => generate_version_id(),
            Self::Disabled | Self::Suspended => NULL_VERSION_ID.to_owned(),
        }
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersioningStatus {
    type Err = S3ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enabled" => Ok(Self::Enabled),
            "Suspended" => Ok(Self::Suspended),
            other => Err(S3ServiceError::invalid_argument(format!(
                "Invalid versioning status: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// S3Bucket
// ---------------------------------------------------------------------------

/// A bucket and everything stored in it.
pub struct S3Bucket {
    /// Bucket name (lowercase).
    pub name: String,
    /// Region the bucket was created in.
    pub region: String,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
    /// Bucket owner.
    pub owner: Owner,
    /// Canned ACL.
    pub acl: RwLock<CannedAcl>,
    /// CORS rules, `None` when unconfigured.
    pub cors_rules: RwLock<Option<Vec<CorsRule>>>,
    /// Versioning status.
    pub versioning: RwLock<VersioningStatus>,
    /// Key arena.
    pub objects: ObjectStore,
    /// In-progress multipart uploads keyed by upload ID.
    pub multipart_uploads: DashMap<String, MultipartUpload>,
    /// `true` until the bucket is deleted.
    gate: RwLock<bool>,
}

impl fmt::Debug for S3Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Bucket")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("creation_date", &self.creation_date)
            .field("owner", &self.owner)
            .field("versioning", &*self.versioning.read())
            .field("keys", &self.objects.key_count())
            .field("uploads", &self.multipart_uploads.len())
            .finish_non_exhaustive()
    }
}

impl S3Bucket {
    /// Create an empty bucket.
    #[must_use]
    pub fn new(name: String, region: String, owner: Owner, acl: CannedAcl) -> Self {
        Self {
            name,
            region,
            creation_date: Utc::now(),
            owner,
            acl: RwLock::new(acl),
            cors_rules: RwLock::new(None),
            versioning: RwLock::new(VersioningStatus::default()),
            objects: ObjectStore::default(),
            multipart_uploads: DashMap::new(),
            gate: RwLock::new(true),
        }
    }

    /// The ACL the authorization guard evaluates bucket actions against.
    #[must_use]
    pub fn resource_acl(&self) -> ResourceAcl {
        ResourceAcl::bucket(&self.owner, *self.acl.read())
    }

    /// Current versioning status.
    #[must_use]
    pub fn versioning_status(&self) -> VersioningStatus {
        *self.versioning.read()
    }

    /// Change the versioning status. A bucket can never go back to
    /// `Disabled`.
    pub fn set_versioning(&self, status: VersioningStatus) -> S3ServiceResult<()> {
        if status == VersioningStatus::Disabled {
            return Err(S3ServiceError::invalid_argument(
                "Versioning can only be Enabled or Suspended",
            ));
        }
        let mut current = self.versioning.write();
        if *current != status {
            debug!(bucket = %self.name, from = ?*current, to = ?status, "changing versioning status");
            *current = status;
        }
        Ok(())
    }

    /// Whether the bucket holds no version, delete marker or upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.multipart_uploads.is_empty()
    }

    /// Whether the bucket has not been deleted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        *self.gate.read()
    }

    /// Enter the commit gate. Fails with `NoSuchBucket` once the bucket has
    /// been deleted. The guard must not be held across an `.await`.
    pub fn commit_gate(&self) -> S3ServiceResult<RwLockReadGuard<'_, bool>> {
        let gate = self.gate.read();
        if *gate {
            Ok(gate)
        } else {
            Err(S3ServiceError::NoSuchBucket {
                bucket: self.name.clone(),
            })
        }
    }

    /// Close the gate if the bucket is empty. No commit can be in flight
    /// while this runs.
    pub(super) fn close(&self) -> S3ServiceResult<()> {
        let mut gate = self.gate.write();
        if !*gate {
            return Err(S3ServiceError::NoSuchBucket {
                bucket: self.name.clone(),
            });
        }
        if !self.is_empty() {
            return Err(S3ServiceError::BucketNotEmpty {
                bucket: self.name.clone(),
            });
        }
        *gate = false;
        Ok(())
    }
}
