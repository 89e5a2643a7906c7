//! The version chain of a single key.
//!
//! A chain holds every version of one bucket+key in creation order; the last
//! entry is the latest. How a write or delete changes the chain depends on
//! the bucket's [`VersioningStatus`]:
//!
//! | status    | put                         | delete (no version id)                  |
//! |-----------|-----------------------------|-----------------------------------------|
//! | Disabled  | replaces the chain          | removes the chain                       |
//! | Enabled   | appends                     | appends a delete marker                 |
//! | Suspended | replaces the `"null"` entry | replaces `"null"` with a `"null"` marker |
//!
//! Every mutation returns the versions it displaced so the caller can release
//! their content once the critical section is left.

use chrono::Utc;

use super::bucket::VersioningStatus;
use super::object::{NULL_VERSION_ID, ObjectVersion, Owner, S3DeleteMarker, S3Object};
use crate::utils::generate_version_id;

/// Result of deleting the current version of a key.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Whether a delete marker was created.
    pub delete_marker: bool,
    /// Version ID of the created marker.
    pub version_id: Option<String>,
    /// Versions physically removed by the delete.
    pub displaced: Vec<ObjectVersion>,
}

/// Ordered history of one key.
#[derive(Debug, Default)]
pub struct VersionChain {
    versions: Vec<ObjectVersion>,
    generation: u64,
    /// Set once the chain has been removed from its store; writers holding a
    /// stale handle must look the key up again.
    pub(super) detached: bool,
}

impl VersionChain {
    /// The latest entry (object or delete marker).
    #[must_use]
    pub fn latest(&self) -> Option<&ObjectVersion> {
        self.versions.last()
    }

    /// The current object: the latest entry unless it is a delete marker.
    #[must_use]
    pub fn current(&self) -> Option<&S3Object> {
        self.latest().and_then(ObjectVersion::as_object)
    }

    /// Look up a version by ID.
    #[must_use]
    pub fn find(&self, version_id: &str) -> Option<&ObjectVersion> {
        self.versions.iter().find(|v| v.version_id() == version_id)
    }

    /// Mutable lookup by ID.
    pub fn find_mut(&mut self, version_id: &str) -> Option<&mut ObjectVersion> {
        self.versions
            .iter_mut()
            .find(|v| v.version_id() == version_id)
    }

    /// Entries newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = &ObjectVersion> {
        self.versions.iter().rev()
    }

    /// Number of entries, delete markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the chain holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Stamp of the last committed mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Commit a new object version; it becomes latest.
    pub fn put(&mut self, object: S3Object, status: VersioningStatus) -> Vec<ObjectVersion> {
        let displaced = match status {
            VersioningStatus::Disabled => std::mem::take(&mut self.versions),
            VersioningStatus::Enabled => Vec::new(),
            VersioningStatus::Suspended => self.remove_null(),
        };
        self.versions.push(object.into());
        displaced
    }

    /// Delete the current version of `key`. An empty chain is left untouched.
    pub fn delete_current(
        &mut self,
        key: &str,
        status: VersioningStatus,
        owner: &Owner,
    ) -> DeleteOutcome {
        if self.is_empty() {
            return DeleteOutcome::default();
        }

        match status {
            VersioningStatus::Disabled => DeleteOutcome {
                displaced: std::mem::take(&mut self.versions),
                ..DeleteOutcome::default()
            },
            VersioningStatus::Enabled => {
                let version_id = generate_version_id();
                self.push_marker(key, &version_id, owner);
                DeleteOutcome {
                    delete_marker: true,
                    version_id: Some(version_id),
                    displaced: Vec::new(),
                }
            }
            VersioningStatus::Suspended => {
                let displaced = self.remove_null();
                if self.is_empty() {
                    return DeleteOutcome {
                        displaced,
                        ..DeleteOutcome::default()
                    };
                }
                self.push_marker(key, NULL_VERSION_ID, owner);
                DeleteOutcome {
                    delete_marker: true,
                    version_id: Some(NULL_VERSION_ID.to_owned()),
                    displaced,
                }
            }
        }
    }

    /// Physically remove one version. The next most recent entry, if any,
    /// becomes latest.
    pub fn purge(&mut self, version_id: &str) -> Option<ObjectVersion> {
        let idx = self
            .versions
            .iter()
            .position(|v| v.version_id() == version_id)?;
        Some(self.versions.remove(idx))
    }

    fn remove_null(&mut self) -> Vec<ObjectVersion> {
        let (null, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.versions)
            .into_iter()
            .partition(ObjectVersion::is_null_version);
        self.versions = rest;
        null
    }

    fn push_marker(&mut self, key: &str, version_id: &str, owner: &Owner) {
        self.versions.push(
            S3DeleteMarker {
                key: key.to_owned(),
                version_id: version_id.to_owned(),
                last_modified: Utc::now(),
                owner: owner.clone(),
            }
            .into(),
        );
    }
}
