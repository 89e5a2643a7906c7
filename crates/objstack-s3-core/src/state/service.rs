//! Top-level service state: the bucket registry.
//!
//! [`S3ServiceState`] owns every bucket and enforces global name
//! uniqueness. Names are normalized to lowercase, so the namespace is
//! case-insensitive. Buckets are shared as `Arc<S3Bucket>` so an operation
//! keeps working on the bucket it resolved even if the registry changes
//! underneath it; deletion is made safe by the bucket's commit gate.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use super::bucket::S3Bucket;
use super::object::Owner;
use crate::auth::CannedAcl;
use crate::error::{S3ServiceError, S3ServiceResult};

/// The bucket registry.
#[derive(Default)]
pub struct S3ServiceState {
    buckets: DashMap<String, Arc<S3Bucket>>,
}

impl std::fmt::Debug for S3ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ServiceState")
            .field("bucket_count", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl S3ServiceState {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new bucket.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::BucketAlreadyOwnedByYou`] if `owner` already owns
    ///   the name.
    /// - [`S3ServiceError::BucketAlreadyExists`] if someone else does.
    pub fn create_bucket(
        &self,
        name: &str,
        region: String,
        owner: Owner,
        acl: CannedAcl,
    ) -> S3ServiceResult<Arc<S3Bucket>> {
        let key = name.to_ascii_lowercase();
        match self.buckets.entry(key.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().owner.id == owner.id {
                    Err(S3ServiceError::BucketAlreadyOwnedByYou { bucket: key })
                } else {
                    Err(S3ServiceError::BucketAlreadyExists { bucket: key })
                }
            }
            Entry::Vacant(slot) => {
                let bucket = Arc::new(S3Bucket::new(key.clone(), region, owner, acl));
                slot.insert(Arc::clone(&bucket));
                info!(bucket = %key, owner = %bucket.owner, "bucket created");
                Ok(bucket)
            }
        }
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    /// - [`S3ServiceError::BucketNotEmpty`] if it still holds versions,
    ///   delete markers or in-progress uploads.
    pub fn delete_bucket(&self, name: &str) -> S3ServiceResult<()> {
        let bucket = self.get_bucket(name)?;
        bucket.close()?;
        self.buckets
            .remove_if(&bucket.name, |_, current| Arc::ptr_eq(current, &bucket));
        info!(bucket = %bucket.name, "bucket deleted");
        Ok(())
    }

    /// Look up a live bucket.
    ///
    /// # Errors
    ///
    /// Returns [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn get_bucket(&self, name: &str) -> S3ServiceResult<Arc<S3Bucket>> {
        self.find_bucket(name)
            .ok_or_else(|| S3ServiceError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    /// Look up a live bucket without building an error.
    #[must_use]
    pub fn find_bucket(&self, name: &str) -> Option<Arc<S3Bucket>> {
        self.buckets
            .get(&name.to_ascii_lowercase())
            .map(|entry| Arc::clone(entry.value()))
            .filter(|bucket| bucket.is_live())
    }

    /// All live buckets sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<Arc<S3Bucket>> {
        let mut buckets: Vec<Arc<S3Bucket>> = self
            .buckets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .filter(|bucket| bucket.is_live())
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        buckets
    }

    /// Whether a live bucket with this name exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.find_bucket(name).is_some()
    }

    /// Remove every bucket, returning them so their content can be released.
    pub fn reset(&self) -> Vec<Arc<S3Bucket>> {
        debug!("resetting all S3 service state");
        let buckets = self.list_buckets();
        self.buckets.clear();
        buckets
    }
}
