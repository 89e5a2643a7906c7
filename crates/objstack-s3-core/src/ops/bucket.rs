//! Bucket lifecycle operations.
//!
//! Implements `make_bucket`, `get_bucket`, `get_bucket_info`, `list_buckets`
//! and `delete_bucket`.

use std::sync::Arc;

use tracing::debug;

use crate::auth::{Action, CannedAcl, Decision, evaluate};
use crate::context::RequestContext;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::model::BucketInfo;
use crate::provider::ObjStackS3;
use crate::state::{Owner, S3Bucket};
use crate::validation::validate_bucket_name;

// Bucket operations never await; they stay async for a uniform surface.
#[allow(clippy::unused_async)]
impl ObjStackS3 {
    /// Create a bucket owned by the caller.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::AccessDenied`] for anonymous callers.
    /// - [`S3ServiceError::InvalidBucketName`] for malformed names.
    /// - [`S3ServiceError::BucketAlreadyOwnedByYou`] /
    ///   [`S3ServiceError::BucketAlreadyExists`] when the name is taken.
    pub async fn make_bucket(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        acl: Option<CannedAcl>,
    ) -> S3ServiceResult<BucketInfo> {
        ctx.check()?;
        if !ctx.identity().is_authenticated() {
            debug!(bucket = %bucket, "anonymous bucket creation denied");
            return Err(S3ServiceError::AccessDenied);
        }
        validate_bucket_name(bucket)?;

        let created = self.state.create_bucket(
            bucket,
            self.config.default_region.clone(),
            Owner::from(ctx.identity()),
            acl.unwrap_or_default(),
        )?;
        Ok(BucketInfo::from(created.as_ref()))
    }

    /// Internal lookup that bypasses ACLs.
    ///
    /// # Errors
    ///
    /// Returns [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn get_bucket(&self, bucket: &str) -> S3ServiceResult<Arc<S3Bucket>> {
        self.state.get_bucket(bucket)
    }

    /// Describe a bucket. Requires `READ_ACP` on the bucket.
    pub async fn get_bucket_info(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> S3ServiceResult<BucketInfo> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, bucket, Action::GetBucketInfo)?;
        Ok(BucketInfo::from(bucket.as_ref()))
    }

    /// Buckets the caller owns or may read, sorted by name.
    pub async fn list_buckets(&self, ctx: &RequestContext) -> S3ServiceResult<Vec<BucketInfo>> {
        ctx.check()?;
        let buckets = self
            .state
            .list_buckets()
            .into_iter()
            .filter(|bucket| {
                evaluate(ctx.identity(), &bucket.resource_acl(), Action::ListBucket)
                    == Decision::Allow
            })
            .map(|bucket| BucketInfo::from(bucket.as_ref()))
            .collect();
        Ok(buckets)
    }

    /// Delete an empty bucket. Owner only.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::AccessDenied`] unless the caller owns the bucket.
    /// - [`S3ServiceError::BucketNotEmpty`] while any version, delete marker
    ///   or upload remains.
    pub async fn delete_bucket(&self, ctx: &RequestContext, bucket: &str) -> S3ServiceResult<()> {
        ctx.check()?;
        let found = self.authorized_bucket(ctx, bucket, Action::DeleteBucket)?;
        self.state.delete_bucket(&found.name)?;
        debug!(bucket = %found.name, caller = %ctx.identity(), "delete_bucket completed");
        Ok(())
    }
}
