//! Engine operations.
//!
//! Each submodule adds inherent methods to [`ObjStackS3`], grouped by
//! category. Every public operation takes a [`RequestContext`] first and
//! authorizes the caller before touching state.

mod bucket;
mod bucket_config;
mod list;
mod multipart;
mod object;

use std::sync::Arc;

use tracing::debug;

use crate::auth::{Action, Decision, authorize, evaluate};
use crate::context::RequestContext;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::provider::ObjStackS3;
use crate::state::{Owner, S3Bucket};

impl ObjStackS3 {
    /// Look up a live bucket for an ACL-checked operation. A missing bucket
    /// is indistinguishable from a forbidden one.
    pub(crate) fn visible_bucket(&self, name: &str) -> S3ServiceResult<Arc<S3Bucket>> {
        self.state.find_bucket(name).ok_or_else(|| {
            debug!(bucket = %name, "bucket not found, reporting access denied");
            S3ServiceError::AccessDenied
        })
    }

    /// Look up a bucket and authorize a bucket-level action on it.
    pub(crate) fn authorized_bucket(
        &self,
        ctx: &RequestContext,
        name: &str,
        action: Action,
    ) -> S3ServiceResult<Arc<S3Bucket>> {
        let bucket = self.visible_bucket(name)?;
        authorize(ctx.identity(), &bucket.resource_acl(), action)?;
        Ok(bucket)
    }
}

/// Reveal a not-found error only to callers allowed to list the bucket.
pub(crate) fn hide_missing(
    ctx: &RequestContext,
    bucket: &S3Bucket,
    err: S3ServiceError,
) -> S3ServiceError {
    match evaluate(ctx.identity(), &bucket.resource_acl(), Action::ListBucket) {
        Decision::Allow => err,
        Decision::Deny => S3ServiceError::AccessDenied,
    }
}

/// Owner of a resource the caller creates in `bucket`. Anonymous writes
/// belong to the bucket owner.
pub(crate) fn writer_owner(ctx: &RequestContext, bucket: &S3Bucket) -> Owner {
    if ctx.identity().is_authenticated() {
        Owner::from(ctx.identity())
    } else {
        bucket.owner.clone()
    }
}
