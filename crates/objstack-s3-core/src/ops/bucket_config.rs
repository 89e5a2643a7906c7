//! Bucket configuration operations.
//!
//! Implements the bucket ACL, CORS and versioning setters and getters, plus
//! `match_cors` for evaluating browser requests. Setters replace the whole
//! field and require `WRITE_ACP`; getters require `READ_ACP`.

use tracing::debug;

use crate::auth::{Action, CannedAcl, expand_grants};
use crate::context::RequestContext;
use crate::cors::{CorsMatch, CorsRule, match_rules, validate_cors_rules};
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::model::AccessControlPolicy;
use crate::provider::ObjStackS3;
use crate::state::VersioningStatus;

// Configuration changes never await; they stay async for a uniform surface.
#[allow(clippy::unused_async)]
impl ObjStackS3 {
    // -----------------------------------------------------------------------
    // ACL
    // -----------------------------------------------------------------------

    /// Replace the bucket's canned ACL.
    pub async fn set_bucket_acl(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        acl: CannedAcl,
    ) -> S3ServiceResult<()> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::PutBucketAcl)?;
        *bucket.acl.write() = acl;
        debug!(bucket = %bucket.name, acl = %acl, "set_bucket_acl completed");
        Ok(())
    }

    /// The bucket's ACL, expanded into grants.
    pub async fn get_bucket_acl(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> S3ServiceResult<AccessControlPolicy> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::GetBucketAcl)?;
        let canned = *bucket.acl.read();
        Ok(AccessControlPolicy {
            owner: bucket.owner.clone(),
            canned,
            grants: expand_grants(canned, &bucket.owner, &bucket.owner),
        })
    }

    // -----------------------------------------------------------------------
    // CORS
    // -----------------------------------------------------------------------

    /// Replace the bucket's CORS rules.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::InvalidArgument`] if the rules do not validate.
    pub async fn set_bucket_cors(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        rules: Vec<CorsRule>,
    ) -> S3ServiceResult<()> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::PutBucketCors)?;
        validate_cors_rules(&rules)?;
        debug!(bucket = %bucket.name, rules = rules.len(), "set_bucket_cors completed");
        *bucket.cors_rules.write() = Some(rules);
        Ok(())
    }

    /// The bucket's CORS rules.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchCorsConfiguration`] when none are configured.
    pub async fn get_bucket_cors(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> S3ServiceResult<Vec<CorsRule>> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::GetBucketCors)?;
        let rules = bucket.cors_rules.read().clone();
        rules.ok_or(S3ServiceError::NoSuchCorsConfiguration)
    }

    /// Remove the bucket's CORS rules. Succeeds when none are configured.
    pub async fn delete_bucket_cors(&self, ctx: &RequestContext, bucket: &str) -> S3ServiceResult<()> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::PutBucketCors)?;
        bucket.cors_rules.write().take();
        debug!(bucket = %bucket.name, "delete_bucket_cors completed");
        Ok(())
    }

    /// Evaluate a pre-flight or actual browser request against the bucket's
    /// rules; the first matching rule wins. `Ok(None)` means the request is
    /// not allowed, including when no rules are configured.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn match_cors(
        &self,
        bucket: &str,
        origin: &str,
        method: &str,
        request_headers: &[String],
    ) -> S3ServiceResult<Option<CorsMatch>> {
        let bucket = self.state.get_bucket(bucket)?;
        let rules = bucket.cors_rules.read();
        Ok(rules
            .as_deref()
            .and_then(|rules| match_rules(rules, origin, method, request_headers)))
    }

    // -----------------------------------------------------------------------
    // Versioning
    // -----------------------------------------------------------------------

    /// Enable or suspend versioning.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::InvalidArgument`] for [`VersioningStatus::Disabled`]:
    /// a bucket never returns to the unversioned state.
    pub async fn set_bucket_versioning(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        status: VersioningStatus,
    ) -> S3ServiceResult<()> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::PutBucketVersioning)?;
        bucket.set_versioning(status)
    }

    /// The bucket's versioning status.
    pub async fn get_bucket_versioning(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> S3ServiceResult<VersioningStatus> {
        let bucket = self.authorized_bucket(ctx, bucket, Action::GetBucketVersioning)?;
        Ok(bucket.versioning_status())
    }
}
