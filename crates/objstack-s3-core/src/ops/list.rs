//! Listing operations.
//!
//! Implements `list_objects` (continuation-token pagination) and
//! `list_object_versions` (key / version-id marker pagination).

use tracing::debug;

use crate::auth::Action;
use crate::context::RequestContext;
use crate::error::S3ServiceResult;
use crate::model::{
    ListObjectVersionsInput, ListObjectVersionsOutput, ListObjectsInput, ListObjectsOutput,
};
use crate::provider::ObjStackS3;
use crate::utils::{decode_continuation_token, encode_continuation_token};

// Listings read in-memory state only.
#[allow(clippy::unused_async)]
impl ObjStackS3 {
    /// List the current objects of a bucket.
    ///
    /// A `continuation_token` takes precedence over `start_after`.
    pub async fn list_objects(
        &self,
        ctx: &RequestContext,
        input: ListObjectsInput,
    ) -> S3ServiceResult<ListObjectsOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::ListBucket)?;
        let max_keys = self.config.effective_max_keys(input.max_keys);
        let prefix = input.prefix.unwrap_or_default();

        let start_after = match input.continuation_token.as_deref() {
            Some(token) => decode_continuation_token(token)?,
            None => input.start_after.unwrap_or_default(),
        };

        let result = bucket.objects.list_objects(
            &prefix,
            input.delimiter.as_deref().unwrap_or_default(),
            &start_after,
            max_keys,
        );

        debug!(
            bucket = %bucket.name,
            prefix = %prefix,
            objects = result.objects.len(),
            prefixes = result.common_prefixes.len(),
            truncated = result.is_truncated,
            "list_objects completed"
        );

        Ok(ListObjectsOutput {
            name: bucket.name.clone(),
            prefix,
            delimiter: input.delimiter,
            max_keys,
            key_count: result.objects.len() + result.common_prefixes.len(),
            contents: result.objects,
            common_prefixes: result.common_prefixes,
            is_truncated: result.is_truncated,
            next_continuation_token: result
                .next_marker
                .as_deref()
                .map(encode_continuation_token),
        })
    }

    /// List every version and delete marker of a bucket.
    pub async fn list_object_versions(
        &self,
        ctx: &RequestContext,
        input: ListObjectVersionsInput,
    ) -> S3ServiceResult<ListObjectVersionsOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::ListBucket)?;
        let max_keys = self.config.effective_max_keys(input.max_keys);
        let prefix = input.prefix.unwrap_or_default();

        let result = bucket.objects.list_object_versions(
            &prefix,
            input.delimiter.as_deref().unwrap_or_default(),
            input.key_marker.as_deref().unwrap_or_default(),
            input.version_id_marker.as_deref().unwrap_or_default(),
            max_keys,
        );

        debug!(
            bucket = %bucket.name,
            prefix = %prefix,
            versions = result.versions.len(),
            truncated = result.is_truncated,
            "list_object_versions completed"
        );

        Ok(ListObjectVersionsOutput {
            name: bucket.name.clone(),
            prefix,
            max_keys,
            versions: result.versions,
            common_prefixes: result.common_prefixes,
            is_truncated: result.is_truncated,
            next_key_marker: result.next_key_marker,
            next_version_id_marker: result.next_version_id_marker,
        })
    }
}
