//! Server-side copy.
//!
//! A [`CopySource`] names an existing version (optionally a byte range of
//! it) plus preconditions on that version. The content store streams the
//! source bytes into a fresh blob chunk by chunk, so the caller never
//! re-uploads anything and large sources never sit in memory whole. `copy_object` and `copy_object_part`
//! both go through [`ObjStackS3::copy_content`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::checksums::ChecksumAlgorithm;
use crate::context::RequestContext;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::model::ByteRange;
use crate::provider::{ObjStackS3, READ_ATTEMPTS};
use crate::state::S3Object;
use crate::storage::{StagedContent, WriteResult};
use crate::utils::{is_valid_if_match, is_valid_if_none_match, parse_copy_source};

/// Where a copy takes its metadata from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetadataDirective {
    /// Keep the source's metadata.
    #[default]
    Copy,
    /// Use the metadata supplied with the request.
    Replace,
}

/// The source of a copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct CopySource {
    /// Source bucket.
    #[builder(setter(into))]
    pub bucket: String,
    /// Source key.
    #[builder(setter(into))]
    pub key: String,
    /// Source version; latest when absent.
    #[builder(default, setter(into, strip_option))]
    pub version_id: Option<String>,
    /// Inclusive byte range `(first, last)` of the source.
    #[builder(default, setter(strip_option))]
    pub range: Option<(u64, u64)>,
    /// Copy only if the source ETag matches.
    #[builder(default, setter(into, strip_option))]
    pub if_match: Option<String>,
    /// Copy only if the source ETag differs.
    #[builder(default, setter(into, strip_option))]
    pub if_none_match: Option<String>,
    /// Copy only if the source changed after this instant.
    #[builder(default, setter(strip_option))]
    pub if_modified_since: Option<DateTime<Utc>>,
    /// Copy only if the source did not change after this instant.
    #[builder(default, setter(strip_option))]
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl CopySource {
    /// Parse an `x-amz-copy-source` value (`bucket/key?versionId=v`,
    /// percent-encoded key).
    ///
    /// # Examples
    ///
    /// ```
    /// use objstack_s3_core::copy::CopySource;
    ///
    /// let src = CopySource::parse("photos/a%20b.jpg?versionId=v1").unwrap();
    /// assert_eq!(src.key, "a b.jpg");
    /// assert_eq!(src.version_id.as_deref(), Some("v1"));
    /// ```
    pub fn parse(copy_source: &str) -> S3ServiceResult<Self> {
        let path = parse_copy_source(copy_source)?;
        Ok(Self {
            bucket: path.bucket,
            key: path.key,
            version_id: path.version_id,
            ..Self::default()
        })
    }

    /// Whether the source is `bucket`/`key`.
    #[must_use]
    pub fn is_same_object(&self, bucket: &str, key: &str) -> bool {
        self.bucket.eq_ignore_ascii_case(bucket) && self.key == key
    }

    /// Evaluate the preconditions against the source version.
    ///
    /// A satisfied `if_match` overrides a failing `if_unmodified_since`, and
    /// a satisfied `if_none_match` overrides a failing `if_modified_since`.
    pub fn check_preconditions(&self, source: &S3Object) -> S3ServiceResult<()> {
        match (&self.if_match, self.if_unmodified_since) {
            (Some(if_match), _) if !is_valid_if_match(&source.etag, if_match) => {
                return Err(S3ServiceError::PreconditionFailed);
            }
            (None, Some(since)) if source.last_modified > since => {
                return Err(S3ServiceError::PreconditionFailed);
            }
            _ => {}
        }
        match (&self.if_none_match, self.if_modified_since) {
            (Some(if_none_match), _) if !is_valid_if_none_match(&source.etag, if_none_match) => {
                Err(S3ServiceError::PreconditionFailed)
            }
            (None, Some(since)) if source.last_modified <= since => {
                Err(S3ServiceError::PreconditionFailed)
            }
            _ => Ok(()),
        }
    }

    fn byte_range(&self) -> S3ServiceResult<Option<ByteRange>> {
        match self.range {
            None => Ok(None),
            Some((first, last)) if first <= last => Ok(Some(ByteRange::Offset {
                offset: first,
                length: Some(last - first + 1),
            })),
            Some(_) => Err(S3ServiceError::InvalidRange),
        }
    }
}

/// Bytes copied from a source version, staged but not yet owned.
#[derive(Debug)]
pub(crate) struct CopiedContent {
    /// The source version that was read.
    pub source: S3Object,
    /// Guard over the new blob.
    pub staged: StagedContent,
    /// Digests and size of the new blob.
    pub written: WriteResult,
}

impl ObjStackS3 {
    /// Copy a source version (or range of it) into a new staged blob.
    ///
    /// Source preconditions are evaluated before any byte is copied.
    pub(crate) async fn copy_content(
        &self,
        ctx: &RequestContext,
        source: &CopySource,
        algorithms: &[ChecksumAlgorithm],
    ) -> S3ServiceResult<CopiedContent> {
        ctx.check()?;
        let range = source.byte_range()?;
        let bucket = self.visible_bucket(&source.bucket)?;

        let mut attempt = 1;
        loop {
            let (object, resolved) = self.readable_object(
                ctx,
                &bucket,
                &source.key,
                source.version_id.as_deref(),
                range.as_ref(),
            )?;
            source.check_preconditions(&object)?;

            let written = match self.storage.copy(&object.content, resolved, algorithms).await {
                Ok(written) => written,
                Err(S3ServiceError::ContentNotFound { content }) if attempt < READ_ATTEMPTS => {
                    debug!(
                        src_bucket = %source.bucket,
                        src_key = %source.key,
                        content = %content,
                        attempt,
                        "source content released during copy, retrying"
                    );
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let staged = StagedContent::new(Arc::clone(&self.storage), written.content.clone());

            debug!(
                src_bucket = %source.bucket,
                src_key = %source.key,
                src_version = %object.version_id,
                size = written.size,
                "copied source content"
            );
            return Ok(CopiedContent {
                source: object,
                staged,
                written,
            });
        }
    }
}
