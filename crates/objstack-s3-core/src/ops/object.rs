//! Object operations.
//!
//! Implements `put_object`, `get_object`, `get_object_info`, `copy_object`,
//! `delete_object` and the object ACL accessors. Writes stream into the
//! content store first and commit under the key's critical section second;
//! a write that fails anywhere in between releases its staged bytes.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::{hide_missing, writer_owner};
use crate::auth::{Action, CannedAcl, ResourceAcl, authorize, expand_grants};
use crate::checksums::ChecksumAlgorithm;
use crate::context::RequestContext;
use crate::copy::MetadataDirective;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::model::{
    AccessControlPolicy, ByteRange, CopyObjectInput, CopyObjectOutput, DeleteObjectOutput,
    GetObjectInput, GetObjectOutput, PutObjectInput, PutObjectOutput, reported_version_id,
};
use crate::provider::{ObjStackS3, READ_ATTEMPTS};
use crate::state::{DEFAULT_STORAGE_CLASS, ObjectVersion, S3Bucket, S3Object};
use crate::storage::StagedContent;
use crate::utils::{
    is_valid_if_match, is_valid_if_none_match, parse_range_header, resolve_offset_range,
};
use crate::validation::{
    decode_content_md5, validate_metadata, validate_object_key, verify_checksum,
    verify_content_md5,
};

/// Resolve a requested range against an object size.
fn resolve_range(range: Option<&ByteRange>, size: u64) -> S3ServiceResult<Option<(u64, u64)>> {
    match range {
        None => Ok(None),
        Some(ByteRange::Offset { offset, length }) => resolve_offset_range(*offset, *length, size),
        Some(ByteRange::Header(header)) => parse_range_header(header, size).map(Some),
    }
}

/// The ACL an object-level action is checked against.
fn object_acl(bucket: &S3Bucket, object: &S3Object) -> ResourceAcl {
    ResourceAcl::object(&object.owner, &bucket.owner, object.acl)
}

/// Evaluate `If-Match` / `If-None-Match` against the current object.
///
/// Returns the chain generation the commit must still observe, or `None`
/// for an unconditional write.
fn check_put_preconditions(
    bucket: &S3Bucket,
    key: &str,
    if_match: Option<&str>,
    if_none_match: Option<&str>,
) -> S3ServiceResult<Option<Option<u64>>> {
    if if_match.is_none() && if_none_match.is_none() {
        return Ok(None);
    }

    let (generation, etag) = bucket
        .objects
        .read(key, |chain| {
            (
                Some(chain.generation()),
                chain.current().map(|obj| obj.etag.clone()),
            )
        })
        .unwrap_or((None, None));

    if let Some(if_match) = if_match {
        if !etag.as_deref().is_some_and(|etag| is_valid_if_match(etag, if_match)) {
            return Err(S3ServiceError::PreconditionFailed);
        }
    }
    if let Some(if_none_match) = if_none_match {
        if etag
            .as_deref()
            .is_some_and(|etag| !is_valid_if_none_match(etag, if_none_match))
        {
            return Err(S3ServiceError::PreconditionFailed);
        }
    }
    Ok(Some(generation))
}

impl ObjStackS3 {
    // -----------------------------------------------------------------------
    // Put
    // -----------------------------------------------------------------------

    /// Store a new object version.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::IncompleteBody`] if the body length differs from
    ///   `content_length`.
    /// - [`S3ServiceError::InvalidDigest`] / [`S3ServiceError::BadDigest`] for
    ///   a malformed or mismatching `Content-MD5` or checksum.
    /// - [`S3ServiceError::PreconditionFailed`] when a condition does not
    ///   hold, [`S3ServiceError::ConditionalRequestConflict`] when the key
    ///   changed while the body was streaming.
    pub async fn put_object(
        &self,
        ctx: &RequestContext,
        input: PutObjectInput,
    ) -> S3ServiceResult<PutObjectOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::PutObject)?;
        validate_object_key(&input.key)?;
        validate_metadata(&input.metadata.user_metadata)?;
        let expected_md5 = decode_content_md5(input.content_md5.as_deref())?;
        if input.content_length > self.config.max_object_size {
            return Err(S3ServiceError::EntityTooLarge);
        }

        let expected_generation = check_put_preconditions(
            &bucket,
            &input.key,
            input.if_match.as_deref(),
            input.if_none_match.as_deref(),
        )?;

        let algorithm = input
            .checksum
            .as_ref()
            .map(|c| c.algorithm)
            .or(input.checksum_algorithm);
        let algorithms: Vec<ChecksumAlgorithm> = algorithm.into_iter().collect();

        let written = ctx
            .run(self.storage.write(input.body, input.content_length, &algorithms))
            .await?;
        let staged = StagedContent::new(Arc::clone(&self.storage), written.content.clone());

        verify_content_md5(expected_md5.as_deref(), written.md5_hex())?;
        verify_checksum(input.checksum.as_ref(), &written.digests)?;
        ctx.check()?;

        let checksum = algorithm.and_then(|a| written.digests.checksum(a).cloned());
        let object = S3Object {
            key: input.key,
            version_id: String::new(),
            etag: written.etag(),
            size: written.size,
            last_modified: Utc::now(),
            storage_class: input
                .storage_class
                .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_owned()),
            metadata: input.metadata,
            owner: writer_owner(ctx, &bucket),
            acl: input.acl.unwrap_or_default(),
            sse: input.sse,
            checksum,
            parts_count: None,
            content: written.content.clone(),
        };

        let committed = self.commit_version(&bucket, object, staged, expected_generation)?;
        Ok(PutObjectOutput {
            etag: committed.etag,
            version_id: reported_version_id(&committed.version_id),
            size: committed.size,
            checksum: committed.checksum,
        })
    }

    /// Commit `object` as the newest version of its key, taking ownership of
    /// the staged content and releasing whatever the commit displaced.
    ///
    /// `expected_generation` is the chain generation a conditional write
    /// observed (`Some(None)` for an absent key); a different generation at
    /// commit time fails with `ConditionalRequestConflict`.
    pub(crate) fn commit_version(
        &self,
        bucket: &S3Bucket,
        mut object: S3Object,
        staged: StagedContent,
        expected_generation: Option<Option<u64>>,
    ) -> S3ServiceResult<S3Object> {
        let key = object.key.clone();
        let (committed, displaced) = {
            let _gate = bucket.commit_gate()?;
            let status = bucket.versioning_status();
            bucket.objects.mutate(&key, |chain| {
                if let Some(expected) = expected_generation {
                    let observed = (!chain.is_empty()).then(|| chain.generation());
                    if observed != expected {
                        return Err(S3ServiceError::ConditionalRequestConflict);
                    }
                }
                object.version_id = status.new_version_id();
                object.last_modified = Utc::now();
                object.content = staged.content().clone();
                let committed = object.clone();
                Ok((committed, chain.put(object, status)))
            })?
        };
        let _owned = staged.commit();

        debug!(
            bucket = %bucket.name,
            key = %key,
            version_id = %committed.version_id,
            size = committed.size,
            displaced = displaced.len(),
            "version committed"
        );
        self.release_versions(displaced);
        Ok(committed)
    }

    // -----------------------------------------------------------------------
    // Get
    // -----------------------------------------------------------------------

    /// Read an object version, or a byte range of it.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchKey`] / [`S3ServiceError::NoSuchVersion`]
    ///   for callers that may list the bucket, `AccessDenied` for others.
    /// - [`S3ServiceError::MethodNotAllowed`] when the version is a delete
    ///   marker.
    /// - [`S3ServiceError::InvalidRange`] for an unsatisfiable range.
    pub async fn get_object(
        &self,
        ctx: &RequestContext,
        input: GetObjectInput,
    ) -> S3ServiceResult<GetObjectOutput> {
        self.read_object(
            ctx,
            &input.bucket,
            &input.key,
            input.version_id.as_deref(),
            input.range.as_ref(),
        )
        .await
    }

    /// Metadata of an object version without its bytes. A requested range is
    /// validated but not read.
    pub async fn get_object_info(
        &self,
        ctx: &RequestContext,
        input: GetObjectInput,
    ) -> S3ServiceResult<S3Object> {
        ctx.check()?;
        let bucket = self.visible_bucket(&input.bucket)?;
        let (object, _) = self.readable_object(
            ctx,
            &bucket,
            &input.key,
            input.version_id.as_deref(),
            input.range.as_ref(),
        )?;
        Ok(object)
    }

    /// Snapshot a version the caller may read and resolve `range` against
    /// its size.
    pub(crate) fn readable_object(
        &self,
        ctx: &RequestContext,
        bucket: &S3Bucket,
        key: &str,
        version_id: Option<&str>,
        range: Option<&ByteRange>,
    ) -> S3ServiceResult<(S3Object, Option<(u64, u64)>)> {
        let object = self.lookup_object(ctx, bucket, key, version_id)?;
        authorize(ctx.identity(), &object_acl(bucket, &object), Action::GetObject)?;
        let resolved = resolve_range(range, object.size)?;
        Ok((object, resolved))
    }

    /// Read path of `get_object`.
    pub(crate) async fn read_object(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        range: Option<&ByteRange>,
    ) -> S3ServiceResult<GetObjectOutput> {
        ctx.check()?;
        let bucket = self.visible_bucket(bucket)?;

        let mut attempt = 1;
        loop {
            let (object, resolved) = self.readable_object(ctx, &bucket, key, version_id, range)?;

            let body = match ctx.run(self.storage.read(&object.content, resolved)).await {
                Ok(body) => body,
                Err(S3ServiceError::ContentNotFound { content }) if attempt < READ_ATTEMPTS => {
                    debug!(
                        bucket = %bucket.name,
                        key = %key,
                        content = %content,
                        attempt,
                        "content released during read, retrying"
                    );
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let expected = resolved.map_or(object.size, |(first, last)| last - first + 1);
            let received = body.len() as u64;
            if received != expected {
                return Err(S3ServiceError::IncompleteBody { expected, received });
            }

            debug!(
                bucket = %bucket.name,
                key = %key,
                version_id = %object.version_id,
                bytes = received,
                "get_object completed"
            );
            return Ok(GetObjectOutput {
                object,
                body,
                range: resolved,
            });
        }
    }

    /// Resolve `key` (and optionally a version) to an object snapshot.
    /// Not-found outcomes are masked for callers that may not list the
    /// bucket.
    pub(crate) fn lookup_object(
        &self,
        ctx: &RequestContext,
        bucket: &S3Bucket,
        key: &str,
        version_id: Option<&str>,
    ) -> S3ServiceResult<S3Object> {
        let no_such_key = || S3ServiceError::NoSuchKey {
            key: key.to_owned(),
        };
        let no_such_version = |version_id: &str| S3ServiceError::NoSuchVersion {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
        };

        let found = bucket.objects.read(key, |chain| match version_id {
            None => chain.current().cloned().ok_or_else(no_such_key),
            Some(version_id) => match chain.find(version_id) {
                Some(ObjectVersion::Object(object)) => Ok(object.as_ref().clone()),
                Some(ObjectVersion::DeleteMarker(_)) => Err(S3ServiceError::MethodNotAllowed),
                None => Err(no_such_version(version_id)),
            },
        });
        let result = found.unwrap_or_else(|| {
            Err(match version_id {
                None => no_such_key(),
                Some(version_id) => no_such_version(version_id),
            })
        });

        result.map_err(|err| match err {
            S3ServiceError::NoSuchKey { .. }
            | S3ServiceError::NoSuchVersion { .. }
            | S3ServiceError::MethodNotAllowed => hide_missing(ctx, bucket, err),
            other => other,
        })
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Delete the current version of a key, or purge one version.
    ///
    /// Without a version ID the outcome follows the bucket's versioning
    /// mode; with one, that version is removed physically. Absent keys and
    /// versions succeed without effect.
    pub async fn delete_object(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3ServiceResult<DeleteObjectOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, bucket, Action::DeleteObject)?;
        validate_object_key(key)?;
        let owner = writer_owner(ctx, &bucket);

        let (output, displaced) = {
            let _gate = bucket.commit_gate()?;
            let status = bucket.versioning_status();
            bucket.objects.mutate(key, |chain| {
                Ok(match version_id {
                    None => {
                        let outcome = chain.delete_current(key, status, &owner);
                        let output = DeleteObjectOutput {
                            delete_marker: outcome.delete_marker,
                            version_id: outcome.version_id,
                        };
                        (output, outcome.displaced)
                    }
                    Some(version_id) => {
                        let purged = chain.purge(version_id);
                        let output = DeleteObjectOutput {
                            delete_marker: purged
                                .as_ref()
                                .is_some_and(ObjectVersion::is_delete_marker),
                            version_id: Some(version_id.to_owned()),
                        };
                        (output, purged.into_iter().collect())
                    }
                })
            })?
        };

        debug!(
            bucket = %bucket.name,
            key = %key,
            delete_marker = output.delete_marker,
            version_id = ?output.version_id,
            removed = displaced.len(),
            "delete_object completed"
        );
        self.release_versions(displaced);
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // ACL
    // -----------------------------------------------------------------------

    /// Replace the canned ACL of an object version (latest when absent).
    pub async fn set_object_acl(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        acl: CannedAcl,
    ) -> S3ServiceResult<()> {
        ctx.check()?;
        let bucket = self.visible_bucket(bucket)?;
        let result = bucket.objects.mutate(key, |chain| {
            let target = match version_id {
                Some(version_id) => version_id.to_owned(),
                None => chain
                    .current()
                    .map(|obj| obj.version_id.clone())
                    .ok_or_else(|| S3ServiceError::NoSuchKey {
                        key: key.to_owned(),
                    })?,
            };
            let version = chain
                .find_mut(&target)
                .ok_or_else(|| S3ServiceError::NoSuchVersion {
                    key: key.to_owned(),
                    version_id: target.clone(),
                })?;
            let object = version
                .as_object_mut()
                .ok_or(S3ServiceError::MethodNotAllowed)?;
            authorize(ctx.identity(), &object_acl(&bucket, object), Action::PutObjectAcl)?;
            object.acl = acl;
            Ok(target)
        });

        match result {
            Ok(target) => {
                debug!(bucket = %bucket.name, key = %key, version_id = %target, acl = %acl, "set_object_acl completed");
                Ok(())
            }
            Err(
                err @ (S3ServiceError::NoSuchKey { .. }
                | S3ServiceError::NoSuchVersion { .. }
                | S3ServiceError::MethodNotAllowed),
            ) => Err(hide_missing(ctx, &bucket, err)),
            Err(err) => Err(err),
        }
    }

    /// The ACL of an object version, expanded into grants.
    pub async fn get_object_acl(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3ServiceResult<AccessControlPolicy> {
        ctx.check()?;
        let bucket = self.visible_bucket(bucket)?;
        let object = self.lookup_object(ctx, &bucket, key, version_id)?;
        authorize(ctx.identity(), &object_acl(&bucket, &object), Action::GetObjectAcl)?;
        Ok(AccessControlPolicy {
            grants: expand_grants(object.acl, &object.owner, &bucket.owner),
            owner: object.owner,
            canned: object.acl,
        })
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    /// Copy an existing version into a new version of the destination key.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::InvalidArgument`] when copying an object onto
    ///   itself without changing anything.
    /// - [`S3ServiceError::PreconditionFailed`] when a source condition does
    ///   not hold.
    pub async fn copy_object(
        &self,
        ctx: &RequestContext,
        input: CopyObjectInput,
    ) -> S3ServiceResult<CopyObjectOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::PutObject)?;
        validate_object_key(&input.key)?;
        if input.metadata_directive == MetadataDirective::Replace {
            validate_metadata(&input.metadata.user_metadata)?;
        }

        let unchanged = input.metadata_directive == MetadataDirective::Copy
            && input.acl.is_none()
            && input.sse.is_none()
            && input.storage_class.is_none()
            && input.checksum_algorithm.is_none();
        if unchanged
            && input.source.version_id.is_none()
            && input.source.is_same_object(&bucket.name, &input.key)
        {
            return Err(S3ServiceError::invalid_argument(
                "This copy request is illegal because it is trying to copy an object to itself \
                 without changing the object's metadata, storage class or encryption attributes",
            ));
        }

        let algorithms: Vec<ChecksumAlgorithm> = input.checksum_algorithm.into_iter().collect();
        let copied = ctx
            .run(self.copy_content(ctx, &input.source, &algorithms))
            .await?;
        ctx.check()?;

        let source = copied.source;
        let written = copied.written;
        let metadata = match input.metadata_directive {
            MetadataDirective::Copy => source.metadata.clone(),
            MetadataDirective::Replace => input.metadata,
        };
        let object = S3Object {
            key: input.key,
            version_id: String::new(),
            etag: written.etag(),
            size: written.size,
            last_modified: Utc::now(),
            storage_class: input
                .storage_class
                .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_owned()),
            metadata,
            owner: writer_owner(ctx, &bucket),
            acl: input.acl.unwrap_or_default(),
            sse: input.sse.or_else(|| source.sse.clone()),
            checksum: input
                .checksum_algorithm
                .and_then(|a| written.digests.checksum(a).cloned()),
            parts_count: None,
            content: written.content.clone(),
        };

        let committed = self.commit_version(&bucket, object, copied.staged, None)?;
        Ok(CopyObjectOutput {
            etag: committed.etag,
            version_id: reported_version_id(&committed.version_id),
            source_version_id: reported_version_id(&source.version_id),
            last_modified: committed.last_modified,
            size: committed.size,
        })
    }
}
