//! Multipart upload operations.
//!
//! Implements `new_multipart_upload`, `put_object_part`, `copy_object_part`,
//! `list_object_parts`, `list_multipart_uploads`, `abort_multipart_upload`
//! and `complete_multipart_upload`.
//!
//! The upload table entry is the per-upload critical section. Completion
//! claims the session (`Initiated -> Completing`) under the entry lock,
//! assembles the object without holding it, and either finishes the
//! session or reverts the claim.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::writer_owner;
use crate::auth::Action;
use crate::checksums::ChecksumAlgorithm;
use crate::context::RequestContext;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::model::{
    CompleteMultipartUploadInput, CompleteMultipartUploadOutput, CopyObjectPartInput,
    ListMultipartUploadsInput, ListMultipartUploadsOutput, ListObjectPartsInput,
    ListObjectPartsOutput, NewMultipartUploadInput, NewMultipartUploadOutput, PutObjectPartInput,
    PutObjectPartOutput, UploadInfo, reported_version_id,
};
use crate::provider::ObjStackS3;
use crate::state::{DEFAULT_STORAGE_CLASS, MultipartUpload, Owner, S3Bucket, UploadPart, UploadState};
use crate::storage::{StagedContent, WriteResult};
use crate::utils::generate_upload_id;
use crate::validation::{
    decode_content_md5, validate_metadata, validate_object_key, validate_part_number,
    verify_checksum, verify_content_md5,
};

/// Page-size ceiling of the multipart listings.
const MAX_LISTING: usize = 1000;

fn no_such_upload(upload_id: &str) -> S3ServiceError {
    S3ServiceError::NoSuchUpload {
        upload_id: upload_id.to_owned(),
    }
}

/// Checksum algorithm of an active upload of `key`.
fn active_upload_algorithm(
    bucket: &S3Bucket,
    key: &str,
    upload_id: &str,
) -> S3ServiceResult<Option<ChecksumAlgorithm>> {
    match bucket.multipart_uploads.get(upload_id) {
        Some(upload) if upload.key == key => {
            upload.ensure_active()?;
            Ok(upload.checksum_algorithm)
        }
        _ => Err(no_such_upload(upload_id)),
    }
}

/// A session in `Completing`. Dropping the claim reverts it to `Initiated`,
/// so an abandoned or failed completion leaves the upload usable.
struct CompletionClaim<'a> {
    bucket: &'a S3Bucket,
    upload_id: &'a str,
    armed: bool,
}

impl CompletionClaim<'_> {
    /// Retire the session as `Completed`, returning every part it held.
    fn finish(mut self) -> Vec<UploadPart> {
        self.armed = false;
        self.bucket
            .multipart_uploads
            .remove(self.upload_id)
            .map(|(_, mut upload)| upload.finish(UploadState::Completed))
            .unwrap_or_default()
    }
}

impl Drop for CompletionClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(mut upload) = self.bucket.multipart_uploads.get_mut(self.upload_id) {
                upload.revert_completion();
                debug!(bucket = %self.bucket.name, upload_id = %self.upload_id, "completion claim reverted");
            }
        }
    }
}

impl ObjStackS3 {
    /// Start a multipart upload. Metadata, ACL, SSE settings and checksum
    /// algorithm are fixed here and applied to the completed object.
    pub async fn new_multipart_upload(
        &self,
        ctx: &RequestContext,
        input: NewMultipartUploadInput,
    ) -> S3ServiceResult<NewMultipartUploadOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::MultipartUpload)?;
        validate_object_key(&input.key)?;
        validate_metadata(&input.metadata.user_metadata)?;

        let upload_id = generate_upload_id();
        let mut upload = MultipartUpload::new(
            upload_id.clone(),
            bucket.name.clone(),
            input.key.clone(),
            Owner::from(ctx.identity()),
            writer_owner(ctx, &bucket),
            input.metadata,
        );
        upload.acl = input.acl.unwrap_or_default();
        upload.sse = input.sse;
        upload.checksum_algorithm = input.checksum_algorithm;
        upload.storage_class = input
            .storage_class
            .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_owned());

        {
            let _gate = bucket.commit_gate()?;
            bucket.multipart_uploads.insert(upload_id.clone(), upload);
        }

        info!(bucket = %bucket.name, key = %input.key, upload_id = %upload_id, "multipart upload initiated");
        Ok(NewMultipartUploadOutput {
            bucket: bucket.name.clone(),
            key: input.key,
            upload_id,
            checksum_algorithm: input.checksum_algorithm,
        })
    }

    /// Upload one part.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::InvalidArgument`] for a part number outside
    ///   `1..=max_parts`.
    /// - [`S3ServiceError::NoSuchUpload`] unless the session is accepting
    ///   parts for this key, including when it ended mid-stream.
    /// - [`S3ServiceError::IncompleteBody`], [`S3ServiceError::InvalidDigest`]
    ///   and [`S3ServiceError::BadDigest`] as for `put_object`.
    pub async fn put_object_part(
        &self,
        ctx: &RequestContext,
        input: PutObjectPartInput,
    ) -> S3ServiceResult<PutObjectPartOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::MultipartUpload)?;
        validate_part_number(input.part_number, self.config.max_parts)?;
        let expected_md5 = decode_content_md5(input.content_md5.as_deref())?;
        if input.content_length > self.config.max_object_size {
            return Err(S3ServiceError::EntityTooLarge);
        }
        let algorithm = active_upload_algorithm(&bucket, &input.key, &input.upload_id)?;

        let mut algorithms: Vec<ChecksumAlgorithm> = algorithm.into_iter().collect();
        if let Some(supplied) = &input.checksum {
            if !algorithms.contains(&supplied.algorithm) {
                algorithms.push(supplied.algorithm);
            }
        }

        let written = ctx
            .run(self.storage.write(input.body, input.content_length, &algorithms))
            .await?;
        let staged = StagedContent::new(Arc::clone(&self.storage), written.content.clone());
        verify_content_md5(expected_md5.as_deref(), written.md5_hex())?;
        verify_checksum(input.checksum.as_ref(), &written.digests)?;
        ctx.check()?;

        let part = self.attach_part(
            &bucket,
            &input.key,
            &input.upload_id,
            input.part_number,
            &written,
            algorithm,
            staged,
        )?;
        Ok(PutObjectPartOutput {
            etag: part.etag,
            part_number: part.part_number,
            size: part.size,
            checksum: part.checksum,
            last_modified: part.last_modified,
            source_version_id: None,
        })
    }

    /// Upload one part copied from an existing object version.
    pub async fn copy_object_part(
        &self,
        ctx: &RequestContext,
        input: CopyObjectPartInput,
    ) -> S3ServiceResult<PutObjectPartOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::MultipartUpload)?;
        validate_part_number(input.part_number, self.config.max_parts)?;
        let algorithm = active_upload_algorithm(&bucket, &input.key, &input.upload_id)?;
        let algorithms: Vec<ChecksumAlgorithm> = algorithm.into_iter().collect();

        let copied = ctx
            .run(self.copy_content(ctx, &input.source, &algorithms))
            .await?;
        ctx.check()?;

        let part = self.attach_part(
            &bucket,
            &input.key,
            &input.upload_id,
            input.part_number,
            &copied.written,
            algorithm,
            copied.staged,
        )?;
        Ok(PutObjectPartOutput {
            etag: part.etag,
            part_number: part.part_number,
            size: part.size,
            checksum: part.checksum,
            last_modified: part.last_modified,
            source_version_id: reported_version_id(&copied.source.version_id),
        })
    }

    /// Upsert a staged part into its session, releasing the part it
    /// replaces.
    #[allow(clippy::too_many_arguments)]
    fn attach_part(
        &self,
        bucket: &S3Bucket,
        key: &str,
        upload_id: &str,
        part_number: u32,
        written: &WriteResult,
        algorithm: Option<ChecksumAlgorithm>,
        staged: StagedContent,
    ) -> S3ServiceResult<UploadPart> {
        let part = UploadPart {
            part_number,
            etag: written.etag(),
            size: written.size,
            last_modified: Utc::now(),
            checksum: algorithm.and_then(|a| written.digests.checksum(a).cloned()),
            content: staged.content().clone(),
        };

        let replaced = {
            let _gate = bucket.commit_gate()?;
            let mut upload = match bucket.multipart_uploads.get_mut(upload_id) {
                Some(upload) if upload.key == key && upload.is_active() => upload,
                _ => {
                    debug!(bucket = %bucket.name, upload_id = %upload_id, part_number, "upload ended while part was streaming");
                    return Err(no_such_upload(upload_id));
                }
            };
            upload.put_part(part.clone())
        };
        let _owned = staged.commit();

        debug!(
            bucket = %bucket.name,
            key = %key,
            upload_id = %upload_id,
            part_number,
            size = part.size,
            "part uploaded"
        );
        self.release_parts(replaced);
        Ok(part)
    }

    /// List the parts of an upload in ascending order.
    pub async fn list_object_parts(
        &self,
        ctx: &RequestContext,
        input: ListObjectPartsInput,
    ) -> S3ServiceResult<ListObjectPartsOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::MultipartUpload)?;
        let max_parts = input.max_parts.unwrap_or(MAX_LISTING).min(MAX_LISTING);
        let marker = input.part_number_marker.unwrap_or(0);

        let upload = match bucket.multipart_uploads.get(&input.upload_id) {
            Some(upload) if upload.key == input.key => upload,
            _ => return Err(no_such_upload(&input.upload_id)),
        };

        let mut parts: Vec<UploadPart> = upload
            .parts
            .range(marker.saturating_add(1)..)
            .take(max_parts + 1)
            .map(|(_, part)| part.clone())
            .collect();
        let is_truncated = parts.len() > max_parts;
        parts.truncate(max_parts);
        let next_part_number_marker = if is_truncated {
            parts.last().map(|p| p.part_number)
        } else {
            None
        };

        Ok(ListObjectPartsOutput {
            bucket: bucket.name.clone(),
            key: upload.key.clone(),
            upload_id: upload.upload_id.clone(),
            initiator: upload.initiator.clone(),
            owner: upload.owner.clone(),
            storage_class: upload.storage_class.clone(),
            checksum_algorithm: upload.checksum_algorithm,
            parts,
            max_parts,
            is_truncated,
            next_part_number_marker,
        })
    }

    /// List in-progress uploads sorted by key, then initiation time.
    pub async fn list_multipart_uploads(
        &self,
        ctx: &RequestContext,
        input: ListMultipartUploadsInput,
    ) -> S3ServiceResult<ListMultipartUploadsOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::ListMultipartUploads)?;
        let max_uploads = input.max_uploads.unwrap_or(MAX_LISTING).min(MAX_LISTING);
        let prefix = input.prefix.unwrap_or_default();
        let key_marker = input.key_marker.unwrap_or_default();
        let upload_id_marker = input.upload_id_marker.unwrap_or_default();

        let mut uploads: Vec<UploadInfo> = bucket
            .multipart_uploads
            .iter()
            .filter(|entry| entry.key.starts_with(&prefix))
            .map(|entry| UploadInfo {
                upload_id: entry.upload_id.clone(),
                key: entry.key.clone(),
                initiated: entry.initiated,
                initiator: entry.initiator.clone(),
                owner: entry.owner.clone(),
                storage_class: entry.storage_class.clone(),
            })
            .collect();
        uploads.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then(a.initiated.cmp(&b.initiated))
                .then_with(|| a.upload_id.cmp(&b.upload_id))
        });

        let start = if key_marker.is_empty() {
            0
        } else {
            let after_key = uploads.partition_point(|u| u.key <= key_marker);
            if upload_id_marker.is_empty() {
                after_key
            } else {
                uploads
                    .iter()
                    .position(|u| u.key == key_marker && u.upload_id == upload_id_marker)
                    .map_or(after_key, |pos| pos + 1)
            }
        };

        let mut page: Vec<UploadInfo> = uploads.into_iter().skip(start).take(max_uploads + 1).collect();
        let is_truncated = page.len() > max_uploads;
        page.truncate(max_uploads);
        let (next_key_marker, next_upload_id_marker) = match page.last() {
            Some(last) if is_truncated => (Some(last.key.clone()), Some(last.upload_id.clone())),
            _ => (None, None),
        };

        Ok(ListMultipartUploadsOutput {
            bucket: bucket.name.clone(),
            prefix,
            max_uploads,
            uploads: page,
            is_truncated,
            next_key_marker,
            next_upload_id_marker,
        })
    }

    /// Abandon an upload and release its parts.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] unless the session is `Initiated`.
    pub async fn abort_multipart_upload(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> S3ServiceResult<()> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, bucket, Action::MultipartUpload)?;
        let (_, mut upload) = bucket
            .multipart_uploads
            .remove_if(upload_id, |_, upload| upload.key == key && upload.is_active())
            .ok_or_else(|| no_such_upload(upload_id))?;

        let parts = upload.finish(UploadState::Aborted);
        info!(bucket = %bucket.name, key = %key, upload_id = %upload_id, parts = parts.len(), "multipart upload aborted");
        self.release_parts(parts);
        Ok(())
    }

    /// Assemble the listed parts into a new version of the upload's key.
    ///
    /// Validation failures leave the session untouched. Only one completion
    /// of a session can succeed; a failure after the claim (cancellation,
    /// I/O, bucket deleted) returns the session to `Initiated`.
    pub async fn complete_multipart_upload(
        &self,
        ctx: &RequestContext,
        input: CompleteMultipartUploadInput,
    ) -> S3ServiceResult<CompleteMultipartUploadOutput> {
        ctx.check()?;
        let bucket = self.authorized_bucket(ctx, &input.bucket, Action::MultipartUpload)?;

        let plan = {
            let mut upload = match bucket.multipart_uploads.get_mut(&input.upload_id) {
                Some(upload) if upload.key == input.key => upload,
                _ => return Err(no_such_upload(&input.upload_id)),
            };
            upload.ensure_active()?;
            let plan = upload.plan_completion(&input.parts, self.config.min_part_size)?;
            if plan.iter().map(|p| p.size).sum::<u64>() > self.config.max_object_size {
                return Err(S3ServiceError::EntityTooLarge);
            }
            upload.begin_completion()?;
            plan
        };
        let claim = CompletionClaim {
            bucket: &bucket,
            upload_id: &input.upload_id,
            armed: true,
        };

        let contents: Vec<_> = plan.iter().map(|p| p.content.clone()).collect();
        let written = ctx.run(self.storage.concat(&contents)).await?;
        let staged = StagedContent::new(Arc::clone(&self.storage), written.content.clone());
        ctx.check()?;

        let object = bucket
            .multipart_uploads
            .get(&input.upload_id)
            .map(|upload| upload.assemble(&plan, written.content.clone()))
            .ok_or_else(|| no_such_upload(&input.upload_id))?;
        let committed = self.commit_version(&bucket, object, staged, None)?;

        let parts = claim.finish();
        info!(
            bucket = %bucket.name,
            key = %input.key,
            upload_id = %input.upload_id,
            parts = plan.len(),
            size = committed.size,
            "multipart upload completed"
        );
        self.release_parts(parts);

        Ok(CompleteMultipartUploadOutput {
            bucket: bucket.name.clone(),
            key: committed.key,
            etag: committed.etag,
            version_id: reported_version_id(&committed.version_id),
            size: committed.size,
            checksum: committed.checksum,
        })
    }
}
