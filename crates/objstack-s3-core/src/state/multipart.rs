//! Multipart upload sessions.
//!
//! A [`MultipartUpload`] captures the metadata given at initiation and
//! accumulates [`UploadPart`] entries. Its [`UploadState`] is the CAS unit
//! that decides which of several racing Complete/Abort calls wins:
//!
//! ```text
//! Initiated ──complete──► Completing ──► Completed
//!     │    ▲                  │
//!     │    └──── revert ──────┘
//!     └──abort──► Aborted
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::object::{
    DEFAULT_STORAGE_CLASS, NULL_VERSION_ID, ObjectMetadata, Owner, S3Object, ServerSideEncryption,
};
use crate::auth::CannedAcl;
use crate::checksums::{
    ChecksumAlgorithm, ChecksumValue, compute_composite_checksum, compute_multipart_etag,
};
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::storage::ContentRef;
use crate::utils::normalize_etag;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    /// Accepting parts.
    #[default]
    Initiated,
    /// Claimed by a completion that is assembling the object.
    Completing,
    /// Terminal: the object was committed.
    Completed,
    /// Terminal: the upload was abandoned.
    Aborted,
}

/// An in-progress multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUpload {
    /// Unguessable upload identifier.
    pub upload_id: String,
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
    /// The caller that started the upload.
    pub initiator: Owner,
    /// Owner of the object the upload will create.
    pub owner: Owner,
    /// Metadata applied to the final object.
    pub metadata: ObjectMetadata,
    /// ACL applied to the final object.
    pub acl: CannedAcl,
    /// SSE settings applied to the final object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse: Option<ServerSideEncryption>,
    /// Checksum algorithm every part is hashed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Storage class of the final object.
    pub storage_class: String,
    /// Lifecycle state.
    pub state: UploadState,
    /// Uploaded parts keyed by part number.
    pub parts: BTreeMap<u32, UploadPart>,
}

/// A single uploaded part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPart {
    /// Part number (1-based).
    pub part_number: u32,
    /// Quoted hex MD5 of the part.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
    /// Checksum under the upload's algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumValue>,
    /// The part's bytes.
    pub content: ContentRef,
}

/// A part named in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// Part number.
    pub part_number: u32,
    /// Expected ETag; unchecked when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl CompletedPart {
    /// A part reference carrying its ETag.
    #[must_use]
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: Some(etag.into()),
        }
    }
}

impl MultipartUpload {
    /// Create a session in the [`UploadState::Initiated`] state.
    #[must_use]
    pub fn new(
        upload_id: String,
        bucket: String,
        key: String,
        initiator: Owner,
        owner: Owner,
        metadata: ObjectMetadata,
    ) -> Self {
        Self {
            upload_id,
            bucket,
            key,
            initiated: Utc::now(),
            initiator,
            owner,
            metadata,
            acl: CannedAcl::Private,
            sse: None,
            checksum_algorithm: None,
            storage_class: DEFAULT_STORAGE_CLASS.to_owned(),
            state: UploadState::Initiated,
            parts: BTreeMap::new(),
        }
    }

    /// Whether the session still accepts parts and completion.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == UploadState::Initiated
    }

    /// Fail with `NoSuchUpload` unless the session is active.
    pub fn ensure_active(&self) -> S3ServiceResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(self.no_such_upload())
        }
    }

    /// Insert or replace a part, returning the replaced one.
    pub fn put_part(&mut self, part: UploadPart) -> Option<UploadPart> {
        self.parts.insert(part.part_number, part)
    }

    /// Get a part by number.
    #[must_use]
    pub fn get_part(&self, part_number: u32) -> Option<&UploadPart> {
        self.parts.get(&part_number)
    }

    /// Number of parts uploaded so far.
    #[must_use]
    pub fn parts_count(&self) -> usize {
        self.parts.len()
    }

    /// Total size of all uploaded parts.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.parts.values().map(|p| p.size).sum()
    }

    /// Validate a completion request and select the parts it names, in order.
    ///
    /// Nothing is changed; a failed plan leaves the session untouched.
    pub fn plan_completion(
        &self,
        requested: &[CompletedPart],
        min_part_size: u64,
    ) -> S3ServiceResult<Vec<UploadPart>> {
        if requested.is_empty() {
            return Err(S3ServiceError::invalid_argument(
                "You must specify at least one part",
            ));
        }
        if requested
            .windows(2)
            .any(|pair| pair[0].part_number >= pair[1].part_number)
        {
            return Err(S3ServiceError::InvalidPartOrder);
        }

        let mut selected = Vec::with_capacity(requested.len());
        for wanted in requested {
            let invalid = || S3ServiceError::InvalidPart {
                part_number: wanted.part_number,
            };
            let part = self.get_part(wanted.part_number).ok_or_else(invalid)?;
            if let Some(etag) = &wanted.etag {
                if normalize_etag(etag) != normalize_etag(&part.etag) {
                    return Err(invalid());
                }
            }
            selected.push(part.clone());
        }

        if let Some((_, leading)) = selected.split_last() {
            if leading.iter().any(|part| part.size < min_part_size) {
                return Err(S3ServiceError::EntityTooSmall);
            }
        }
        Ok(selected)
    }

    /// Claim the session for completion: `Initiated -> Completing`.
    pub fn begin_completion(&mut self) -> S3ServiceResult<()> {
        self.ensure_active()?;
        self.state = UploadState::Completing;
        Ok(())
    }

    /// Release a completion claim: `Completing -> Initiated`.
    pub fn revert_completion(&mut self) {
        if self.state == UploadState::Completing {
            self.state = UploadState::Initiated;
        }
    }

    /// Move to a terminal state and hand back every part for release.
    pub fn finish(&mut self, state: UploadState) -> Vec<UploadPart> {
        self.state = state;
        std::mem::take(&mut self.parts).into_values().collect()
    }

    /// The error reported for a session that is gone or claimed.
    #[must_use]
    pub fn no_such_upload(&self) -> S3ServiceError {
        S3ServiceError::NoSuchUpload {
            upload_id: self.upload_id.clone(),
        }
    }

    /// Build the object a completion creates from its planned parts and the
    /// concatenated content. The version ID is assigned at commit.
    ///
    /// The composite checksum is only produced when every part carries a
    /// checksum under the session's algorithm.
    #[must_use]
    pub fn assemble(&self, parts: &[UploadPart], content: ContentRef) -> S3Object {
        let etags: Vec<&str> = parts.iter().map(|p| p.etag.as_str()).collect();
        let checksum = self.checksum_algorithm.and_then(|algorithm| {
            let values = parts
                .iter()
                .map(|p| {
                    p.checksum
                        .as_ref()
                        .filter(|c| c.algorithm == algorithm)
                        .map(|c| c.value.as_str())
                })
                .collect::<Option<Vec<_>>>()?;
            Some(ChecksumValue::new(
                algorithm,
                compute_composite_checksum(algorithm, &values),
            ))
        });

        S3Object {
            key: self.key.clone(),
            version_id: NULL_VERSION_ID.to_owned(),
            etag: compute_multipart_etag(&etags),
            size: parts.iter().map(|p| p.size).sum(),
            last_modified: Utc::now(),
            storage_class: self.storage_class.clone(),
            metadata: self.metadata.clone(),
            owner: self.owner.clone(),
            acl: self.acl,
            sse: self.sse.clone(),
            checksum,
            parts_count: u32::try_from(parts.len()).ok(),
            content,
        }
    }
}
