//! Operation outputs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{CannedAcl, Grant};
use crate::checksums::{ChecksumAlgorithm, ChecksumValue};
use crate::state::{
    NULL_VERSION_ID, Owner, S3Bucket, S3Object, UploadPart, VersionListEntry, VersioningStatus,
};

/// `None` for the `"null"` version, which S3 does not report.
pub(crate) fn reported_version_id(version_id: &str) -> Option<String> {
    (version_id != NULL_VERSION_ID).then(|| version_id.to_owned())
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Description of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Region.
    pub region: String,
    /// Creation time.
    pub creation_date: DateTime<Utc>,
    /// Owner.
    pub owner: Owner,
    /// Canned ACL.
    pub acl: CannedAcl,
    /// Versioning status.
    pub versioning: VersioningStatus,
}

impl From<&S3Bucket> for BucketInfo {
    fn from(bucket: &S3Bucket) -> Self {
        Self {
            name: bucket.name.clone(),
            region: bucket.region.clone(),
            creation_date: bucket.creation_date,
            owner: bucket.owner.clone(),
            acl: *bucket.acl.read(),
            versioning: bucket.versioning_status(),
        }
    }
}

/// An ACL as reported by the ACL getters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicy {
    /// Resource owner.
    pub owner: Owner,
    /// The canned ACL in effect.
    pub canned: CannedAcl,
    /// The canned ACL expanded into grants.
    pub grants: Vec<Grant>,
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Output of `put_object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// ETag of the new version.
    pub etag: String,
    /// Version ID, `None` for the `"null"` version.
    pub version_id: Option<String>,
    /// Stored size.
    pub size: u64,
    /// Additional checksum, when one was requested.
    pub checksum: Option<ChecksumValue>,
}

/// Output of `get_object`.
#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    /// The version that was read.
    pub object: S3Object,
    /// The requested bytes.
    pub body: Bytes,
    /// Inclusive byte range returned, when a range was requested.
    pub range: Option<(u64, u64)>,
}

impl GetObjectOutput {
    /// Version ID as S3 reports it.
    #[must_use]
    pub fn version_id(&self) -> Option<String> {
        reported_version_id(&self.object.version_id)
    }
}

/// Output of `copy_object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectOutput {
    /// ETag of the new version.
    pub etag: String,
    /// Version ID of the new version.
    pub version_id: Option<String>,
    /// Version ID of the source that was copied.
    pub source_version_id: Option<String>,
    /// Creation time of the new version.
    pub last_modified: DateTime<Utc>,
    /// Size of the new version.
    pub size: u64,
}

/// Output of `delete_object`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectOutput {
    /// Whether a delete marker was created, or a marker was purged.
    pub delete_marker: bool,
    /// Version ID of the created marker or the purged version.
    pub version_id: Option<String>,
}

/// Output of `list_objects`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOutput {
    /// Bucket listed.
    pub name: String,
    /// Prefix applied.
    pub prefix: String,
    /// Delimiter applied.
    pub delimiter: Option<String>,
    /// Effective page size.
    pub max_keys: usize,
    /// Current objects in key order.
    pub contents: Vec<S3Object>,
    /// Rolled-up common prefixes.
    pub common_prefixes: Vec<String>,
    /// Number of objects plus common prefixes returned.
    pub key_count: usize,
    /// Whether another page follows.
    pub is_truncated: bool,
    /// Token for the next page.
    pub next_continuation_token: Option<String>,
}

/// Output of `list_object_versions`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectVersionsOutput {
    /// Bucket listed.
    pub name: String,
    /// Prefix applied.
    pub prefix: String,
    /// Effective page size.
    pub max_keys: usize,
    /// Versions and delete markers, keys ascending then newest first.
    pub versions: Vec<VersionListEntry>,
    /// Rolled-up common prefixes.
    pub common_prefixes: Vec<String>,
    /// Whether another page follows.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page.
    pub next_version_id_marker: Option<String>,
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// Output of `new_multipart_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMultipartUploadOutput {
    /// Bucket of the upload.
    pub bucket: String,
    /// Key of the upload.
    pub key: String,
    /// The new upload ID.
    pub upload_id: String,
    /// Checksum algorithm parts are hashed with.
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
}

/// Output of `put_object_part` and `copy_object_part`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectPartOutput {
    /// ETag of the part.
    pub etag: String,
    /// Part number.
    pub part_number: u32,
    /// Stored size.
    pub size: u64,
    /// Checksum under the upload's algorithm.
    pub checksum: Option<ChecksumValue>,
    /// Upload time of the part.
    pub last_modified: DateTime<Utc>,
    /// Source version of a copied part.
    pub source_version_id: Option<String>,
}

/// Output of `list_object_parts`.
#[derive(Debug, Clone)]
pub struct ListObjectPartsOutput {
    /// Bucket of the upload.
    pub bucket: String,
    /// Key of the upload.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Who started the upload.
    pub initiator: Owner,
    /// Owner of the final object.
    pub owner: Owner,
    /// Storage class of the final object.
    pub storage_class: String,
    /// Checksum algorithm of the upload.
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Parts in ascending order.
    pub parts: Vec<UploadPart>,
    /// Effective page size.
    pub max_parts: usize,
    /// Whether another page follows.
    pub is_truncated: bool,
    /// Marker for the next page.
    pub next_part_number_marker: Option<u32>,
}

/// An in-progress upload in `list_multipart_uploads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    /// Upload ID.
    pub upload_id: String,
    /// Key of the upload.
    pub key: String,
    /// Initiation time.
    pub initiated: DateTime<Utc>,
    /// Who started the upload.
    pub initiator: Owner,
    /// Owner of the final object.
    pub owner: Owner,
    /// Storage class of the final object.
    pub storage_class: String,
}

/// Output of `list_multipart_uploads`.
#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsOutput {
    /// Bucket listed.
    pub bucket: String,
    /// Prefix applied.
    pub prefix: String,
    /// Effective page size.
    pub max_uploads: usize,
    /// Uploads sorted by key, then initiation time.
    pub uploads: Vec<UploadInfo>,
    /// Whether another page follows.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Upload-id marker for the next page.
    pub next_upload_id_marker: Option<String>,
}

/// Output of `complete_multipart_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMultipartUploadOutput {
    /// Bucket of the new object.
    pub bucket: String,
    /// Key of the new object.
    pub key: String,
    /// Composite ETag (`"<hex>-N"`).
    pub etag: String,
    /// Version ID of the new version.
    pub version_id: Option<String>,
    /// Total size.
    pub size: u64,
    /// Composite checksum, when the upload requested an algorithm.
    pub checksum: Option<ChecksumValue>,
}
