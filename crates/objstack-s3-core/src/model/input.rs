//! Operation inputs.
//!
//! Small operations take plain arguments; the ones with many optional
//! parameters take one of these structs, built with `typed-builder`:
//!
//! ```
//! use objstack_s3_core::model::PutObjectInput;
//! use objstack_s3_core::storage::Body;
//!
//! let input = PutObjectInput::builder()
//!     .bucket("photos")
//!     .key("cat.jpg")
//!     .body(Body::from("meow"))
//!     .content_length(4)
//!     .build();
//! assert_eq!(input.key, "cat.jpg");
//! ```

use typed_builder::TypedBuilder;

use crate::auth::CannedAcl;
use crate::checksums::{ChecksumAlgorithm, ChecksumValue};
use crate::copy::{CopySource, MetadataDirective};
use crate::state::{CompletedPart, ObjectMetadata, ServerSideEncryption};
use crate::storage::Body;

/// Which bytes of an object to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteRange {
    /// `length` bytes starting at `offset`; to the end when `length` is
    /// `None`.
    Offset {
        /// First byte.
        offset: u64,
        /// Number of bytes.
        length: Option<u64>,
    },
    /// An HTTP `Range` header value such as `bytes=0-99`.
    Header(String),
}

/// Input of `put_object`.
#[derive(Debug, TypedBuilder)]
pub struct PutObjectInput {
    /// Target bucket.
    #[builder(setter(into))]
    pub bucket: String,
    /// Target key.
    #[builder(setter(into))]
    pub key: String,
    /// Object bytes.
    pub body: Body,
    /// Declared size of `body`.
    pub content_length: u64,
    /// Base64 MD5 the body must match.
    #[builder(default, setter(into, strip_option))]
    pub content_md5: Option<String>,
    /// Algorithm for an additional checksum computed while streaming.
    #[builder(default, setter(strip_option))]
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Additional checksum the body must match; implies its algorithm.
    #[builder(default, setter(strip_option))]
    pub checksum: Option<ChecksumValue>,
    /// HTTP and user metadata.
    #[builder(default)]
    pub metadata: ObjectMetadata,
    /// Canned ACL of the new version; `private` when absent.
    #[builder(default, setter(strip_option))]
    pub acl: Option<CannedAcl>,
    /// SSE settings recorded on the version.
    #[builder(default, setter(strip_option))]
    pub sse: Option<ServerSideEncryption>,
    /// Storage class; `STANDARD` when absent.
    #[builder(default, setter(into, strip_option))]
    pub storage_class: Option<String>,
    /// Write only if the current ETag matches.
    #[builder(default, setter(into, strip_option))]
    pub if_match: Option<String>,
    /// Write only if no current object exists (`*`).
    #[builder(default, setter(into, strip_option))]
    pub if_none_match: Option<String>,
}

/// Input of `get_object` / `get_object_info`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct GetObjectInput {
    /// Source bucket.
    #[builder(setter(into))]
    pub bucket: String,
    /// Source key.
    #[builder(setter(into))]
    pub key: String,
    /// Specific version; latest when absent.
    #[builder(default, setter(into, strip_option))]
    pub version_id: Option<String>,
    /// Byte range to return.
    #[builder(default, setter(strip_option))]
    pub range: Option<ByteRange>,
}

/// Input of `copy_object`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CopyObjectInput {
    /// Where the bytes come from.
    pub source: CopySource,
    /// Destination bucket.
    #[builder(setter(into))]
    pub bucket: String,
    /// Destination key.
    #[builder(setter(into))]
    pub key: String,
    /// Whether metadata comes from the source or from this input.
    #[builder(default)]
    pub metadata_directive: MetadataDirective,
    /// Metadata used with [`MetadataDirective::Replace`].
    #[builder(default)]
    pub metadata: ObjectMetadata,
    /// Canned ACL of the new version; `private` when absent.
    #[builder(default, setter(strip_option))]
    pub acl: Option<CannedAcl>,
    /// SSE override; the source's settings are kept when absent.
    #[builder(default, setter(strip_option))]
    pub sse: Option<ServerSideEncryption>,
    /// Storage class override.
    #[builder(default, setter(into, strip_option))]
    pub storage_class: Option<String>,
    /// Algorithm for an additional checksum of the copy.
    #[builder(default, setter(strip_option))]
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
}

/// Input of `list_objects`.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ListObjectsInput {
    /// Bucket to list.
    #[builder(setter(into))]
    pub bucket: String,
    /// Only keys starting with this prefix.
    #[builder(default, setter(into, strip_option))]
    pub prefix: Option<String>,
    /// Roll keys up into common prefixes at this delimiter.
    #[builder(default, setter(into, strip_option))]
    pub delimiter: Option<String>,
    /// Start after this key.
    #[builder(default, setter(into, strip_option))]
    pub start_after: Option<String>,
    /// Opaque token from a previous truncated page; wins over `start_after`.
    #[builder(default, setter(into, strip_option))]
    pub continuation_token: Option<String>,
    /// Page size; configured default when absent, capped at 1000.
    #[builder(default, setter(strip_option))]
    pub max_keys: Option<usize>,
}

/// Input of `list_object_versions`.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ListObjectVersionsInput {
    /// Bucket to list.
    #[builder(setter(into))]
    pub bucket: String,
    /// Only keys starting with this prefix.
    #[builder(default, setter(into, strip_option))]
    pub prefix: Option<String>,
    /// Roll keys up into common prefixes at this delimiter.
    #[builder(default, setter(into, strip_option))]
    pub delimiter: Option<String>,
    /// Resume at this key.
    #[builder(default, setter(into, strip_option))]
    pub key_marker: Option<String>,
    /// Resume inside `key_marker` after this version.
    #[builder(default, setter(into, strip_option))]
    pub version_id_marker: Option<String>,
    /// Page size.
    #[builder(default, setter(strip_option))]
    pub max_keys: Option<usize>,
}

/// Input of `new_multipart_upload`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewMultipartUploadInput {
    /// Destination bucket.
    #[builder(setter(into))]
    pub bucket: String,
    /// Destination key.
    #[builder(setter(into))]
    pub key: String,
    /// Metadata of the final object.
    #[builder(default)]
    pub metadata: ObjectMetadata,
    /// ACL of the final object.
    #[builder(default, setter(strip_option))]
    pub acl: Option<CannedAcl>,
    /// SSE settings of the final object.
    #[builder(default, setter(strip_option))]
    pub sse: Option<ServerSideEncryption>,
    /// Checksum algorithm every part is hashed with.
    #[builder(default, setter(strip_option))]
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Storage class of the final object.
    #[builder(default, setter(into, strip_option))]
    pub storage_class: Option<String>,
}

/// Input of `put_object_part`.
#[derive(Debug, TypedBuilder)]
pub struct PutObjectPartInput {
    /// Bucket of the upload.
    #[builder(setter(into))]
    pub bucket: String,
    /// Key of the upload.
    #[builder(setter(into))]
    pub key: String,
    /// Upload ID.
    #[builder(setter(into))]
    pub upload_id: String,
    /// Part number, `1..=max_parts`.
    pub part_number: u32,
    /// Part bytes.
    pub body: Body,
    /// Declared size of `body`.
    pub content_length: u64,
    /// Base64 MD5 the body must match.
    #[builder(default, setter(into, strip_option))]
    pub content_md5: Option<String>,
    /// Checksum the body must match.
    #[builder(default, setter(strip_option))]
    pub checksum: Option<ChecksumValue>,
}

/// Input of `copy_object_part`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CopyObjectPartInput {
    /// Where the bytes come from (a range selects part of the source).
    pub source: CopySource,
    /// Bucket of the upload.
    #[builder(setter(into))]
    pub bucket: String,
    /// Key of the upload.
    #[builder(setter(into))]
    pub key: String,
    /// Upload ID.
    #[builder(setter(into))]
    pub upload_id: String,
    /// Part number, `1..=max_parts`.
    pub part_number: u32,
}

/// Input of `list_object_parts`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ListObjectPartsInput {
    /// Bucket of the upload.
    #[builder(setter(into))]
    pub bucket: String,
    /// Key of the upload.
    #[builder(setter(into))]
    pub key: String,
    /// Upload ID.
    #[builder(setter(into))]
    pub upload_id: String,
    /// List parts after this number.
    #[builder(default, setter(strip_option))]
    pub part_number_marker: Option<u32>,
    /// Page size; 1000 when absent.
    #[builder(default, setter(strip_option))]
    pub max_parts: Option<usize>,
}

/// Input of `list_multipart_uploads`.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ListMultipartUploadsInput {
    /// Bucket to list.
    #[builder(setter(into))]
    pub bucket: String,
    /// Only keys starting with this prefix.
    #[builder(default, setter(into, strip_option))]
    pub prefix: Option<String>,
    /// Resume at this key.
    #[builder(default, setter(into, strip_option))]
    pub key_marker: Option<String>,
    /// Resume inside `key_marker` after this upload.
    #[builder(default, setter(into, strip_option))]
    pub upload_id_marker: Option<String>,
    /// Page size; 1000 when absent.
    #[builder(default, setter(strip_option))]
    pub max_uploads: Option<usize>,
}

/// Input of `complete_multipart_upload`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CompleteMultipartUploadInput {
    /// Bucket of the upload.
    #[builder(setter(into))]
    pub bucket: String,
    /// Key of the upload.
    #[builder(setter(into))]
    pub key: String,
    /// Upload ID.
    #[builder(setter(into))]
    pub upload_id: String,
    /// Parts to assemble, strictly ascending.
    pub parts: Vec<CompletedPart>,
}
