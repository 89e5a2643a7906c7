//! Object versions, delete markers and their metadata.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use objstack_core::Identity;
use serde::{Deserialize, Serialize};

use crate::auth::CannedAcl;
use crate::checksums::ChecksumValue;
use crate::storage::ContentRef;

/// Version ID of versions written while versioning is disabled or suspended.
pub const NULL_VERSION_ID: &str = "null";

/// Storage class recorded when the caller does not pick one.
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// The owner of a bucket, object version or upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// Canonical user ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
}

impl Owner {
    /// Create an owner record.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl From<&Identity> for Owner {
    fn from(identity: &Identity) -> Self {
        Self::new(identity.user_id(), identity.display_name())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.display_name, self.id)
    }
}

// ---------------------------------------------------------------------------
// ServerSideEncryption
// ---------------------------------------------------------------------------

/// Server-side encryption settings recorded on a version. Metadata only: the
/// engine stores and reports them but never encrypts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSideEncryption {
    /// `AES256`, `aws:kms` or `aws:kms:dsse`.
    pub algorithm: String,
    /// KMS key ID for the KMS algorithms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Whether an S3 Bucket Key is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_key_enabled: Option<bool>,
    /// SSE-C algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_algorithm: Option<String>,
    /// Base64 MD5 of the SSE-C key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_key_md5: Option<String>,
}

impl ServerSideEncryption {
    /// SSE with S3-managed keys.
    #[must_use]
    pub fn aes256() -> Self {
        Self {
            algorithm: "AES256".to_owned(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectMetadata
// ---------------------------------------------------------------------------

/// HTTP and user metadata stored with a version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content encoding (e.g. `gzip`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Content disposition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// Content language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// Cache control directives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Expiration date/time string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// User-defined metadata (`x-amz-meta-*`).
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// S3Object / S3DeleteMarker
// ---------------------------------------------------------------------------

/// A stored object version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Object {
    /// The object key.
    pub key: String,
    /// The version ID ([`NULL_VERSION_ID`] when unversioned).
    pub version_id: String,
    /// Quoted hex MD5, or `"<hex>-N"` for multipart objects.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time of this version.
    pub last_modified: DateTime<Utc>,
    /// Storage class.
    pub storage_class: String,
    /// HTTP and user metadata.
    pub metadata: ObjectMetadata,
    /// Who wrote this version.
    pub owner: Owner,
    /// Canned ACL of this version.
    pub acl: CannedAcl,
    /// Server-side encryption settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse: Option<ServerSideEncryption>,
    /// Additional checksum, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumValue>,
    /// Part count for multipart objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_count: Option<u32>,
    /// The bytes of this version.
    pub content: ContentRef,
}

/// A delete marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3DeleteMarker {
    /// The object key.
    pub key: String,
    /// The marker's version ID.
    pub version_id: String,
    /// When the marker was created.
    pub last_modified: DateTime<Utc>,
    /// Who deleted the object.
    pub owner: Owner,
}

// ---------------------------------------------------------------------------
// ObjectVersion
// ---------------------------------------------------------------------------

/// One entry of a version chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ObjectVersion {
    /// A real object version (boxed to keep the enum small).
    Object(Box<S3Object>),
    /// A delete marker.
    DeleteMarker(S3DeleteMarker),
}

impl ObjectVersion {
    /// The object key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.key,
            Self::DeleteMarker(dm) => &dm.key,
        }
    }

    /// The version ID.
    #[must_use]
    pub fn version_id(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.version_id,
            Self::DeleteMarker(dm) => &dm.version_id,
        }
    }

    /// Whether this is the `"null"` version.
    #[must_use]
    pub fn is_null_version(&self) -> bool {
        self.version_id() == NULL_VERSION_ID
    }

    /// Creation time.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::Object(obj) => obj.last_modified,
            Self::DeleteMarker(dm) => dm.last_modified,
        }
    }

    /// Whether this entry is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::DeleteMarker(_))
    }

    /// Who created this entry.
    #[must_use]
    pub fn owner(&self) -> &Owner {
        match self {
            Self::Object(obj) => &obj.owner,
            Self::DeleteMarker(dm) => &dm.owner,
        }
    }

    /// The object, if this is not a delete marker.
    #[must_use]
    pub fn as_object(&self) -> Option<&S3Object> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::DeleteMarker(_) => None,
        }
    }

    /// Mutable access to the object, if this is not a delete marker.
    pub fn as_object_mut(&mut self) -> Option<&mut S3Object> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::DeleteMarker(_) => None,
        }
    }

    /// The content reference this entry owns, if any.
    #[must_use]
    pub fn content(&self) -> Option<&ContentRef> {
        self.as_object().map(|obj| &obj.content)
    }
}

impl From<S3Object> for ObjectVersion {
    fn from(object: S3Object) -> Self {
        Self::Object(Box::new(object))
    }
}

impl From<S3DeleteMarker> for ObjectVersion {
    fn from(marker: S3DeleteMarker) -> Self {
        Self::DeleteMarker(marker)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_object(key: &str, version_id: &str) -> S3Object {
        S3Object {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
            etag: "\"d41d8cd98f00b204e9800998ecf8427e\"".to_owned(),
            size: 0,
            last_modified: Utc::now(),
            storage_class: DEFAULT_STORAGE_CLASS.to_owned(),
            metadata: ObjectMetadata::default(),
            owner: Owner::new("alice", "Alice"),
            acl: CannedAcl::Private,
            sse: None,
            checksum: None,
            parts_count: None,
            content: ContentRef::generate(),
        }
    }

    pub(crate) fn make_marker(key: &str, version_id: &str) -> S3DeleteMarker {
        S3DeleteMarker {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
            last_modified: Utc::now(),
            owner: Owner::new("alice", "Alice"),
        }
    }

    #[test]
    fn test_should_build_owner_from_identity() {
        let identity = Identity::user("u-1", "alice").unwrap_or_else(|e| panic!("identity: {e}"));
        let owner = Owner::from(&identity);
        assert_eq!(owner, Owner::new("u-1", "alice"));
        assert_eq!(owner.to_string(), "alice(u-1)");
        assert_eq!(Owner::from(&Identity::Anonymous).id, "anonymous");
    }

    #[test]
    fn test_should_access_object_version_fields() {
        let obj = make_object("my-key", NULL_VERSION_ID);
        let content = obj.content.clone();
        let version = ObjectVersion::from(obj);

        assert_eq!(version.key(), "my-key");
        assert!(version.is_null_version());
        assert!(!version.is_delete_marker());
        assert_eq!(version.content(), Some(&content));
    }

    #[test]
    fn test_should_access_delete_marker_fields() {
        let version = ObjectVersion::from(make_marker("gone", "v1"));
        assert_eq!(version.version_id(), "v1");
        assert!(version.is_delete_marker());
        assert!(version.as_object().is_none());
        assert!(version.content().is_none());
    }

    #[test]
    fn test_should_serialize_tagged_versions() {
        let json = serde_json::to_string(&ObjectVersion::from(make_marker("k", "v1")))
            .unwrap_or_else(|e| panic!("serialize: {e}"));
        assert!(json.contains("\"type\":\"deleteMarker\""));
    }
}
