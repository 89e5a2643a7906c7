//! Authorization Guard.
//!
//! Every engine operation asks [`authorize`] whether the caller may perform
//! an [`Action`] against a resource described by a [`ResourceAcl`]. The
//! decision is a pure function of the identity, the resource's owner, the
//! owning bucket's owner and the resource's [`CannedAcl`]:
//!
//! | Canned ACL | Non-owner grants |
//! |------------|------------------|
//! | `private`, `aws-exec-read`, `log-delivery-write` | none |
//! | `public-read` | everyone: `READ` |
//! | `public-read-write` | everyone: `READ`, `WRITE` |
//! | `authenticated-read` | authenticated users: `READ` |
//! | `bucket-owner-read` | bucket owner: `READ` |
//! | `bucket-owner-full-control` | bucket owner: everything |
//!
//! The resource owner is always allowed. `FULL_CONTROL`-only actions (bucket
//! deletion) are never granted through a canned ACL.

use std::fmt;
use std::str::FromStr;

use objstack_core::Identity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::S3ServiceError;
use crate::state::Owner;

// ---------------------------------------------------------------------------
// CannedAcl
// ---------------------------------------------------------------------------

/// Predefined (canned) ACL of a bucket or object version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    /// Owner only (default).
    #[default]
    Private,
    /// Everyone may read.
    PublicRead,
    /// Everyone may read and write.
    PublicReadWrite,
    /// Authenticated users may read.
    AuthenticatedRead,
    /// Reserved for EC2 AMI bundles; grants nothing here.
    AwsExecRead,
    /// The bucket owner may read.
    BucketOwnerRead,
    /// The bucket owner has full control.
    BucketOwnerFullControl,
    /// Reserved for the log delivery group; grants nothing here.
    LogDeliveryWrite,
}

impl CannedAcl {
    /// The `x-amz-acl` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::AwsExecRead => "aws-exec-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
            Self::LogDeliveryWrite => "log-delivery-write",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`CannedAcl`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown canned ACL: {0}")]
pub struct ParseCannedAclError(String);

impl FromStr for CannedAcl {
    type Err = ParseCannedAclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            "aws-exec-read" => Ok(Self::AwsExecRead),
            "bucket-owner-read" => Ok(Self::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(Self::BucketOwnerFullControl),
            "log-delivery-write" => Ok(Self::LogDeliveryWrite),
            _ => Err(ParseCannedAclError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Permission / Action
// ---------------------------------------------------------------------------

/// A permission an action requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read object data or list a bucket.
    Read,
    /// Create, overwrite or delete objects in a bucket.
    Write,
    /// Read an ACL or bucket configuration.
    ReadAcp,
    /// Replace an ACL or bucket configuration.
    WriteAcp,
    /// All of the above plus owner-only actions.
    FullControl,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::ReadAcp => "READ_ACP",
            Self::WriteAcp => "WRITE_ACP",
            Self::FullControl => "FULL_CONTROL",
        })
    }
}

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read bucket metadata.
    GetBucketInfo,
    /// Delete a bucket.
    DeleteBucket,
    /// Read the bucket ACL.
    GetBucketAcl,
    /// Replace the bucket ACL.
    PutBucketAcl,
    /// Read bucket CORS rules.
    GetBucketCors,
    /// Replace or clear bucket CORS rules.
    PutBucketCors,
    /// Read the versioning mode.
    GetBucketVersioning,
    /// Change the versioning mode.
    PutBucketVersioning,
    /// List keys or versions.
    ListBucket,
    /// List in-progress multipart uploads.
    ListMultipartUploads,
    /// Read an object version.
    GetObject,
    /// Create a version (put, copy destination, completion).
    PutObject,
    /// Delete a key or version.
    DeleteObject,
    /// Read an object ACL.
    GetObjectAcl,
    /// Replace an object ACL.
    PutObjectAcl,
    /// Initiate, feed, list parts of, abort or complete an upload.
    MultipartUpload,
}

impl Action {
    /// The permission this action requires.
    #[must_use]
    pub fn permission(self) -> Permission {
        match self {
            Self::ListBucket | Self::ListMultipartUploads | Self::GetObject => Permission::Read,
            Self::PutObject | Self::DeleteObject | Self::MultipartUpload => Permission::Write,
            Self::GetBucketInfo
            | Self::GetBucketAcl
            | Self::GetBucketCors
            | Self::GetBucketVersioning
            | Self::GetObjectAcl => Permission::ReadAcp,
            Self::PutBucketAcl
            | Self::PutBucketCors
            | Self::PutBucketVersioning
            | Self::PutObjectAcl => Permission::WriteAcp,
            Self::DeleteBucket => Permission::FullControl,
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Ownership and canned ACL of the resource being accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAcl {
    /// Canonical ID of the resource owner.
    pub owner: String,
    /// Canonical ID of the owner of the bucket holding the resource.
    pub bucket_owner: String,
    /// The resource's canned ACL.
    pub canned: CannedAcl,
}

impl ResourceAcl {
    /// ACL of a bucket (the bucket owns itself).
    #[must_use]
    pub fn bucket(owner: &Owner, canned: CannedAcl) -> Self {
        Self {
            owner: owner.id.clone(),
            bucket_owner: owner.id.clone(),
            canned,
        }
    }

    /// ACL of an object version inside a bucket.
    #[must_use]
    pub fn object(owner: &Owner, bucket_owner: &Owner, canned: CannedAcl) -> Self {
        Self {
            owner: owner.id.clone(),
            bucket_owner: bucket_owner.id.clone(),
            canned,
        }
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused.
    Deny,
}

/// Decide whether `identity` may perform `action` on a resource.
///
/// # Examples
///
/// ```
/// use objstack_core::Identity;
/// use objstack_s3_core::auth::{Action, CannedAcl, Decision, ResourceAcl, evaluate};
///
/// let acl = ResourceAcl {
///     owner: "alice".to_owned(),
///     bucket_owner: "alice".to_owned(),
///     canned: CannedAcl::PublicRead,
/// };
/// assert_eq!(evaluate(&Identity::Anonymous, &acl, Action::GetObject), Decision::Allow);
/// assert_eq!(evaluate(&Identity::Anonymous, &acl, Action::PutObject), Decision::Deny);
/// ```
#[must_use]
pub fn evaluate(identity: &Identity, acl: &ResourceAcl, action: Action) -> Decision {
    if identity.is_user(&acl.owner) {
        return Decision::Allow;
    }

    let permission = action.permission();
    if permission == Permission::FullControl {
        return Decision::Deny;
    }

    let granted = match acl.canned {
        CannedAcl::PublicRead => permission == Permission::Read,
        CannedAcl::PublicReadWrite => matches!(permission, Permission::Read | Permission::Write),
        CannedAcl::AuthenticatedRead => {
            identity.is_authenticated() && permission == Permission::Read
        }
        CannedAcl::BucketOwnerRead => {
            identity.is_user(&acl.bucket_owner) && permission == Permission::Read
        }
        CannedAcl::BucketOwnerFullControl => identity.is_user(&acl.bucket_owner),
        CannedAcl::Private | CannedAcl::AwsExecRead | CannedAcl::LogDeliveryWrite => false,
    };

    if granted {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// [`evaluate`], turning a denial into [`S3ServiceError::AccessDenied`].
pub fn authorize(
    identity: &Identity,
    acl: &ResourceAcl,
    action: Action,
) -> Result<(), S3ServiceError> {
    match evaluate(identity, acl, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            debug!(
                caller = %identity,
                owner = %acl.owner,
                acl = %acl.canned,
                ?action,
                "access denied"
            );
            Err(S3ServiceError::AccessDenied)
        }
    }
}

// ---------------------------------------------------------------------------
// Grant expansion
// ---------------------------------------------------------------------------

/// URI of the everyone group.
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// URI of the authenticated-users group.
pub const AUTHENTICATED_USERS_URI: &str =
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// The entity a grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Grantee {
    /// A canonical user.
    CanonicalUser {
        /// Canonical user ID.
        id: String,
        /// Display name.
        display_name: String,
    },
    /// A predefined group.
    Group {
        /// Group URI.
        uri: String,
    },
}

/// One grantee/permission pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Who receives the permission.
    pub grantee: Grantee,
    /// What is granted.
    pub permission: Permission,
}

/// Expand a canned ACL into the explicit grant list reported by ACL getters.
#[must_use]
pub fn expand_grants(canned: CannedAcl, owner: &Owner, bucket_owner: &Owner) -> Vec<Grant> {
    let user = |o: &Owner, permission| Grant {
        grantee: Grantee::CanonicalUser {
            id: o.id.clone(),
            display_name: o.display_name.clone(),
        },
        permission,
    };
    let group = |uri: &str, permission| Grant {
        grantee: Grantee::Group {
            uri: uri.to_owned(),
        },
        permission,
    };

    let mut grants = vec![user(owner, Permission::FullControl)];
    match canned {
        CannedAcl::PublicRead => grants.push(group(ALL_USERS_URI, Permission::Read)),
        CannedAcl::PublicReadWrite => {
            grants.push(group(ALL_USERS_URI, Permission::Read));
            grants.push(group(ALL_USERS_URI, Permission::Write));
        }
        CannedAcl::AuthenticatedRead => {
            grants.push(group(AUTHENTICATED_USERS_URI, Permission::Read));
        }
        CannedAcl::BucketOwnerRead if bucket_owner.id != owner.id => {
            grants.push(user(bucket_owner, Permission::Read));
        }
        CannedAcl::BucketOwnerFullControl if bucket_owner.id != owner.id => {
            grants.push(user(bucket_owner, Permission::FullControl));
        }
        _ => {}
    }
    grants
}
