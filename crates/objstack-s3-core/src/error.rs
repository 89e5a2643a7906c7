//! Engine error types.
//!
//! Defines [`S3ServiceError`], a domain-specific error enum covering every S3
//! error the engine may produce. Each variant carries its S3 error code via
//! [`S3ServiceError::code`] and belongs to one [`ErrorKind`] of the engine's
//! error taxonomy, so a protocol front end can map it onto its own wire
//! representation without matching on individual variants.
//!
//! # Usage
//!
//! ```
//! use objstack_s3_core::error::{ErrorKind, S3ServiceError};
//!
//! let err = S3ServiceError::NoSuchBucket {
//!     bucket: "my-bucket".to_owned(),
//! };
//! assert_eq!(err.code(), "NoSuchBucket");
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! ```

/// S3 service error type.
#[derive(Debug, thiserror::Error)]
pub enum S3ServiceError {
    // -----------------------------------------------------------------------
    // Bucket errors
    // -----------------------------------------------------------------------
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The requested bucket name is not available (owned by someone else).
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket already exists and is owned by the caller.
    #[error(
        "Your previous request to create the named bucket succeeded and you already own it: {bucket}"
    )]
    BucketAlreadyOwnedByYou {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket is not empty and cannot be deleted.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The bucket name that is not empty.
        bucket: String,
    },

    // -----------------------------------------------------------------------
    // Object / key errors
    // -----------------------------------------------------------------------
    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified version does not exist.
    #[error("The specified version does not exist: key={key}, version_id={version_id}")]
    NoSuchVersion {
        /// The key for the version.
        key: String,
        /// The version ID that was not found.
        version_id: String,
    },

    // -----------------------------------------------------------------------
    // Multipart upload errors
    // -----------------------------------------------------------------------
    /// The specified multipart upload does not exist or is no longer active.
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// The list of parts was not in ascending order.
    #[error("The list of parts was not in ascending order")]
    InvalidPartOrder,

    /// One or more of the specified parts could not be found.
    #[error("One or more of the specified parts could not be found: part {part_number}")]
    InvalidPart {
        /// The offending part number.
        part_number: u32,
    },

    /// A proposed upload part is smaller than the minimum allowed size.
    #[error("Your proposed upload is smaller than the minimum allowed object size")]
    EntityTooSmall,

    /// The entity body is too large.
    #[error("Your proposed upload exceeds the maximum allowed object size")]
    EntityTooLarge,

    // -----------------------------------------------------------------------
    // Validation errors
    // -----------------------------------------------------------------------
    /// The specified bucket name is not valid.
    #[error("Invalid bucket name: {name}: {reason}")]
    InvalidBucketName {
        /// The invalid bucket name.
        name: String,
        /// The reason for the error.
        reason: String,
    },

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The requested range is not satisfiable.
    #[error("The requested range is not satisfiable")]
    InvalidRange,

    /// The key is too long.
    #[error("Your key is too long")]
    KeyTooLong,

    // -----------------------------------------------------------------------
    // Authorization / access errors
    // -----------------------------------------------------------------------
    /// Access denied.
    #[error("Access Denied")]
    AccessDenied,

    /// The method is not allowed against this resource (e.g. a delete marker).
    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    // -----------------------------------------------------------------------
    // Conditional request errors
    // -----------------------------------------------------------------------
    /// A precondition specified in the request was not met.
    #[error("At least one of the preconditions you specified did not hold")]
    PreconditionFailed,

    /// The key changed between the precondition check and the commit.
    #[error("A conflicting operation occurred. If using PutObject you can retry the request")]
    ConditionalRequestConflict,

    // -----------------------------------------------------------------------
    // Digest / content errors
    // -----------------------------------------------------------------------
    /// The Content-MD5 you specified is invalid.
    #[error("The Content-MD5 you specified is not valid")]
    InvalidDigest,

    /// The Content-MD5 or checksum you specified did not match what we received.
    #[error("The Content-MD5 you specified did not match what we received")]
    BadDigest,

    /// The body length did not match the declared size.
    #[error(
        "You did not provide the number of bytes specified by the Content-Length HTTP header: expected {expected}, received {received}"
    )]
    IncompleteBody {
        /// Declared size.
        expected: u64,
        /// Bytes actually streamed.
        received: u64,
    },

    /// A content reference no longer resolves in the content store.
    #[error("Content {content} is no longer available")]
    ContentNotFound {
        /// The dangling content reference.
        content: String,
    },

    // -----------------------------------------------------------------------
    // Configuration-not-found errors
    // -----------------------------------------------------------------------
    /// The CORS configuration does not exist.
    #[error("The CORS configuration does not exist")]
    NoSuchCorsConfiguration,

    // -----------------------------------------------------------------------
    // Request lifecycle errors
    // -----------------------------------------------------------------------
    /// The caller cancelled the request.
    #[error("The request was cancelled")]
    RequestCancelled,

    /// The request deadline elapsed before the operation finished.
    #[error("Your socket connection to the server was not read from or written to within the timeout period")]
    RequestTimeout,

    // -----------------------------------------------------------------------
    // Internal / catch-all
    // -----------------------------------------------------------------------
    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse error taxonomy shared by every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bucket, key, version, upload or configuration is absent.
    NotFound,
    /// Bucket name already taken.
    AlreadyExists,
    /// The Authorization Guard denied the action.
    AccessDenied,
    /// A concurrent mutation invalidated the request; retrying may succeed.
    Conflict,
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// Body shorter or longer than declared.
    IncompleteBody,
    /// Digest mismatch or undecodable digest.
    BadDigest,
    /// A non-final part below the minimum part size.
    EntityTooSmall,
    /// Completion list not strictly ascending.
    InvalidPartOrder,
    /// Completion names a missing part or a mismatching ETag.
    InvalidPart,
    /// Bucket still holds versions or uploads.
    NotEmpty,
    /// A conditional header did not hold.
    PreconditionFailed,
    /// Cancelled or timed out.
    Cancelled,
    /// Unexpected failure.
    Internal,
}

impl S3ServiceError {
    /// The S3 error code string for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::BucketAlreadyExists { .. } => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou { .. } => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty { .. } => "BucketNotEmpty",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchVersion { .. } => "NoSuchVersion",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidPart { .. } => "InvalidPart",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::InvalidRange => "InvalidRange",
            Self::KeyTooLong => "KeyTooLongError",
            Self::AccessDenied => "AccessDenied",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::ConditionalRequestConflict => "ConditionalRequestConflict",
            Self::InvalidDigest => "InvalidDigest",
            Self::BadDigest => "BadDigest",
            Self::IncompleteBody { .. } => "IncompleteBody",
            Self::NoSuchCorsConfiguration => "NoSuchCORSConfiguration",
            Self::RequestCancelled => "RequestCancelled",
            Self::RequestTimeout => "RequestTimeout",
            Self::ContentNotFound { .. } | Self::Internal(_) => "InternalError",
        }
    }

    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchBucket { .. }
            | Self::NoSuchKey { .. }
            | Self::NoSuchVersion { .. }
            | Self::NoSuchUpload { .. }
            | Self::NoSuchCorsConfiguration => ErrorKind::NotFound,
            Self::BucketAlreadyExists { .. } | Self::BucketAlreadyOwnedByYou { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::BucketNotEmpty { .. } => ErrorKind::NotEmpty,
            Self::InvalidPartOrder => ErrorKind::InvalidPartOrder,
            Self::InvalidPart { .. } => ErrorKind::InvalidPart,
            Self::EntityTooSmall => ErrorKind::EntityTooSmall,
            Self::EntityTooLarge
            | Self::InvalidBucketName { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidRange
            | Self::KeyTooLong
            | Self::MethodNotAllowed => ErrorKind::InvalidArgument,
            Self::AccessDenied => ErrorKind::AccessDenied,
            Self::PreconditionFailed => ErrorKind::PreconditionFailed,
            Self::ConditionalRequestConflict => ErrorKind::Conflict,
            Self::InvalidDigest | Self::BadDigest => ErrorKind::BadDigest,
            Self::IncompleteBody { .. } => ErrorKind::IncompleteBody,
            Self::RequestCancelled | Self::RequestTimeout => ErrorKind::Cancelled,
            Self::ContentNotFound { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same request may succeed if retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Cancelled)
    }

    /// Shorthand for [`S3ServiceError::InvalidArgument`].
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Convenience result type for S3 service operations.
pub type S3ServiceResult<T> = Result<T, S3ServiceError>;
