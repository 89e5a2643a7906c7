//! Error types for the ObjStack core types.

/// Core error type for identity and account handling.
#[derive(Debug, thiserror::Error)]
pub enum ObjStackError {
    /// Invalid AWS account ID format.
    #[error("invalid AWS account ID: {0} (must be 12-digit numeric string)")]
    InvalidAccountId(String),

    /// A user identity is missing a required field.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for ObjStack core operations.
pub type ObjStackResult<T> = Result<T, ObjStackError>;
