//! In-memory engine state.
//!
//! - [`S3ServiceState`]: the bucket registry
//! - [`S3Bucket`]: per-bucket configuration, key arena and upload table
//! - [`ObjectStore`] / [`VersionChain`]: keys and their version history
//! - [`S3Object`] / [`S3DeleteMarker`] / [`ObjectVersion`]: version records
//! - [`MultipartUpload`] / [`UploadPart`]: upload sessions
//!
//! # Thread Safety
//!
//! All types are `Send + Sync`. There is no global lock:
//!
//! - `DashMap` for the bucket table and each bucket's upload table; the
//!   upload entry lock is the per-upload CAS unit
//! - one `parking_lot::Mutex` per key for its version chain
//! - `parking_lot::RwLock` for bucket configuration and the commit gate

pub(crate) mod bucket;
pub(crate) mod keystore;
pub(crate) mod multipart;
pub(crate) mod object;
pub(crate) mod service;
pub(crate) mod version;

pub use bucket::{S3Bucket, VersioningStatus};
pub use keystore::{ListResult, ObjectStore, VersionListEntry, VersionListResult};
pub use multipart::{CompletedPart, MultipartUpload, UploadPart, UploadState};
pub use object::{
    DEFAULT_STORAGE_CLASS, NULL_VERSION_ID, ObjectMetadata, ObjectVersion, Owner, S3DeleteMarker,
    S3Object, ServerSideEncryption,
};
pub use service::S3ServiceState;
pub use version::{DeleteOutcome, VersionChain};
