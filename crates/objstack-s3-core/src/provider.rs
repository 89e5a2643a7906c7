//! The storage engine facade.
//!
//! [`ObjStackS3`] owns the bucket registry, the content store and the
//! configuration. Individual operations are implemented in the `ops`
//! submodules as inherent methods; each takes a
//! [`RequestContext`](crate::context::RequestContext) carrying the caller
//! identity and cancellation.

use std::sync::Arc;

use tracing::debug;

use crate::config::S3Config;
use crate::state::{ObjectVersion, S3ServiceState, UploadPart};
use crate::storage::{ContentStore, InMemoryStorage};

/// How often a read or copy chases a version whose content was released
/// under it.
pub(crate) const READ_ATTEMPTS: usize = 3;

/// The object-storage engine.
///
/// All fields are `Arc`-wrapped for cheap cloning and shared ownership
/// across tasks.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::ObjStackS3;
/// use objstack_s3_core::config::S3Config;
///
/// let engine = ObjStackS3::new(S3Config::default());
/// assert_eq!(engine.config().default_region, "us-east-1");
/// ```
#[derive(Debug, Clone)]
pub struct ObjStackS3 {
    /// Bucket and object metadata.
    pub(crate) state: Arc<S3ServiceState>,
    /// Blob storage.
    pub(crate) storage: Arc<dyn ContentStore>,
    /// Engine configuration.
    pub(crate) config: Arc<S3Config>,
}

impl ObjStackS3 {
    /// Create an engine backed by [`InMemoryStorage`] sized from `config`.
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        let storage = InMemoryStorage::from_config(&config);
        Self::with_content_store(config, Arc::new(storage))
    }

    /// Create an engine on top of an existing content store.
    #[must_use]
    pub fn with_content_store(config: S3Config, storage: Arc<dyn ContentStore>) -> Self {
        Self {
            state: Arc::new(S3ServiceState::new()),
            storage,
            config: Arc::new(config),
        }
    }

    /// The bucket registry.
    #[must_use]
    pub fn state(&self) -> &S3ServiceState {
        &self.state
    }

    /// The content store.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn ContentStore> {
        &self.storage
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Drop every bucket, version, upload and blob.
    pub fn reset(&self) {
        let buckets = self.state.reset();
        debug!(buckets = buckets.len(), "engine reset");
        self.storage.reset();
    }

    /// Release the content owned by versions that left their chain.
    pub(crate) fn release_versions(&self, versions: impl IntoIterator<Item = ObjectVersion>) {
        for version in versions {
            if let Some(content) = version.content() {
                self.storage.release(content);
            }
        }
    }

    /// Release the content of parts that left their upload.
    pub(crate) fn release_parts(&self, parts: impl IntoIterator<Item = UploadPart>) {
        for part in parts {
            self.storage.release(&part.content);
        }
    }
}
