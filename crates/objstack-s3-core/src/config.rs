//! Engine configuration.
//!
//! Provides [`S3Config`] for tuning the storage engine. Values are loaded from
//! environment variables, falling back to S3's documented limits.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Largest `max-keys` value honored by listings.
pub const MAX_KEYS_CEILING: usize = 1000;

/// Storage engine configuration.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::config::S3Config;
///
/// let config = S3Config::default();
/// assert_eq!(config.min_part_size, 5 * 1024 * 1024);
/// assert_eq!(config.max_parts, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    /// Region assigned to buckets created without an explicit region.
    #[builder(default = String::from("us-east-1"))]
    pub default_region: String,

    /// Object size (in bytes) kept in memory before spilling to a temp file.
    #[builder(default = 524_288)]
    pub max_memory_object_size: usize,

    /// Minimum size of every multipart part except the last.
    #[builder(default = 5 * 1024 * 1024)]
    pub min_part_size: u64,

    /// Highest accepted part number.
    #[builder(default = 10_000)]
    pub max_parts: u32,

    /// Largest object a single put or completion may produce.
    #[builder(default = 5 * 1024 * 1024 * 1024 * 1024)]
    pub max_object_size: u64,

    /// Page size used when a listing does not specify `max-keys`.
    #[builder(default = 1000)]
    pub default_max_keys: usize,

    /// Buffer size used when streaming bodies into the content store.
    #[builder(default = 64 * 1024)]
    pub stream_chunk_size: usize,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            default_region: String::from("us-east-1"),
            max_memory_object_size: 524_288,
            min_part_size: 5 * 1024 * 1024,
            max_parts: 10_000,
            max_object_size: 5 * 1024 * 1024 * 1024 * 1024,
            default_max_keys: 1000,
            stream_chunk_size: 64 * 1024,
        }
    }
}

impl S3Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DEFAULT_REGION` | `us-east-1` |
    /// | `S3_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `S3_MIN_PART_SIZE` | `5242880` |
    /// | `S3_MAX_PARTS` | `10000` |
    /// | `S3_MAX_OBJECT_SIZE` | `5497558138880` |
    /// | `S3_DEFAULT_MAX_KEYS` | `1000` |
    /// | `S3_STREAM_CHUNK_SIZE` | `65536` |
    ///
    /// Unparsable numbers are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use objstack_s3_core::config::S3Config;
    ///
    /// let config = S3Config::from_env();
    /// assert!(!config.default_region.is_empty());
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DEFAULT_REGION") {
            if !v.is_empty() {
                config.default_region = v;
            }
        }
        if let Some(n) = env_number("S3_MAX_MEMORY_OBJECT_SIZE") {
            config.max_memory_object_size = n;
        }
        if let Some(n) = env_number("S3_MIN_PART_SIZE") {
            config.min_part_size = n;
        }
        if let Some(n) = env_number("S3_MAX_PARTS") {
            config.max_parts = n;
        }
        if let Some(n) = env_number("S3_MAX_OBJECT_SIZE") {
            config.max_object_size = n;
        }
        if let Some(n) = env_number::<usize>("S3_DEFAULT_MAX_KEYS") {
            config.default_max_keys = n.clamp(1, MAX_KEYS_CEILING);
        }
        if let Some(n) = env_number::<usize>("S3_STREAM_CHUNK_SIZE") {
            config.stream_chunk_size = n.max(1);
        }

        config
    }

    /// Resolve a caller-supplied `max-keys` against the default and ceiling.
    #[must_use]
    pub fn effective_max_keys(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_keys)
            .min(MAX_KEYS_CEILING)
    }
}

/// Read an environment variable as a number.
fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
