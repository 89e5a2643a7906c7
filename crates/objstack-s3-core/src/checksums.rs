//! Digest and checksum computation.
//!
//! Every stored byte stream gets an MD5 digest (the source of its ETag).
//! Callers may additionally request one of the S3 checksum algorithms
//! (CRC32, CRC32C, SHA1, SHA256); those are reported base64-encoded.
//!
//! Bodies are hashed incrementally with [`StreamingHasher`] as they are
//! copied into the content store, so no body is ever buffered just to be
//! hashed. Multipart objects get composite values derived from the per-part
//! digests ([`compute_multipart_etag`], [`compute_composite_checksum`]).

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use digest::Digest;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChecksumAlgorithm
// ---------------------------------------------------------------------------

/// Additional checksum algorithms (MD5 is always computed for the ETag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChecksumAlgorithm {
    /// CRC-32 (IEEE 802.3).
    Crc32,
    /// CRC-32C (Castagnoli).
    Crc32c,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`ChecksumAlgorithm`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown checksum algorithm: {0}")]
pub struct ParseChecksumAlgorithmError(String);

impl FromStr for ChecksumAlgorithm {
    type Err = ParseChecksumAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRC32" => Ok(Self::Crc32),
            "CRC32C" => Ok(Self::Crc32c),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            _ => Err(ParseChecksumAlgorithmError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ChecksumValue
// ---------------------------------------------------------------------------

/// A base64-encoded checksum paired with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumValue {
    /// The algorithm used to compute this checksum.
    pub algorithm: ChecksumAlgorithm,
    /// The base64-encoded checksum. Composite values carry a `-N` suffix.
    pub value: String,
}

impl ChecksumValue {
    /// Pair an algorithm with an already-encoded value.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::checksums::compute_md5;
///
/// assert_eq!(compute_md5(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(md5::Md5::digest(data))
}

/// Quoted hex MD5 of `data`, the ETag of a single-part object.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    etag_from_md5_hex(&compute_md5(data))
}

/// Quote a hex MD5 digest as an ETag.
#[must_use]
pub fn etag_from_md5_hex(md5_hex: &str) -> String {
    format!("\"{md5_hex}\"")
}

/// Composite ETag of a multipart object.
///
/// MD5 over the concatenated binary MD5 digests of the parts, in assembly
/// order, rendered as `"<hex>-<N>"`. Quoted or unquoted part digests are
/// both accepted.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::checksums::{compute_md5, compute_multipart_etag};
///
/// let etag = compute_multipart_etag(&[compute_md5(b"a"), compute_md5(b"b")]);
/// assert!(etag.ends_with("-2\""));
/// ```
#[must_use]
pub fn compute_multipart_etag(part_md5_hexes: &[impl AsRef<str>]) -> String {
    let mut hasher = md5::Md5::new();
    for part in part_md5_hexes {
        if let Ok(raw) = hex::decode(part.as_ref().trim_matches('"')) {
            Digest::update(&mut hasher, &raw);
        }
    }
    format!(
        "\"{}-{}\"",
        hex::encode(hasher.finalize()),
        part_md5_hexes.len()
    )
}

/// Base64-encoded checksum of `data` for one algorithm.
#[must_use]
pub fn compute_checksum(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut state = AlgorithmState::new(algorithm);
    state.update(data);
    state.finish().value
}

/// Composite checksum of a multipart object.
///
/// The checksum of the concatenated raw part checksums, base64-encoded with a
/// `-<N>` suffix.
#[must_use]
pub fn compute_composite_checksum(
    algorithm: ChecksumAlgorithm,
    part_checksums_b64: &[impl AsRef<str>],
) -> String {
    let mut state = AlgorithmState::new(algorithm);
    for part in part_checksums_b64 {
        if let Ok(raw) = BASE64_STANDARD.decode(part.as_ref()) {
            state.update(&raw);
        }
    }
    format!("{}-{}", state.finish().value, part_checksums_b64.len())
}

// ---------------------------------------------------------------------------
// StreamingHasher
// ---------------------------------------------------------------------------

/// Digests of a fully hashed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasherResult {
    /// Hex-encoded MD5 digest.
    pub md5_hex: String,
    /// Requested checksums, in request order.
    pub checksums: Vec<ChecksumValue>,
}

impl HasherResult {
    /// The checksum computed for `algorithm`, if it was requested.
    #[must_use]
    pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Option<&ChecksumValue> {
        self.checksums.iter().find(|c| c.algorithm == algorithm)
    }
}

/// Running state of one additional algorithm.
#[derive(Debug, Clone)]
enum AlgorithmState {
    Crc32(crc32fast::Hasher),
    Crc32c(u32),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

impl AlgorithmState {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Crc32c => Self::Crc32c(0),
            ChecksumAlgorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Crc32(h) => h.update(data),
            Self::Crc32c(v) => *v = crc32c::crc32c_append(*v, data),
            Self::Sha1(h) => Digest::update(h, data),
            Self::Sha256(h) => Digest::update(h, data),
        }
    }

    fn finish(self) -> ChecksumValue {
        match self {
            Self::Crc32(h) => ChecksumValue::new(
                ChecksumAlgorithm::Crc32,
                BASE64_STANDARD.encode(h.finalize().to_be_bytes()),
            ),
            Self::Crc32c(v) => ChecksumValue::new(
                ChecksumAlgorithm::Crc32c,
                BASE64_STANDARD.encode(v.to_be_bytes()),
            ),
            Self::Sha1(h) => {
                ChecksumValue::new(ChecksumAlgorithm::Sha1, BASE64_STANDARD.encode(h.finalize()))
            }
            Self::Sha256(h) => ChecksumValue::new(
                ChecksumAlgorithm::Sha256,
                BASE64_STANDARD.encode(h.finalize()),
            ),
        }
    }
}

/// Incremental MD5 plus any requested checksums over a chunked stream.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::checksums::{ChecksumAlgorithm, StreamingHasher};
///
/// let mut hasher = StreamingHasher::new(&[ChecksumAlgorithm::Sha256]);
/// hasher.update(b"hello ");
/// hasher.update(b"world");
/// let result = hasher.finish();
/// assert_eq!(result.checksums.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct StreamingHasher {
    md5: md5::Md5,
    extra: Vec<AlgorithmState>,
}

impl StreamingHasher {
    /// Create a hasher computing MD5 plus `algorithms` (duplicates ignored).
    #[must_use]
    pub fn new(algorithms: &[ChecksumAlgorithm]) -> Self {
        let mut seen = Vec::with_capacity(algorithms.len());
        for &algo in algorithms {
            if !seen.contains(&algo) {
                seen.push(algo);
            }
        }
        Self {
            md5: md5::Md5::new(),
            extra: seen.into_iter().map(AlgorithmState::new).collect(),
        }
    }

    /// Feed more data.
    pub fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.md5, data);
        for state in &mut self.extra {
            state.update(data);
        }
    }

    /// Finalize all digests.
    #[must_use]
    pub fn finish(self) -> HasherResult {
        HasherResult {
            md5_hex: hex::encode(self.md5.finalize()),
            checksums: self.extra.into_iter().map(AlgorithmState::finish).collect(),
        }
    }
}
