//! Shared helpers: identifiers, byte ranges, conditional ETag matching,
//! continuation tokens and copy-source parsing.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::Utc;
use rand::RngExt;
use uuid::Uuid;

use crate::error::S3ServiceError;

// ---------------------------------------------------------------------------
// ID generation
// ---------------------------------------------------------------------------

/// Last timestamp handed out by [`generate_version_id`], in microseconds.
static LAST_VERSION_MICROS: AtomicU64 = AtomicU64::new(0);

/// Generate a version ID that sorts by creation time.
///
/// The first 16 hex digits are a strictly increasing microsecond clock; the
/// remaining 8 are random so IDs from separate processes do not collide.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::utils::generate_version_id;
///
/// let a = generate_version_id();
/// let b = generate_version_id();
/// assert!(a < b);
/// assert_eq!(a.len(), 24);
/// ```
#[must_use]
pub fn generate_version_id() -> String {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
    let micros = match LAST_VERSION_MICROS.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(last) | Err(last) => now.max(last + 1),
    };
    let mut suffix = [0u8; 4];
    rand::rng().fill(&mut suffix);
    format!("{micros:016x}{}", hex::encode(suffix))
}

/// Generate an unguessable multipart upload ID (32 random bytes, hex).
#[must_use]
pub fn generate_upload_id() -> String {
    let mut buf = [0u8; 32];
    rand::rng().fill(&mut buf);
    hex::encode(buf)
}

/// Generate an opaque content reference ID.
#[must_use]
pub fn generate_content_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Byte ranges
// ---------------------------------------------------------------------------

/// Parse an HTTP `Range` header into an inclusive `(start, end)` pair.
///
/// Supported forms: `bytes=N-M`, `bytes=N-` and `bytes=-N`. An end past the
/// object is clamped.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidRange`] if the header is malformed or the
/// range cannot be satisfied.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::utils::parse_range_header;
///
/// assert_eq!(parse_range_header("bytes=0-499", 1000).ok(), Some((0, 499)));
/// assert_eq!(parse_range_header("bytes=-100", 1000).ok(), Some((900, 999)));
/// ```
pub fn parse_range_header(range: &str, content_length: u64) -> Result<(u64, u64), S3ServiceError> {
    let spec = range
        .trim()
        .strip_prefix("bytes=")
        .ok_or(S3ServiceError::InvalidRange)?;
    if content_length == 0 || spec.contains(',') {
        return Err(S3ServiceError::InvalidRange);
    }

    let (first, last) = spec.split_once('-').ok_or(S3ServiceError::InvalidRange)?;
    let parse = |s: &str| s.parse::<u64>().map_err(|_| S3ServiceError::InvalidRange);

    match (first.is_empty(), last.is_empty()) {
        // bytes=-N: the final N bytes.
        (true, false) => {
            let n = parse(last)?;
            if n == 0 {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok((content_length.saturating_sub(n), content_length - 1))
        }
        // bytes=N-
        (false, true) => {
            let start = parse(first)?;
            if start >= content_length {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok((start, content_length - 1))
        }
        (false, false) => {
            let start = parse(first)?;
            let end = parse(last)?;
            if start > end || start >= content_length {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok((start, end.min(content_length - 1)))
        }
        (true, true) => Err(S3ServiceError::InvalidRange),
    }
}

/// Resolve an `(offset, length)` request into an inclusive range.
///
/// A missing length reads to the end. A zero-length object only accepts a
/// zero offset with no length, which yields `None` (read nothing).
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidRange`] if the range falls outside the
/// object.
pub fn resolve_offset_range(
    offset: u64,
    length: Option<u64>,
    content_length: u64,
) -> Result<Option<(u64, u64)>, S3ServiceError> {
    if offset == 0 && length.is_none() {
        return Ok(None);
    }
    if offset >= content_length {
        return Err(S3ServiceError::InvalidRange);
    }
    let end = match length {
        Some(0) => return Err(S3ServiceError::InvalidRange),
        Some(len) => offset
            .checked_add(len - 1)
            .filter(|end| *end < content_length)
            .ok_or(S3ServiceError::InvalidRange)?,
        None => content_length - 1,
    };
    Ok(Some((offset, end)))
}

// ---------------------------------------------------------------------------
// Conditional request helpers
// ---------------------------------------------------------------------------

/// Whether `etag` satisfies an `If-Match` condition (`*` matches anything).
///
/// # Examples
///
/// ```
/// use objstack_s3_core::utils::is_valid_if_match;
///
/// assert!(is_valid_if_match("\"abc\"", "*"));
/// assert!(is_valid_if_match("\"abc\"", "abc"));
/// assert!(!is_valid_if_match("\"abc\"", "\"xyz\""));
/// ```
#[must_use]
pub fn is_valid_if_match(etag: &str, if_match: &str) -> bool {
    if_match.trim() == "*" || normalize_etag(etag) == normalize_etag(if_match)
}

/// Whether `etag` satisfies an `If-None-Match` condition.
///
/// `false` means the ETags match (or `*` was given).
#[must_use]
pub fn is_valid_if_none_match(etag: &str, if_none_match: &str) -> bool {
    if_none_match.trim() != "*" && normalize_etag(etag) != normalize_etag(if_none_match)
}

/// Strip whitespace and surrounding double quotes from an ETag.
#[must_use]
pub fn normalize_etag(etag: &str) -> &str {
    let etag = etag.trim();
    etag.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(etag)
}

// ---------------------------------------------------------------------------
// Continuation tokens
// ---------------------------------------------------------------------------

/// Encode a listing position as an opaque continuation token.
#[must_use]
pub fn encode_continuation_token(key: &str) -> String {
    BASE64_STANDARD.encode(key.as_bytes())
}

/// Decode a continuation token back into a listing position.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] if the token is not base64 or
/// not UTF-8.
pub fn decode_continuation_token(token: &str) -> Result<String, S3ServiceError> {
    let bytes = BASE64_STANDARD
        .decode(token)
        .map_err(|_| S3ServiceError::invalid_argument("The continuation token provided is incorrect"))?;
    String::from_utf8(bytes)
        .map_err(|_| S3ServiceError::invalid_argument("The continuation token provided is incorrect"))
}

// ---------------------------------------------------------------------------
// Copy source parsing
// ---------------------------------------------------------------------------

/// A parsed `x-amz-copy-source` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySourcePath {
    /// Source bucket.
    pub bucket: String,
    /// Source key, percent-decoded.
    pub key: String,
    /// Optional source version.
    pub version_id: Option<String>,
}

/// Parse `"[/]bucket/key[?versionId=v]"` with a percent-encoded key.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] if the value is malformed.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::utils::parse_copy_source;
///
/// let src = parse_copy_source("/photos/2024%2Fcat.jpg?versionId=v1").unwrap();
/// assert_eq!(src.bucket, "photos");
/// assert_eq!(src.key, "2024/cat.jpg");
/// assert_eq!(src.version_id.as_deref(), Some("v1"));
/// ```
pub fn parse_copy_source(source: &str) -> Result<CopySourcePath, S3ServiceError> {
    let source = source.strip_prefix('/').unwrap_or(source);

    let (path, version_id) = match source.split_once('?') {
        Some((path, query)) => (
            path,
            query
                .split('&')
                .find_map(|param| param.strip_prefix("versionId="))
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
        ),
        None => (source, None),
    };

    let (bucket, key) = path.split_once('/').ok_or_else(|| {
        S3ServiceError::invalid_argument("Invalid copy source: expected bucket/key")
    })?;
    if bucket.is_empty() || key.is_empty() {
        return Err(S3ServiceError::invalid_argument(
            "Invalid copy source: bucket and key must not be empty",
        ));
    }

    let key = percent_encoding::percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| S3ServiceError::invalid_argument("Invalid copy source: key is not UTF-8"))?
        .into_owned();

    Ok(CopySourcePath {
        bucket: bucket.to_owned(),
        key,
        version_id,
    })
}
