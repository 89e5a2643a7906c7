//! Request validation.
//!
//! Bucket names follow the
//! [Amazon S3 naming rules](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html).
//! Digest checks are split in two: the header is decoded before any byte is
//! streamed ([`decode_content_md5`]), and compared against the digest
//! computed while streaming once the body has been stored
//! ([`verify_content_md5`], [`verify_checksum`]).

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::net::Ipv4Addr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::checksums::{ChecksumValue, HasherResult};
use crate::error::S3ServiceError;

/// Maximum total size (in bytes) of all user-defined metadata keys and values.
const MAX_METADATA_SIZE: usize = 2048;

/// Maximum object key length in bytes.
const MAX_KEY_BYTES: usize = 1024;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Prefixes S3 reserves for its own use.
const RESERVED_PREFIXES: &[&str] = &["xn--", "sthree-", "amzn-s3-demo-"];

/// Suffixes S3 reserves for access point and object lambda aliases.
const RESERVED_SUFFIXES: &[&str] = &["-s3alias", "--ol-s3", ".mrap", "--x-s3"];

fn invalid_bucket(name: &str, reason: impl Into<String>) -> S3ServiceError {
    S3ServiceError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

/// Validate a bucket name.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidBucketName`] naming the first violated rule.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-valid-bucket").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), S3ServiceError> {
    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(invalid_bucket(
            name,
            format!(
                "Bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
            ),
        ));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid_bucket(
            name,
            "Bucket name must only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = name.as_bytes();
    if !alnum(bytes[0]) || !alnum(bytes[len - 1]) {
        return Err(invalid_bucket(
            name,
            "Bucket name must start and end with a letter or number",
        ));
    }

    if name.contains("..") {
        return Err(invalid_bucket(
            name,
            "Bucket name must not contain consecutive dots",
        ));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid_bucket(
            name,
            "Bucket name must not be formatted as an IP address",
        ));
    }

    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| name.starts_with(*p)) {
        return Err(invalid_bucket(
            name,
            format!("Bucket name must not start with '{prefix}'"),
        ));
    }

    if let Some(suffix) = RESERVED_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
        return Err(invalid_bucket(
            name,
            format!("Bucket name must not end with '{suffix}'"),
        ));
    }

    Ok(())
}

/// Validate an object key: 1-1024 bytes of UTF-8.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] for an empty key and
/// [`S3ServiceError::KeyTooLong`] above 1024 bytes.
pub fn validate_object_key(key: &str) -> Result<(), S3ServiceError> {
    if key.is_empty() {
        return Err(S3ServiceError::invalid_argument(
            "Object key must not be empty",
        ));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(S3ServiceError::KeyTooLong);
    }
    Ok(())
}

/// Validate user-defined metadata: keys plus values at most 2 KiB in total.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] when the limit is exceeded.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use objstack_s3_core::validation::validate_metadata;
///
/// let mut meta = HashMap::new();
/// meta.insert("color".to_owned(), "blue".to_owned());
/// assert!(validate_metadata(&meta).is_ok());
/// ```
pub fn validate_metadata<S: BuildHasher>(
    metadata: &HashMap<String, String, S>,
) -> Result<(), S3ServiceError> {
    let total_size: usize = metadata.iter().map(|(k, v)| k.len() + v.len()).sum();
    if total_size > MAX_METADATA_SIZE {
        return Err(S3ServiceError::invalid_argument(format!(
            "User-defined metadata must not exceed {MAX_METADATA_SIZE} bytes, got {total_size}"
        )));
    }
    Ok(())
}

/// Validate a multipart part number against the configured ceiling.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] outside `1..=max_parts`.
pub fn validate_part_number(part_number: u32, max_parts: u32) -> Result<(), S3ServiceError> {
    if part_number == 0 || part_number > max_parts {
        return Err(S3ServiceError::invalid_argument(format!(
            "Part number must be an integer between 1 and {max_parts}, inclusive"
        )));
    }
    Ok(())
}

/// Decode a `Content-MD5` header into the hex digest it names.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidDigest`] unless the value is base64 of
/// exactly 16 bytes.
pub fn decode_content_md5(content_md5: Option<&str>) -> Result<Option<String>, S3ServiceError> {
    let Some(encoded) = content_md5 else {
        return Ok(None);
    };
    let raw = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| S3ServiceError::InvalidDigest)?;
    if raw.len() != 16 {
        return Err(S3ServiceError::InvalidDigest);
    }
    Ok(Some(hex::encode(raw)))
}

/// Compare a decoded `Content-MD5` against the digest of the stored body.
///
/// # Errors
///
/// Returns [`S3ServiceError::BadDigest`] on mismatch.
pub fn verify_content_md5(
    expected_md5_hex: Option<&str>,
    actual_md5_hex: &str,
) -> Result<(), S3ServiceError> {
    match expected_md5_hex {
        Some(expected) if !expected.eq_ignore_ascii_case(actual_md5_hex) => {
            Err(S3ServiceError::BadDigest)
        }
        _ => Ok(()),
    }
}

/// Compare a caller-supplied additional checksum against the computed one.
///
/// # Errors
///
/// Returns [`S3ServiceError::BadDigest`] when the value differs or the
/// algorithm was not computed.
pub fn verify_checksum(
    expected: Option<&ChecksumValue>,
    actual: &HasherResult,
) -> Result<(), S3ServiceError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match actual.checksum(expected.algorithm) {
        Some(computed) if computed.value == expected.value => Ok(()),
        _ => Err(S3ServiceError::BadDigest),
    }
}
