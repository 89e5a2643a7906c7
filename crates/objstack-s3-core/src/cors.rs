//! CORS rules and request matching.
//!
//! A bucket holds an ordered rule list. An incoming request (actual or
//! pre-flight) is evaluated against the rules in order and the first rule
//! whose origin, method and requested headers all match wins.

use serde::{Deserialize, Serialize};

use crate::error::S3ServiceError;

/// Methods a CORS rule may allow.
const CORS_METHODS: &[&str] = &["GET", "PUT", "POST", "DELETE", "HEAD"];

// ---------------------------------------------------------------------------
// CorsRule
// ---------------------------------------------------------------------------

/// A single CORS rule of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    /// Optional rule identifier.
    pub id: Option<String>,
    /// Allowed origins. `*` matches any origin, and one `*` inside a pattern
    /// matches any substring (e.g. `https://*.example.com`).
    pub allowed_origins: Vec<String>,
    /// Allowed methods (`GET`, `PUT`, `POST`, `DELETE`, `HEAD`).
    pub allowed_methods: Vec<String>,
    /// Allowed request headers, case-insensitive, with the same wildcard rule.
    pub allowed_headers: Vec<String>,
    /// Response headers the browser may read.
    pub expose_headers: Vec<String>,
    /// How long the browser may cache a pre-flight result.
    pub max_age_seconds: Option<i32>,
}

impl CorsRule {
    fn matches(&self, origin: &str, method: &str, request_headers: &[String]) -> bool {
        self.allowed_origins
            .iter()
            .any(|pattern| match_origin(pattern, origin))
            && self
                .allowed_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method))
            && request_headers.iter().all(|header| {
                self.allowed_headers
                    .iter()
                    .any(|allowed| wildcard_match(&allowed.to_ascii_lowercase(), &header.to_ascii_lowercase()))
            })
    }
}

/// The outcome of a successful match: what the response headers should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsMatch {
    /// The matching rule's ID, if any.
    pub rule_id: Option<String>,
    /// `Access-Control-Allow-Origin`: `*` for a bare wildcard rule, the
    /// requesting origin otherwise.
    pub allowed_origin: String,
    /// `Access-Control-Allow-Methods`.
    pub allowed_methods: Vec<String>,
    /// `Access-Control-Allow-Headers`: the requested headers that matched.
    pub allowed_headers: Vec<String>,
    /// `Access-Control-Expose-Headers`.
    pub expose_headers: Vec<String>,
    /// `Access-Control-Max-Age`.
    pub max_age_seconds: Option<i32>,
}

// ---------------------------------------------------------------------------
// Validation and matching
// ---------------------------------------------------------------------------

/// Validate a rule set before it replaces a bucket's configuration.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] for an empty set, a rule
/// without origins or methods, an unsupported method, or an origin with more
/// than one wildcard.
pub fn validate_cors_rules(rules: &[CorsRule]) -> Result<(), S3ServiceError> {
    if rules.is_empty() {
        return Err(S3ServiceError::invalid_argument(
            "CORS configuration must contain at least one rule",
        ));
    }
    for rule in rules {
        if rule.allowed_origins.is_empty() || rule.allowed_methods.is_empty() {
            return Err(S3ServiceError::invalid_argument(
                "Each CORS rule must name at least one origin and one method",
            ));
        }
        if let Some(method) = rule
            .allowed_methods
            .iter()
            .find(|m| !CORS_METHODS.contains(&m.to_ascii_uppercase().as_str()))
        {
            return Err(S3ServiceError::invalid_argument(format!(
                "Found unsupported HTTP method in CORS config. Unsupported method is {method}"
            )));
        }
        if let Some(origin) = rule
            .allowed_origins
            .iter()
            .find(|o| o.matches('*').count() > 1)
        {
            return Err(S3ServiceError::invalid_argument(format!(
                "AllowedOrigin \"{origin}\" can not have more than one wildcard"
            )));
        }
    }
    Ok(())
}

/// Evaluate a request against an ordered rule list.
///
/// `request_headers` are the headers a pre-flight asks for (empty for an
/// actual request).
#[must_use]
pub fn match_rules(
    rules: &[CorsRule],
    origin: &str,
    method: &str,
    request_headers: &[String],
) -> Option<CorsMatch> {
    let rule = rules
        .iter()
        .find(|rule| rule.matches(origin, method, request_headers))?;

    let allowed_origin = if rule.allowed_origins.iter().any(|o| o == "*") {
        "*".to_owned()
    } else {
        origin.to_owned()
    };

    Some(CorsMatch {
        rule_id: rule.id.clone(),
        allowed_origin,
        allowed_methods: rule.allowed_methods.clone(),
        allowed_headers: request_headers.to_vec(),
        expose_headers: rule.expose_headers.clone(),
        max_age_seconds: rule.max_age_seconds,
    })
}

/// Match an origin against a rule pattern.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::cors::match_origin;
///
/// assert!(match_origin("*", "https://anything.test"));
/// assert!(match_origin("https://*.example.com", "https://app.example.com"));
/// assert!(!match_origin("https://*.example.com", "http://app.example.com"));
/// ```
#[must_use]
pub fn match_origin(pattern: &str, origin: &str) -> bool {
    wildcard_match(pattern, origin)
}

/// Match `value` against a pattern containing at most one `*`.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == value,
        Some((head, tail)) => {
            value.len() >= head.len() + tail.len()
                && value.starts_with(head)
                && value.ends_with(tail)
        }
    }
}
