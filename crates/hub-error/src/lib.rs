//! Unified error taxonomy with stable error codes for the storage hub.
//!
//! Every hub error carries a [`HubErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by [`HubError::new`]
//! to construct errors fluently; the HTTP layer renders them via
//! [`HubErrorCode::http_status`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// HubErrorCode
// ---------------------------------------------------------------------------

/// The ten error kinds named by the hub request pipeline.
///
/// Serialises to `camelCase` to match the wire vocabulary the clients of
/// this hub already speak (`validation`, `authTokenTimestamp`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HubErrorCode {
    /// Token, scope, or request shape failed validation.
    Validation,
    /// Token `iat` is older than the bucket's revocation floor.
    AuthTokenTimestamp,
    /// Relative path failed the `..` sanity check.
    BadPath,
    /// A request body was semantically invalid (bad JSON shape, bad content type).
    InvalidInput,
    /// The target object does not exist.
    DoesNotExist,
    /// A per-endpoint mutation is already in flight.
    Conflict,
    /// The signer did not present a valid association/ownership proof.
    NotEnoughProof,
    /// Request body exceeded the configured size cap.
    PayloadTooLarge,
    /// An `If-Match`/`If-None-Match` precondition was not satisfied.
    PreconditionFailed,
    /// Catch-all for driver and other unexpected failures.
    ServerError,
}

impl HubErrorCode {
    /// The HTTP status this code renders as, per the hub's error → status table.
    ///
    /// Only the eight explicitly mapped kinds get a non-500 status; anything
    /// else (including [`HubErrorCode::InvalidInput`] and
    /// [`HubErrorCode::ServerError`]) maps to `500`, matching the literal
    /// "other → 500" rule.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 401,
            Self::AuthTokenTimestamp => 401,
            Self::BadPath => 403,
            Self::DoesNotExist => 404,
            Self::NotEnoughProof => 402,
            Self::Conflict => 409,
            Self::PayloadTooLarge => 413,
            Self::PreconditionFailed => 412,
            Self::InvalidInput | Self::ServerError => 500,
        }
    }

    /// Stable `&'static str` representation (e.g. `"validation"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::AuthTokenTimestamp => "authTokenTimestamp",
            Self::BadPath => "badPath",
            Self::InvalidInput => "invalidInput",
            Self::DoesNotExist => "doesNotExist",
            Self::Conflict => "conflict",
            Self::NotEnoughProof => "notEnoughProof",
            Self::PayloadTooLarge => "payloadTooLarge",
            Self::PreconditionFailed => "preconditionFailed",
            Self::ServerError => "serverError",
        }
    }
}

impl fmt::Display for HubErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HubError
// ---------------------------------------------------------------------------

/// Unified hub error.
///
/// Carries a stable [`HubErrorCode`], a human-readable message, an optional
/// underlying cause, and arbitrary structured context (e.g. the
/// `oldestValidTokenTimestamp` carried by [`HubErrorCode::AuthTokenTimestamp`]
/// or the `etag` carried by [`HubErrorCode::PreconditionFailed`]).
///
/// # Builder usage
///
/// ```
/// use hub_error::{HubError, HubErrorCode};
///
/// let err = HubError::new(HubErrorCode::PreconditionFailed, "etag mismatch")
///     .with_context("etag", "\"abc123\"");
/// ```
pub struct HubError {
    /// Machine-readable error code.
    pub code: HubErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for the response body.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl HubError {
    /// Create a new error with the given code and message.
    pub fn new(code: HubErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for [`HubErrorCode::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(HubErrorCode::Validation, message)
    }

    /// Shorthand for [`HubErrorCode::BadPath`].
    pub fn bad_path(message: impl Into<String>) -> Self {
        Self::new(HubErrorCode::BadPath, message)
    }

    /// Shorthand for [`HubErrorCode::DoesNotExist`].
    pub fn does_not_exist(message: impl Into<String>) -> Self {
        Self::new(HubErrorCode::DoesNotExist, message)
    }

    /// Attach a key-value pair to the diagnostic / response context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The HTTP status this error renders as.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Debug for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("HubError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: &[HubErrorCode] = &[
        HubErrorCode::Validation,
        HubErrorCode::AuthTokenTimestamp,
        HubErrorCode::BadPath,
        HubErrorCode::InvalidInput,
        HubErrorCode::DoesNotExist,
        HubErrorCode::Conflict,
        HubErrorCode::NotEnoughProof,
        HubErrorCode::PayloadTooLarge,
        HubErrorCode::PreconditionFailed,
        HubErrorCode::ServerError,
    ];

    #[test]
    fn status_mapping_matches_spec_table() {
        assert_eq!(HubErrorCode::Validation.http_status(), 401);
        assert_eq!(HubErrorCode::AuthTokenTimestamp.http_status(), 401);
        assert_eq!(HubErrorCode::BadPath.http_status(), 403);
        assert_eq!(HubErrorCode::DoesNotExist.http_status(), 404);
        assert_eq!(HubErrorCode::NotEnoughProof.http_status(), 402);
        assert_eq!(HubErrorCode::Conflict.http_status(), 409);
        assert_eq!(HubErrorCode::PayloadTooLarge.http_status(), 413);
        assert_eq!(HubErrorCode::PreconditionFailed.http_status(), 412);
        assert_eq!(HubErrorCode::InvalidInput.http_status(), 500);
        assert_eq!(HubErrorCode::ServerError.http_status(), 500);
    }

    #[test]
    fn display_without_context() {
        let err = HubError::new(HubErrorCode::DoesNotExist, "no such key");
        assert_eq!(err.to_string(), "[doesNotExist] no such key");
    }

    #[test]
    fn display_with_context() {
        let err = HubError::new(HubErrorCode::PreconditionFailed, "etag mismatch")
            .with_context("etag", "\"abc123\"");
        let s = err.to_string();
        assert!(s.starts_with("[preconditionFailed] etag mismatch"));
        assert!(s.contains("abc123"));
    }

    #[test]
    fn with_source_chains_through_std_error() {
        let src = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = HubError::new(HubErrorCode::ServerError, "driver failure").with_source(src);
        let chained = std::error::Error::source(&err).unwrap();
        assert_eq!(chained.to_string(), "missing");
    }

    #[test]
    fn shorthands_set_expected_code() {
        assert_eq!(HubError::validation("x").code, HubErrorCode::Validation);
        assert_eq!(HubError::bad_path("x").code, HubErrorCode::BadPath);
        assert_eq!(
            HubError::does_not_exist("x").code,
            HubErrorCode::DoesNotExist
        );
    }

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = std::collections::HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.as_str()));
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn serde_roundtrip_is_camel_case() {
        let json = serde_json::to_string(&HubErrorCode::AuthTokenTimestamp).unwrap();
        assert_eq!(json, "\"authTokenTimestamp\"");
        let back: HubErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HubErrorCode::AuthTokenTimestamp);
    }
}
