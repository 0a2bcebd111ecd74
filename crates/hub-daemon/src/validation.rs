// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request validation for the hub's HTTP API.

use hub_core::object::ObjectKey;
use hub_core::principal::Address;
use hub_error::{HubError, HubErrorCode};
use hub_json_guard::{validate_json_object, JsonGuardLimits};
use serde_json::Value;

/// Maximum allowed length of a `Content-Type` header value.
const MAX_CONTENT_TYPE_LENGTH: usize = 1024;

/// Maximum body size for `list-files` and `revoke-all` JSON bodies.
const MAX_SMALL_BODY_BYTES: usize = 4 * 1024;

/// Maximum nesting depth accepted for `list-files`/`revoke-all`/`perform-files` bodies.
const MAX_JSON_DEPTH: usize = 16;

/// Validates incoming API requests before processing.
pub struct RequestValidator;

impl RequestValidator {
    /// Reject a relative path containing `..`, building the [`ObjectKey`]
    /// the handler will operate on.
    pub fn validate_path(bucket: Address, relative_path: impl Into<String>) -> Result<ObjectKey, HubError> {
        ObjectKey::new(bucket, relative_path).map_err(|_| HubError::bad_path("path contains '..'"))
    }

    /// Default `application/octet-stream` when absent, reject anything
    /// longer than [`MAX_CONTENT_TYPE_LENGTH`].
    pub fn validate_content_type(raw: Option<&str>) -> Result<String, HubError> {
        let content_type = raw.unwrap_or("application/octet-stream");
        if content_type.len() > MAX_CONTENT_TYPE_LENGTH {
            return Err(HubError::validation(format!(
                "content-type header exceeds {MAX_CONTENT_TYPE_LENGTH} characters"
            )));
        }
        Ok(content_type.to_string())
    }

    /// Parse and validate a small (`list-files`/`revoke-all`) JSON body:
    /// must already fit within [`MAX_SMALL_BODY_BYTES`] and be a JSON object
    /// within [`MAX_JSON_DEPTH`] levels of nesting.
    pub fn validate_small_body(body: &[u8]) -> Result<Value, HubError> {
        if body.len() > MAX_SMALL_BODY_BYTES {
            return Err(HubError::new(
                HubErrorCode::PayloadTooLarge,
                format!("body exceeds {MAX_SMALL_BODY_BYTES} bytes"),
            ));
        }
        if body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| HubError::new(HubErrorCode::InvalidInput, "body is not valid JSON"))?;
        let errors = validate_json_object(&value, JsonGuardLimits::new(MAX_JSON_DEPTH, MAX_SMALL_BODY_BYTES));
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(HubError::new(HubErrorCode::InvalidInput, errors.join("; ")))
        }
    }
}
