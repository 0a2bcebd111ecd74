// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the storage hub.
//!
//! This crate provides [`HubConfig`] — the top-level runtime settings —
//! together with helpers for loading from TOML files, overlaying the
//! `PORT` environment variable, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A size-like field is set to a suspiciously small or zero value.
    SuspiciousSize {
        /// Name of the field.
        field: String,
        /// The value that triggered the warning.
        value: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::SuspiciousSize { field, value } => {
                write!(f, "field '{field}' has a suspiciously small value ({value})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the storage hub.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct HubConfig {
    /// Name the hub reports in `hub_info` and log lines.
    pub server_name: String,

    /// Logical bucket name the driver stores objects under.
    pub bucket: String,

    /// Default page size for `list-files` when the caller omits `pageSize`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// `Cache-Control` header value applied to written objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,

    /// Public URL prefix objects are readable at (no read endpoint is
    /// served by the hub itself).
    pub read_url: String,

    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_file_upload_size")]
    pub max_file_upload_size: u64,

    /// Max entries in the revocation-timestamp cache.
    #[serde(default = "default_auth_timestamp_cache_size")]
    pub auth_timestamp_cache_size: u64,

    /// Max entries in the blacklist cache.
    #[serde(default = "default_blacklist_cache_size")]
    pub blacklist_cache_size: u64,

    /// Bucket addresses exempt from blacklist checks.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Hub URLs a token's `hubUrl` claim is allowed to assert.
    #[serde(default)]
    pub valid_hub_urls: Vec<String>,

    /// Whether a token's `hubUrl` claim must match one of `valid_hub_urls`.
    #[serde(default)]
    pub require_correct_hub_url: bool,

    /// Whether association-issuer addresses are checked against the
    /// blacklist, not just the bucket address (Design Note ambiguity,
    /// resolved in favor of opt-in).
    #[serde(default)]
    pub check_association_blacklist: bool,

    /// Which storage driver to instantiate.
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_page_size() -> u32 {
    100
}

fn default_max_file_upload_size() -> u64 {
    20 * 1024 * 1024
}

fn default_auth_timestamp_cache_size() -> u64 {
    50_000
}

fn default_blacklist_cache_size() -> u64 {
    50_000
}

fn default_driver() -> String {
    "mock".into()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server_name: "storage-hub".into(),
            bucket: "hub".into(),
            page_size: default_page_size(),
            cache_control: None,
            read_url: String::new(),
            max_file_upload_size: default_max_file_upload_size(),
            auth_timestamp_cache_size: default_auth_timestamp_cache_size(),
            blacklist_cache_size: default_blacklist_cache_size(),
            whitelist: Vec::new(),
            valid_hub_urls: Vec::new(),
            require_correct_hub_url: false,
            check_association_blacklist: false,
            driver: default_driver(),
        }
    }
}

/// The `PORT` environment variable's default value, per the hub's external
/// interface spec.
pub const DEFAULT_PORT: u16 = 8088;

/// Resolve the bind port: `PORT` env var if set and parseable, else
/// [`DEFAULT_PORT`].
pub fn resolve_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`HubConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`HubConfig::default()`].
pub fn load_config(path: Option<&Path>) -> Result<HubConfig, ConfigError> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)
        }
        None => Ok(HubConfig::default()),
    }
}

/// Parse a TOML string into a [`HubConfig`].
pub fn parse_toml(content: &str) -> Result<HubConfig, ConfigError> {
    toml::from_str::<HubConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty `readURL`, zero-sized caches) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &HubConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.read_url.trim().is_empty() {
        errors.push("readURL must not be empty".into());
    }
    if config.max_file_upload_size == 0 {
        errors.push("maxFileUploadSize must be greater than zero".into());
    }
    if config.auth_timestamp_cache_size == 0 {
        errors.push("authTimestampCacheSize must be greater than zero".into());
    }
    if config.blacklist_cache_size == 0 {
        errors.push("blacklistCacheSize must be greater than zero".into());
    }
    if config.require_correct_hub_url && config.valid_hub_urls.is_empty() {
        errors.push("requireCorrectHubUrl is set but validHubUrls is empty".into());
    }

    if config.max_file_upload_size > 0 && config.max_file_upload_size < 1024 {
        warnings.push(ConfigWarning::SuspiciousSize {
            field: "maxFileUploadSize".into(),
            value: config.max_file_upload_size,
        });
    }
    if config.cache_control.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "cacheControl".into(),
            hint: "objects will be written without a Cache-Control header".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
