//! Token payloads (outer and association) and scope entries.

use crate::principal::Address;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The six scopes a token entry may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// Write a single exact path.
    PutFile,
    /// Write anything under a path prefix.
    PutFilePrefix,
    /// Delete a single exact path.
    DeleteFile,
    /// Delete anything under a path prefix.
    DeleteFilePrefix,
    /// Archival (history-preserving) write of a single exact path.
    PutFileArchival,
    /// Archival write of anything under a path prefix.
    PutFileArchivalPrefix,
}

impl Scope {
    /// True for the two `*Prefix` variants.
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            Scope::PutFilePrefix | Scope::DeleteFilePrefix | Scope::PutFileArchivalPrefix
        )
    }

    /// True for the two archival variants.
    pub fn is_archival(&self) -> bool {
        matches!(self, Scope::PutFileArchival | Scope::PutFileArchivalPrefix)
    }
}

/// One entry in a token's `scopes` array: `{scope, domain}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScopeEntry {
    /// Which operation this entry authorizes.
    pub scope: Scope,
    /// The exact path or path prefix the entry applies to.
    pub domain: String,
}

/// Maximum number of scope entries permitted on a single token.
pub const MAX_SCOPE_ENTRIES: usize = 8;

/// The outer token payload presented as the bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OuterToken {
    /// Hex-encoded public key of the signer.
    pub iss: String,
    /// Anti-replay challenge string issued by the hub.
    pub gaia_challenge: String,
    /// Hub URL the token was minted for, if the issuer asserted one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "gaiaHubUrl"
    )]
    pub hub_url: Option<String>,
    /// Scope entries, at most [`MAX_SCOPE_ENTRIES`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<ScopeEntry>>,
    /// An embedded association token delegating from a child key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_token: Option<String>,
    /// Expiry, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued-at, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Random per-token salt.
    pub salt: String,
}

/// The association token payload, when `associationToken` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssociationToken {
    /// Hex-encoded public key of the association issuer.
    pub iss: String,
    /// Hex-encoded public key of the child key being associated.
    pub child_to_associate: String,
    /// Expiry, unix seconds. Mandatory for association tokens.
    pub exp: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Random per-token salt.
    pub salt: String,
}

impl AssociationToken {
    /// The address derived from [`Self::child_to_associate`]'s raw key bytes.
    pub fn child_address(&self, child_pubkey_bytes: &[u8]) -> Address {
        Address::from_public_key_bytes(child_pubkey_bytes)
    }
}

/// Failure validating a `scopes` array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeValidationError {
    /// More than [`MAX_SCOPE_ENTRIES`] entries were present.
    #[error("token carries {0} scope entries, max is {MAX_SCOPE_ENTRIES}")]
    TooManyEntries(usize),
}

/// Validate a token's `scopes` array against the entry-count limit.
///
/// Unknown `scope` string values are rejected earlier, at deserialization
/// time, since [`Scope`] has no catch-all variant.
pub fn validate_scopes(scopes: &[ScopeEntry]) -> Result<(), ScopeValidationError> {
    if scopes.len() > MAX_SCOPE_ENTRIES {
        return Err(ScopeValidationError::TooManyEntries(scopes.len()));
    }
    Ok(())
}
