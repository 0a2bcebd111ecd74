// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer-token verification, scope extraction, and path authorization.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use hub_core::principal::Address;
use hub_core::token::{validate_scopes, AssociationToken, OuterToken, Scope, ScopeEntry};
use hub_error::{HubError, HubErrorCode};

/// Options controlling verification beyond signature checking.
pub struct VerifyOptions<'a> {
    /// Acceptable serialized `gaiaChallenge` values.
    pub challenges: &'a [String],
    /// Whether `hubUrl`/`gaiaHubUrl` must be present and valid.
    pub require_correct_hub_url: bool,
    /// Hub URLs a token's `hubUrl` claim may assert (already includes
    /// `https://<serverName>`).
    pub valid_hub_urls: &'a [String],
    /// Current revocation floor for the bucket, 0 if none is active.
    pub oldest_valid_token_timestamp: i64,
    /// Current unix time, for `exp` checks.
    pub now: i64,
}

/// The principal whose scopes govern this request, plus the bucket address
/// the URL path named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSigner {
    /// The bucket address named in the URL.
    pub bucket_address: Address,
    /// The association issuer's address, if an association token was used.
    pub association_issuer: Option<Address>,
}

impl EffectiveSigner {
    /// The address whose whitelist/blacklist state and scopes govern this
    /// request: the association issuer if present, else the bucket address.
    pub fn address(&self) -> &Address {
        self.association_issuer.as_ref().unwrap_or(&self.bucket_address)
    }
}

/// The six partitioned scope sets a verified token grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSets {
    /// Exact paths writable.
    pub write_paths: Vec<String>,
    /// Prefixes writable.
    pub write_prefixes: Vec<String>,
    /// Exact paths deletable.
    pub delete_paths: Vec<String>,
    /// Prefixes deletable.
    pub delete_prefixes: Vec<String>,
    /// Exact paths writable with archival (history-preserving) semantics.
    pub write_archival_paths: Vec<String>,
    /// Prefixes writable with archival semantics.
    pub write_archival_prefixes: Vec<String>,
}

impl ScopeSets {
    /// Partition a token's scope entries into the six sets.
    pub fn from_entries(entries: &[ScopeEntry]) -> Self {
        let mut sets = Self::default();
        for entry in entries {
            let domain = entry.domain.clone();
            match entry.scope {
                Scope::PutFile => sets.write_paths.push(domain),
                Scope::PutFilePrefix => sets.write_prefixes.push(domain),
                Scope::DeleteFile => sets.delete_paths.push(domain),
                Scope::DeleteFilePrefix => sets.delete_prefixes.push(domain),
                Scope::PutFileArchival => sets.write_archival_paths.push(domain),
                Scope::PutFileArchivalPrefix => sets.write_archival_prefixes.push(domain),
            }
        }
        sets
    }

    /// Whether any archival scope is set, which restricts writes to
    /// archival-matching paths only (§4.2 step 2).
    pub fn is_archival_restricted(&self) -> bool {
        !self.write_archival_paths.is_empty() || !self.write_archival_prefixes.is_empty()
    }

    fn matches_archival(&self, path: &str) -> bool {
        self.write_archival_paths.iter().any(|p| p == path)
            || self
                .write_archival_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()))
    }

    fn matches_write(&self, path: &str) -> bool {
        self.write_paths.iter().any(|p| p == path)
            || self.write_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn matches_delete(&self, path: &str) -> bool {
        self.delete_paths.iter().any(|p| p == path)
            || self.delete_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Authorize a write to `path`, per §4.2 steps 1–3.
    ///
    /// An empty (non-archival-restricted) write scope set means "any path
    /// within the bucket is allowed".
    pub fn authorize_write(&self, path: &str) -> Result<(), HubError> {
        if path.contains("..") {
            return Err(HubError::bad_path("path contains '..'"));
        }
        if self.is_archival_restricted() {
            if !self.matches_archival(path) {
                return Err(HubError::validation(
                    "path is not covered by any archival write scope",
                ));
            }
            return Ok(());
        }
        let has_write_scopes = !self.write_paths.is_empty() || !self.write_prefixes.is_empty();
        if has_write_scopes && !self.matches_write(path) {
            return Err(HubError::validation(
                "path is not covered by any write scope",
            ));
        }
        Ok(())
    }

    /// Authorize a delete of `path`, per §4.2 steps 1 and 4.
    pub fn authorize_delete(&self, path: &str) -> Result<(), HubError> {
        if path.contains("..") {
            return Err(HubError::bad_path("path contains '..'"));
        }
        let has_delete_scopes = !self.delete_paths.is_empty() || !self.delete_prefixes.is_empty();
        if has_delete_scopes && !self.matches_delete(path) {
            return Err(HubError::validation(
                "path is not covered by any delete scope",
            ));
        }
        Ok(())
    }
}

/// Build the canonical `gaiaChallenge` JSON array for `server_name`.
pub fn canonical_challenge(server_name: &str) -> String {
    serde_json::json!(["gaiahub", "0", server_name, "blockstack_storage_please_sign"]).to_string()
}

/// Verify a bearer token against the URL's bucket address, returning the
/// effective signer and parsed outer payload on success.
pub fn verify(
    raw_authorization_header: &str,
    bucket_address: &Address,
    opts: &VerifyOptions<'_>,
) -> Result<(EffectiveSigner, OuterToken), HubError> {
    let version_stripped = hub_crypto::strip_bearer_prefix(raw_authorization_header)
        .map_err(|_| HubError::validation("missing or malformed Authorization header"))?;
    let raw = hub_crypto::parse_token(version_stripped)
        .map_err(|_| HubError::validation("malformed token structure"))?;
    let payload: OuterToken = raw
        .payload()
        .map_err(|_| HubError::validation("malformed token payload"))?;

    let issuer_pubkey = hub_crypto::pubkey_bytes_from_hex(&payload.iss)
        .map_err(|_| HubError::validation("invalid issuer public key"))?;
    let issuer_address = Address::from_public_key_bytes(&issuer_pubkey);
    if &issuer_address != bucket_address {
        return Err(HubError::validation("not allowed to write on this path"));
    }

    if opts.require_correct_hub_url {
        let hub_url = payload
            .hub_url
            .as_deref()
            .ok_or_else(|| HubError::validation("token is missing hubUrl"))?;
        let normalized = hub_url.trim_end_matches('/');
        if !opts
            .valid_hub_urls
            .iter()
            .any(|u| u.trim_end_matches('/') == normalized)
        {
            return Err(HubError::validation("token hubUrl is not recognized"));
        }
    }

    if let Some(ref scopes) = payload.scopes {
        validate_scopes(scopes).map_err(|e| HubError::validation(e.to_string()))?;
    }

    let sig_bytes = raw
        .signature_bytes()
        .map_err(|_| HubError::validation("invalid token signature encoding"))?;
    hub_crypto::verify_es256k(raw.signing_input, &sig_bytes, &payload.iss)
        .map_err(|_| HubError::validation("token signature verification failed"))?;

    if !opts.challenges.contains(&payload.gaia_challenge) {
        return Err(HubError::validation("token challenge is not recognized"));
    }

    if let Some(exp) = payload.exp {
        if exp < opts.now {
            return Err(HubError::validation("token has expired"));
        }
    }

    check_revocation_floor(payload.iat, opts.oldest_valid_token_timestamp)?;

    let association_issuer = match &payload.association_token {
        Some(assoc_jws) => Some(verify_association(
            assoc_jws,
            bucket_address,
            opts.oldest_valid_token_timestamp,
            opts.now,
        )?),
        None => None,
    };

    let effective = EffectiveSigner {
        bucket_address: bucket_address.clone(),
        association_issuer,
    };
    Ok((effective, payload))
}

fn verify_association(
    assoc_jws: &str,
    bucket_address: &Address,
    oldest_valid_token_timestamp: i64,
    now: i64,
) -> Result<Address, HubError> {
    let raw = hub_crypto::parse_token(assoc_jws)
        .map_err(|_| HubError::validation("malformed association token"))?;
    let assoc: AssociationToken = raw
        .payload()
        .map_err(|_| HubError::validation("malformed association token payload"))?;

    let sig_bytes = raw
        .signature_bytes()
        .map_err(|_| HubError::validation("invalid association signature encoding"))?;
    hub_crypto::verify_es256k(raw.signing_input, &sig_bytes, &assoc.iss)
        .map_err(|_| HubError::validation("association signature verification failed"))?;

    if assoc.exp < now {
        return Err(HubError::validation("association token has expired"));
    }

    let child_pubkey = hub_crypto::pubkey_bytes_from_hex(&assoc.child_to_associate)
        .map_err(|_| HubError::validation("invalid childToAssociate key"))?;
    let child_address = Address::from_public_key_bytes(&child_pubkey);
    if &child_address != bucket_address {
        return Err(HubError::validation(
            "association childToAssociate does not match bucket address",
        ));
    }

    check_revocation_floor(Some(assoc.iat), oldest_valid_token_timestamp)?;

    let issuer_pubkey = hub_crypto::pubkey_bytes_from_hex(&assoc.iss)
        .map_err(|_| HubError::validation("invalid association issuer key"))?;
    Ok(Address::from_public_key_bytes(&issuer_pubkey))
}

fn check_revocation_floor(iat: Option<i64>, floor: i64) -> Result<(), HubError> {
    if floor > 0 {
        if let Some(iat) = iat {
            if iat < floor {
                return Err(HubError::new(
                    HubErrorCode::AuthTokenTimestamp,
                    "token was issued before the revocation floor",
                )
                .with_context("oldestValidTokenTimestamp", floor));
            }
        }
    }
    Ok(())
}

/// Reject the effective signer if a non-empty whitelist excludes it.
pub fn check_whitelist(effective_signer: &Address, whitelist: &[Address]) -> Result<(), HubError> {
    if whitelist.is_empty() || whitelist.contains(effective_signer) {
        Ok(())
    } else {
        Err(HubError::validation(
            "address is not on the configured whitelist",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::token::ScopeEntry;

    fn entry(scope: Scope, domain: &str) -> ScopeEntry {
        ScopeEntry {
            scope,
            domain: domain.to_string(),
        }
    }

    #[test]
    fn empty_scope_sets_allow_any_path() {
        let sets = ScopeSets::default();
        assert!(sets.authorize_write("anything/goes").is_ok());
        assert!(sets.authorize_delete("anything/goes").is_ok());
    }

    #[test]
    fn write_scope_restricts_to_matching_path() {
        let sets = ScopeSets::from_entries(&[entry(Scope::PutFile, "a/b.txt")]);
        assert!(sets.authorize_write("a/b.txt").is_ok());
        assert!(sets.authorize_write("a/c.txt").is_err());
    }

    #[test]
    fn write_prefix_scope_matches_startswith() {
        let sets = ScopeSets::from_entries(&[entry(Scope::PutFilePrefix, "a/")]);
        assert!(sets.authorize_write("a/b.txt").is_ok());
        assert!(sets.authorize_write("b/c.txt").is_err());
    }

    #[test]
    fn archival_restriction_overrides_plain_write_scopes() {
        let sets = ScopeSets::from_entries(&[
            entry(Scope::PutFile, "a/b.txt"),
            entry(Scope::PutFileArchival, "hist/only.txt"),
        ]);
        // even though a/b.txt has a plain write scope, archival restriction wins
        assert!(sets.authorize_write("a/b.txt").is_err());
        assert!(sets.authorize_write("hist/only.txt").is_ok());
    }

    #[test]
    fn dotdot_is_always_rejected() {
        let sets = ScopeSets::default();
        let err = sets.authorize_write("a/../b").unwrap_err();
        assert_eq!(err.code, HubErrorCode::BadPath);
    }

    #[test]
    fn delete_scope_restricts_to_matching_path() {
        let sets = ScopeSets::from_entries(&[entry(Scope::DeleteFile, "x.txt")]);
        assert!(sets.authorize_delete("x.txt").is_ok());
        assert!(sets.authorize_delete("y.txt").is_err());
    }

    #[test]
    fn revocation_floor_blocks_stale_iat() {
        let err = check_revocation_floor(Some(50), 100).unwrap_err();
        assert_eq!(err.code, HubErrorCode::AuthTokenTimestamp);
        assert_eq!(
            err.context.get("oldestValidTokenTimestamp"),
            Some(&serde_json::json!(100))
        );
    }

    #[test]
    fn revocation_floor_allows_equal_iat() {
        assert!(check_revocation_floor(Some(100), 100).is_ok());
    }

    #[test]
    fn revocation_floor_disabled_when_zero() {
        assert!(check_revocation_floor(None, 0).is_ok());
    }

    #[test]
    fn whitelist_empty_allows_everyone() {
        let addr = Address::from_public_key_bytes(b"someone");
        assert!(check_whitelist(&addr, &[]).is_ok());
    }

    #[test]
    fn whitelist_rejects_non_member() {
        let addr = Address::from_public_key_bytes(b"someone");
        let other = Address::from_public_key_bytes(b"someone-else");
        assert!(check_whitelist(&addr, &[other]).is_err());
    }

    #[test]
    fn canonical_challenge_matches_expected_shape() {
        let challenge = canonical_challenge("my-hub");
        let parsed: Vec<String> = serde_json::from_str(&challenge).unwrap();
        assert_eq!(
            parsed,
            vec!["gaiahub", "0", "my-hub", "blockstack_storage_please_sign"]
        );
    }
}
