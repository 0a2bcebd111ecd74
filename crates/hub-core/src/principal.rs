//! Principal addresses: 20-byte hash160 of a secp256k1 public key,
//! represented as a base58check string.

use ripemd::Ripemd160;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Mainnet single-sig version byte used for bucket and association addresses.
const ADDRESS_VERSION: u8 = 0x00;

/// A principal address: base58check(version || hash160(pubkey)).
///
/// Two principals may appear on a request — the bucket address (URL path
/// segment) and the association issuer address (signer of an outer
/// `associationToken`) — both represented by this same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Derive an address from a compressed secp256k1 public key's raw bytes.
    pub fn from_public_key_bytes(pubkey: &[u8]) -> Self {
        Self::from_hash160(hash160(pubkey))
    }

    /// Wrap an already-computed hash160 digest into a base58check address.
    pub fn from_hash160(digest: [u8; 20]) -> Self {
        let mut payload = Vec::with_capacity(21);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&digest);
        Self(bs58::encode(payload).with_check().into_string())
    }

    /// Parse a base58check-encoded address string, validating its checksum
    /// and version byte.
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let decoded = bs58::decode(s)
            .with_check(Some(ADDRESS_VERSION))
            .into_vec()
            .map_err(|_| AddressParseError::InvalidEncoding)?;
        if decoded.len() != 21 {
            return Err(AddressParseError::InvalidEncoding);
        }
        Ok(Self(s.to_string()))
    }

    /// Borrow the address as its base58check string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure parsing a base58check address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The string was not a valid base58check encoding of a version-0 hash160.
    #[error("invalid base58check address")]
    InvalidEncoding,
}

/// SHA-256 then RIPEMD-160 of `data` — the "hash160" construction.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let rmd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&rmd);
    out
}
