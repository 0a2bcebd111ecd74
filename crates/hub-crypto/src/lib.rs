// SPDX-License-Identifier: MIT OR Apache-2.0
//! ECDSA-secp256k1 verification for storage hub bearer tokens.
//!
//! Bearer tokens are presented as `v1:<jws>` where `<jws>` is a compact JWS
//! (`base64url(header).base64url(payload).base64url(signature)`) signed
//! with algorithm `ES256K`: ECDSA over secp256k1, SHA-256 prehash, raw
//! 64-byte `r || s` signature encoding (not DER).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine;
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::de::DeserializeOwned;
use serde_json::Value;

const BEARER_PREFIX: &str = "bearer ";
const TOKEN_VERSION_PREFIX: &str = "v1:";

/// Failures parsing or verifying a bearer token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The `Authorization` header was missing the `bearer v1:` prefix.
    #[error("authorization header is not a v1 bearer token")]
    NotABearerToken,
    /// The JWS was not three base64url segments joined by `.`.
    #[error("malformed token structure")]
    MalformedToken,
    /// A segment failed base64url decoding.
    #[error("invalid base64 in token segment")]
    InvalidBase64,
    /// The payload or header was not valid JSON for the expected shape.
    #[error("invalid JSON in token segment")]
    InvalidJson,
    /// The signature was not 64 raw bytes.
    #[error("invalid signature encoding")]
    InvalidSignature,
    /// The `iss` hex public key could not be parsed as a secp256k1 key.
    #[error("invalid public key")]
    InvalidPublicKey,
    /// Signature verification failed.
    #[error("signature verification failed")]
    BadSignature,
}

/// The three raw (still-encoded) segments of a parsed token, plus the
/// signing input the signature was computed over.
pub struct RawToken<'a> {
    /// `base64url(header).base64url(payload)` — the bytes that were signed.
    pub signing_input: &'a str,
    header_b64: &'a str,
    payload_b64: &'a str,
    signature_b64: &'a str,
}

/// Strip the `bearer v1:` prefix from an `Authorization` header value.
pub fn strip_bearer_prefix(header_value: &str) -> Result<&str, CryptoError> {
    let rest = header_value
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| {
            header_value
                .to_ascii_lowercase()
                .starts_with(BEARER_PREFIX)
                .then(|| &header_value[BEARER_PREFIX.len()..])
        })
        .ok_or(CryptoError::NotABearerToken)?;
    rest.strip_prefix(TOKEN_VERSION_PREFIX)
        .ok_or(CryptoError::NotABearerToken)
}

/// Split a compact JWS into its three segments.
pub fn parse_token(jws: &str) -> Result<RawToken<'_>, CryptoError> {
    let mut parts = jws.split('.');
    let header_b64 = parts.next().ok_or(CryptoError::MalformedToken)?;
    let payload_b64 = parts.next().ok_or(CryptoError::MalformedToken)?;
    let signature_b64 = parts.next().ok_or(CryptoError::MalformedToken)?;
    if parts.next().is_some() {
        return Err(CryptoError::MalformedToken);
    }
    // signing_input spans header_b64 through payload_b64 inclusive of the dot.
    let signing_input_len = header_b64.len() + 1 + payload_b64.len();
    Ok(RawToken {
        signing_input: &jws[..signing_input_len],
        header_b64,
        payload_b64,
        signature_b64,
    })
}

impl RawToken<'_> {
    /// Decode and deserialize the header segment.
    pub fn header<T: DeserializeOwned>(&self) -> Result<T, CryptoError> {
        decode_json(self.header_b64)
    }

    /// Decode and deserialize the payload segment.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CryptoError> {
        decode_json(self.payload_b64)
    }

    /// Decode the payload as a generic [`serde_json::Value`] (useful when
    /// the exact shape, outer vs. association, isn't known yet).
    pub fn payload_value(&self) -> Result<Value, CryptoError> {
        self.payload()
    }

    /// Decode the raw 64-byte signature.
    pub fn signature_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(self.signature_b64)
            .map_err(|_| CryptoError::InvalidBase64)
    }
}

fn decode_json<T: DeserializeOwned>(segment: &str) -> Result<T, CryptoError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CryptoError::InvalidBase64)?;
    serde_json::from_slice(&bytes).map_err(|_| CryptoError::InvalidJson)
}

/// Verify an ES256K signature over `signing_input`, using the hex-encoded
/// secp256k1 public key `iss`.
pub fn verify_es256k(
    signing_input: &str,
    signature: &[u8],
    iss_hex_pubkey: &str,
) -> Result<(), CryptoError> {
    let pubkey_bytes = hex_decode(iss_hex_pubkey).ok_or(CryptoError::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_sec1_bytes(&pubkey_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &sig)
        .map_err(|_| CryptoError::BadSignature)
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Public key bytes decoded from a hex `iss` claim, for address derivation.
pub fn pubkey_bytes_from_hex(iss_hex_pubkey: &str) -> Result<Vec<u8>, CryptoError> {
    hex_decode(iss_hex_pubkey).ok_or(CryptoError::InvalidPublicKey)
}
