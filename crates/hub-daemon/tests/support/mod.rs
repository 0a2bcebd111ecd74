// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared scaffolding for hub-daemon's HTTP-level tests: a signing
//! keypair, outer-token construction, and a ready-to-serve [`AppState`].

use base64::Engine;
use hub_config::HubConfig;
use hub_core::token::{OuterToken, ScopeEntry};
use hub_daemon::{build_state, AppState};
use hub_driver::Driver;
use hub_driver_mock::MockDriver;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use std::sync::Arc;

pub struct TestSigner {
    pub signing_key: SigningKey,
    pub pubkey_hex: String,
}

impl TestSigner {
    pub fn new() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        let pubkey_hex = hex_encode(verifying_key.to_sec1_bytes().as_ref());
        Self { signing_key, pubkey_hex }
    }

    pub fn address(&self) -> hub_core::principal::Address {
        let pubkey = hub_crypto::pubkey_bytes_from_hex(&self.pubkey_hex).unwrap();
        hub_core::principal::Address::from_public_key_bytes(&pubkey)
    }

    /// Mint a `v1:<jws>` bearer token for the given outer payload.
    pub fn bearer_token(&self, payload: &OuterToken) -> String {
        let header = serde_json::json!({"alg": "ES256K", "typ": "JWT"});
        let header_b64 = b64(&serde_json::to_vec(&header).unwrap());
        let payload_b64 = b64(&serde_json::to_vec(payload).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let sig: Signature = self.signing_key.sign(signing_input.as_bytes());
        let sig_b64 = b64(&sig.to_bytes());
        format!("bearer v1:{signing_input}.{sig_b64}")
    }
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// An outer token payload with the server's challenge, no scopes (full
/// access to the bucket), and no expiry.
pub fn unscoped_payload(signer: &TestSigner, server_name: &str) -> OuterToken {
    OuterToken {
        iss: signer.pubkey_hex.clone(),
        gaia_challenge: hub_auth::canonical_challenge(server_name),
        hub_url: None,
        scopes: None,
        association_token: None,
        exp: None,
        iat: None,
        salt: "test-salt".into(),
    }
}

pub fn scoped_payload(signer: &TestSigner, server_name: &str, scopes: Vec<ScopeEntry>) -> OuterToken {
    OuterToken {
        scopes: Some(scopes),
        ..unscoped_payload(signer, server_name)
    }
}

/// Build a ready-to-serve [`AppState`] backed by a fresh, empty [`MockDriver`].
pub async fn test_state(config: HubConfig) -> Arc<AppState> {
    let driver = Arc::new(MockDriver::new(config.read_url.clone()));
    driver.ensure_initialized().await.unwrap();
    Arc::new(build_state(config, driver))
}

pub fn test_config() -> HubConfig {
    HubConfig {
        server_name: "test-hub".into(),
        read_url: "https://read.example.test".into(),
        ..Default::default()
    }
}
