// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state for the storage hub's HTTP API.

use hub_auth::canonical_challenge;
use hub_cache::{BlacklistCache, RevocationCache};
use hub_config::HubConfig;
use hub_core::principal::Address;
use hub_driver_mock::MockDriver;
use hub_mutex::EndpointMutexScope;
use std::sync::Arc;

/// Everything a handler needs to serve a request, built once at startup.
pub struct AppState {
    /// The resolved runtime configuration.
    pub config: HubConfig,
    /// The storage backend.
    pub driver: Arc<MockDriver>,
    /// Per-bucket revocation-timestamp cache.
    pub revocation_cache: RevocationCache<MockDriver>,
    /// Per-bucket blacklist cache.
    pub blacklist_cache: BlacklistCache<MockDriver>,
    /// Per-endpoint critical-section mutex.
    pub mutex_scope: EndpointMutexScope,
    /// Challenge strings accepted on inbound auth tokens.
    pub challenges: Vec<String>,
    /// Hub URLs a token's `hubUrl` claim is allowed to assert.
    pub valid_hub_urls: Vec<String>,
    /// Bucket addresses exempt from blacklist checks.
    pub whitelist: Vec<Address>,
}

/// Build the shared [`AppState`] from a loaded configuration and driver.
pub fn build_state(config: HubConfig, driver: Arc<MockDriver>) -> AppState {
    let challenge = canonical_challenge(&config.server_name);

    let mut valid_hub_urls = config.valid_hub_urls.clone();
    let self_url = format!("https://{}", config.server_name);
    if !valid_hub_urls.contains(&self_url) {
        valid_hub_urls.push(self_url);
    }

    let whitelist = config
        .whitelist
        .iter()
        .filter_map(|raw| Address::parse(raw).ok())
        .collect();

    let revocation_cache = RevocationCache::new(config.auth_timestamp_cache_size, driver.clone());
    let blacklist_cache = BlacklistCache::new(config.blacklist_cache_size, driver.clone());

    AppState {
        config,
        driver,
        revocation_cache,
        blacklist_cache,
        mutex_scope: EndpointMutexScope::new(),
        challenges: vec![challenge],
        valid_hub_urls,
        whitelist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HubConfig {
        HubConfig {
            server_name: "hub.example.com".into(),
            read_url: "https://read.example.com".into(),
            whitelist: vec!["not-a-valid-address".into()],
            ..Default::default()
        }
    }

    #[test]
    fn build_state_appends_self_url() {
        let driver = Arc::new(MockDriver::default());
        let state = build_state(test_config(), driver);
        assert!(state.valid_hub_urls.contains(&"https://hub.example.com".to_string()));
    }

    #[test]
    fn build_state_skips_unparseable_whitelist_entries() {
        let driver = Arc::new(MockDriver::default());
        let state = build_state(test_config(), driver);
        assert!(state.whitelist.is_empty());
    }

    #[test]
    fn build_state_derives_challenge_from_server_name() {
        let driver = Arc::new(MockDriver::default());
        let state = build_state(test_config(), driver);
        assert_eq!(state.challenges.len(), 1);
    }
}
