//! dapp configuration

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::submit::TRANSFER_GAS;

pub const DEFAULT_GIF_ENDPOINT: &str = "https://api.giphy.com/v1/gifs/search";
pub const DEFAULT_GIF_FALLBACK: &str =
    "https://metro.co.uk/wp-content/uploads/2015/05/pokemon_crying.gif?quality=90&strip=all&zoom=1&resize=500%2C284";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DappConfig {
    /// json-rpc endpoint of the wallet node; unset means no wallet
    pub wallet_rpc: Option<String>,
    /// deployed ledger contract
    pub contract_address: Address,
    /// gas allowance for the value transfer
    pub gas_limit: u64,
    /// receipt polling interval while a ledger write is pending
    pub poll_interval_ms: u64,
    /// sled database holding the cached transaction count
    pub cache_path: String,
    pub gif: GifConfig,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            wallet_rpc: None,
            contract_address: Address::ZERO,
            gas_limit: TRANSFER_GAS,
            poll_interval_ms: 4_000,
            cache_path: "./transfer-ledger.db".into(),
            gif: GifConfig::default(),
        }
    }
}

impl DappConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GifConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// shown whenever the lookup fails
    pub fallback_url: String,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_GIF_ENDPOINT.into(),
            fallback_url: DEFAULT_GIF_FALLBACK.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DappConfig::default();
        assert_eq!(config.gas_limit, 21_000);
        assert_eq!(config.poll_interval(), Duration::from_secs(4));
        assert!(config.wallet_rpc.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = DappConfig::from_toml(
            r#"
            wallet_rpc = "http://127.0.0.1:8545"
            contract_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
            poll_interval_ms = 250

            [gif]
            api_key = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.wallet_rpc.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.gas_limit, 21_000);
        assert_eq!(config.gif.api_key.as_deref(), Some("abc"));
        assert_eq!(config.gif.fallback_url, DEFAULT_GIF_FALLBACK);
        assert_ne!(config.contract_address, Address::ZERO);
    }
}
