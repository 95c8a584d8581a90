mod loader;

use std::{path::PathBuf, time::Duration};

pub use loader::{get_default_config, load_configuration, load_wallet_config, write_config_to};
use serde::{Deserialize, Serialize};

use crate::http::HttpClientConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
    pub symbol: String,
    pub decimals: u8,
    /// Currency tag the node attaches to balances of the native asset.
    pub fee_string: String,
    /// Hex-encoded 32-byte chain id.
    pub chain_id: String,
    pub curve_type: String,
    pub base_url: String,
    pub database_path: PathBuf,
    pub scan_interval_secs: u64,
    pub max_extracting_size: usize,
    pub max_concurrent_requests: usize,
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub expiration_minutes: i64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            symbol: "PIA".to_string(),
            decimals: 8,
            fee_string: "PIA".to_string(),
            chain_id: "00".repeat(32),
            curve_type: "secp256k1".to_string(),
            base_url: "http://127.0.0.1:8090".to_string(),
            database_path: PathBuf::from("data/pia-wallet.sqlite"),
            scan_interval_secs: 10,
            max_extracting_size: 10,
            max_concurrent_requests: 1,
            request_delay_ms: 0,
            max_retries: 3,
            request_timeout_secs: 30,
            expiration_minutes: 30,
        }
    }
}

impl WalletConfig {
    pub fn apply_overrides(&mut self, base_url: Option<&str>, database_path: Option<&PathBuf>) {
        if let Some(base_url) = base_url {
            self.base_url = base_url.to_string();
        }
        if let Some(database_path) = database_path {
            self.database_path = database_path.clone();
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_concurrent_requests: self.max_concurrent_requests,
            request_delay: Duration::from_millis(self.request_delay_ms),
        }
    }
}
