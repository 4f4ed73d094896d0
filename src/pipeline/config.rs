//! Ingestion configuration from environment variables.

use super::error::IngestError;
use std::env;

pub const DEFAULT_GATEWAY_API_URL: &str = "https://api.multiversx.com";
pub const DEFAULT_TX_FETCH_SIZE: u32 = 25;
pub const DEFAULT_TX_POLL_INTERVAL_MS: i64 = 30_000;
pub const DEFAULT_CHALLENGE_DB_PATH: &str = "challenges.db";

/// Configuration for the ingestion runtime.
///
/// Loaded from environment variables with sensible defaults. The contract
/// address is the one required setting: the process must not start
/// without it.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Address of the watched challenge contract.
    pub contract_address: String,

    /// Gateway base URL, trailing slashes stripped.
    pub gateway_api_url: String,

    /// Number of most-recent transactions requested per cycle.
    pub tx_fetch_size: u32,

    /// Polling interval in milliseconds. Zero or negative disables the
    /// repeating timer: one cycle runs at startup, then the scheduler
    /// stops.
    pub poll_interval_ms: i64,

    /// Path to the SQLite database file.
    pub db_path: String,
}

impl IngestConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHALLENGE_CONTRACT_ADDRESS` (required)
    /// - `GATEWAY_API_URL` (default: https://api.multiversx.com)
    /// - `TX_FETCH_SIZE` (default: 25)
    /// - `TX_POLL_INTERVAL_MS` (default: 30000; <= 0 disables polling)
    /// - `CHALLENGE_DB_PATH` (default: challenges.db)
    pub fn from_env() -> Result<Self, IngestError> {
        let contract_address = env::var("CHALLENGE_CONTRACT_ADDRESS")
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                IngestError::Config("CHALLENGE_CONTRACT_ADDRESS must be set".to_owned())
            })?;

        let gateway_api_url = env::var("GATEWAY_API_URL")
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            contract_address,
            gateway_api_url,
            tx_fetch_size: env::var("TX_FETCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TX_FETCH_SIZE),
            poll_interval_ms: env::var("TX_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TX_POLL_INTERVAL_MS),
            db_path: env::var("CHALLENGE_DB_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CHALLENGE_DB_PATH.to_owned()),
        })
    }
}
