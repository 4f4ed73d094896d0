//! Read-only recent-transaction listing.
//!
//! A cache-or-fetch wrapper around the gateway for callers that just want
//! to show the contract's recent transactions. Results are served from an
//! in-memory TTL cache; the core ingestion pipeline never reads through
//! this path.

use super::error::IngestError;
use super::fetcher::TransactionGateway;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

struct CacheEntry {
    records: Vec<Value>,
    expires_at: Instant,
}

/// Cached listing of the watched contract's most recent transactions,
/// returned as raw gateway records.
pub struct TransactionListing {
    gateway: Arc<dyn TransactionGateway>,
    contract_address: String,
    size: u32,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl TransactionListing {
    pub fn new(gateway: Arc<dyn TransactionGateway>, contract_address: &str, size: u32) -> Self {
        Self::with_ttl(gateway, contract_address, size, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(
        gateway: Arc<dyn TransactionGateway>,
        contract_address: &str,
        size: u32,
        ttl: Duration,
    ) -> Self {
        Self {
            gateway,
            contract_address: contract_address.to_owned(),
            size,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Recent transactions, cached for the configured TTL.
    ///
    /// Concurrent callers may refresh simultaneously after expiry; the
    /// last writer wins, which is harmless for a read-only listing.
    pub async fn recent_transactions(&self) -> Result<Vec<Value>, IngestError> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.as_ref() {
                if entry.expires_at > Instant::now() {
                    log::debug!("Transaction listing served from cache");
                    return Ok(entry.records.clone());
                }
            }
        }

        let records = self
            .gateway
            .latest_transactions(&self.contract_address, self.size)
            .await?;

        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CacheEntry {
            records: records.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(records)
    }
}
