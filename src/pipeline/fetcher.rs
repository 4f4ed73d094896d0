//! Transaction fetching from the ledger gateway.
//!
//! The gateway returns the most recent transactions of the watched
//! address newest-first. The Fetcher normalizes every record, keeps only
//! those addressed to the watched contract, and hands the Projector an
//! ascending-by-time batch, because effects must apply in chronological
//! order.
//!
//! The HTTP edge sits behind the [`TransactionGateway`] trait so tests
//! can inject canned batches without a network.

use super::error::IngestError;
use super::normalizer::normalize_transaction;
use super::types::NormalizedTransaction;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only access to an account's recent transactions.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// The `size` most recent transactions of `address`, newest first,
    /// as raw gateway records.
    async fn latest_transactions(
        &self,
        address: &str,
        size: u32,
    ) -> Result<Vec<Value>, IngestError>;
}

/// Production gateway client over HTTP.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// `base_url` is expected with trailing slashes already stripped
    /// (the config loader does this).
    pub fn new(base_url: &str) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
        })
    }
}

#[async_trait]
impl TransactionGateway for HttpGateway {
    async fn latest_transactions(
        &self,
        address: &str,
        size: u32,
    ) -> Result<Vec<Value>, IngestError> {
        let url = format!(
            "{}/accounts/{}/transactions?size={}&order=desc&withScResults=true",
            self.base_url, address, size
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Vec<Value>>().await?)
    }
}

/// Fetches, filters, and orders one batch per ingestion cycle.
pub struct Fetcher {
    gateway: Arc<dyn TransactionGateway>,
    contract_address: String,
    batch_size: u32,
}

impl Fetcher {
    pub fn new(gateway: Arc<dyn TransactionGateway>, contract_address: &str, batch_size: u32) -> Self {
        Self {
            gateway,
            contract_address: contract_address.to_owned(),
            batch_size,
        }
    }

    /// One cycle's worth of contract transactions, ascending by
    /// timestamp (absent timestamps order as 0; the sort is stable, so
    /// ties keep the gateway's relative order).
    ///
    /// Errors are not retried here; the next scheduled cycle retries
    /// naturally.
    pub async fn fetch_batch(&self) -> Result<Vec<NormalizedTransaction>, IngestError> {
        let records = self
            .gateway
            .latest_transactions(&self.contract_address, self.batch_size)
            .await?;
        let fetched = records.len();

        let mut batch: Vec<NormalizedTransaction> = records
            .iter()
            .filter_map(normalize_transaction)
            .filter(|tx| {
                tx.receiver
                    .as_deref()
                    .is_some_and(|receiver| receiver.eq_ignore_ascii_case(&self.contract_address))
            })
            .collect();

        batch.sort_by_key(NormalizedTransaction::timestamp_or_zero);

        log::debug!(
            "Fetched {} records, {} for contract {}",
            fetched,
            batch.len(),
            self.contract_address
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MockGateway {
        records: Vec<Value>,
    }

    #[async_trait]
    impl TransactionGateway for MockGateway {
        async fn latest_transactions(
            &self,
            _address: &str,
            _size: u32,
        ) -> Result<Vec<Value>, IngestError> {
            Ok(self.records.clone())
        }
    }

    fn fetcher_over(records: Vec<Value>) -> Fetcher {
        Fetcher::new(
            Arc::new(MockGateway { records }),
            "erd1contract",
            25,
        )
    }

    #[tokio::test]
    async fn test_filters_to_contract_receiver_case_insensitively() {
        let fetcher = fetcher_over(vec![
            json!({ "txHash": "0x1", "receiver": "ERD1CONTRACT", "timestamp": 3 }),
            json!({ "txHash": "0x2", "receiver": "erd1other", "timestamp": 2 }),
            json!({ "txHash": "0x3", "receiver": "erd1contract", "timestamp": 1 }),
        ]);

        let batch = fetcher.fetch_batch().await.unwrap();
        let hashes: Vec<&str> = batch.iter().map(|tx| tx.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x3", "0x1"]);
    }

    #[tokio::test]
    async fn test_sorts_ascending_despite_descending_source() {
        // Gateway answers newest-first; the Projector needs oldest-first
        let fetcher = fetcher_over(vec![
            json!({ "txHash": "0xC", "receiver": "erd1contract", "timestamp": 300 }),
            json!({ "txHash": "0xB", "receiver": "erd1contract", "timestamp": 200 }),
            json!({ "txHash": "0xA", "receiver": "erd1contract", "timestamp": 100 }),
        ]);

        let batch = fetcher.fetch_batch().await.unwrap();
        let hashes: Vec<&str> = batch.iter().map(|tx| tx.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xA", "0xB", "0xC"]);
    }

    #[tokio::test]
    async fn test_reversed_input_order_gives_same_batch() {
        let records = vec![
            json!({ "txHash": "0xA", "receiver": "erd1contract", "timestamp": 100 }),
            json!({ "txHash": "0xB", "receiver": "erd1contract", "timestamp": 200 }),
            json!({ "txHash": "0xC", "receiver": "erd1contract", "timestamp": 300 }),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let batch = fetcher_over(records).fetch_batch().await.unwrap();
        let batch_reversed = fetcher_over(reversed).fetch_batch().await.unwrap();

        let hashes: Vec<String> = batch.iter().map(|tx| tx.tx_hash.clone()).collect();
        let hashes_reversed: Vec<String> =
            batch_reversed.iter().map(|tx| tx.tx_hash.clone()).collect();
        assert_eq!(hashes, hashes_reversed);
    }

    #[tokio::test]
    async fn test_absent_timestamp_orders_first() {
        let fetcher = fetcher_over(vec![
            json!({ "txHash": "0xB", "receiver": "erd1contract", "timestamp": 100 }),
            json!({ "txHash": "0xA", "receiver": "erd1contract" }),
        ]);

        let batch = fetcher.fetch_batch().await.unwrap();
        assert_eq!(batch[0].tx_hash, "0xA");
        assert_eq!(batch[0].timestamp_ms, None);
    }

    #[tokio::test]
    async fn test_records_without_hash_or_receiver_are_dropped() {
        let fetcher = fetcher_over(vec![
            json!({ "receiver": "erd1contract", "timestamp": 100 }),
            json!({ "txHash": "0xA", "timestamp": 100 }),
            json!({ "txHash": "0xB", "receiver": "erd1contract", "timestamp": 100 }),
        ]);

        let batch = fetcher.fetch_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].tx_hash, "0xB");
    }

    struct FailingGateway;

    #[async_trait]
    impl TransactionGateway for FailingGateway {
        async fn latest_transactions(
            &self,
            _address: &str,
            _size: u32,
        ) -> Result<Vec<Value>, IngestError> {
            Err(IngestError::Fetch {
                status: 503,
                body: "gateway unavailable".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_error_carries_status_and_body() {
        let fetcher = Fetcher::new(Arc::new(FailingGateway), "erd1contract", 25);
        match fetcher.fetch_batch().await {
            Err(IngestError::Fetch { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "gateway unavailable");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
