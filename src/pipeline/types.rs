//! Core data structures for the challenge ingestion pipeline.
//!
//! `NormalizedTransaction` is the canonical form every raw gateway record
//! is reduced to before it enters the pipeline. `Challenge` and
//! `Participant` are the two persisted entities; both store reward/score
//! amounts as decimal strings so no precision is lost between the contract
//! and the database.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A gateway transaction record reduced to the fields the pipeline uses.
///
/// Immutable once constructed. `raw` keeps the original record for
/// diagnostics; it plays no part in projection.
#[derive(Debug, Clone)]
pub struct NormalizedTransaction {
    /// Transaction hash. Required; records without one are discarded by
    /// the normalizer.
    pub tx_hash: String,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    /// Base64 call data, still encoded. Decoding happens in the Projector.
    pub data: Option<String>,
    /// Unix milliseconds. Absent when the record carried no usable
    /// timestamp; ordering then falls back to 0.
    pub timestamp_ms: Option<i64>,
    /// Original gateway record, kept for diagnostics only.
    pub raw: Value,
}

impl NormalizedTransaction {
    /// Timestamp used for ordering and the dedup high-water-mark.
    pub fn timestamp_or_zero(&self) -> i64 {
        self.timestamp_ms.unwrap_or(0)
    }

    /// Timestamp in seconds, when one is known.
    pub fn timestamp_secs(&self) -> Option<i64> {
        self.timestamp_ms.map(|ms| ms / 1000)
    }
}

/// A fitness challenge projected from a `createChallenge` call.
///
/// Identity is the hash of the transaction that created it. At most one
/// challenge is active at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Creation transaction hash.
    pub id: String,
    pub creator: Option<String>,
    /// Challenge window, Unix seconds.
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    /// Decimal string, non-negative.
    pub reward_budget: String,
    /// Decimal string, non-negative.
    pub reward_per_point: String,
    pub active: bool,
    pub created_tx_hash: String,
    pub closed_tx_hash: Option<String>,
    /// Hash of the last transaction that mutated this row. Doubles as the
    /// idempotency guard for `closeChallenge` replays.
    pub last_updated_tx_hash: String,
    pub opened_at: Option<i64>,
    pub closed_at: Option<i64>,
}

/// A participant's standing within one challenge.
///
/// Identity is the (`challenge_id`, `address`) pair. `score` only ever
/// grows, by addition of non-negative submitted amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub challenge_id: String,
    pub address: String,
    /// Decimal string, non-negative, monotonically non-decreasing.
    pub score: String,
    pub join_tx_hash: String,
    pub joined_at: Option<i64>,
    pub last_update_tx_hash: Option<String>,
    pub last_score_change_at: Option<i64>,
}
