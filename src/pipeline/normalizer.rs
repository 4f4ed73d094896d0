//! Normalization of heterogeneous gateway transaction records.
//!
//! Upstream APIs disagree on field naming, so the normalizer tries a fixed
//! list of alias keys for the transaction hash and tolerates timestamps
//! given in seconds or milliseconds, as numbers or numeric strings. A
//! record without any usable hash is dropped; everything else is kept even
//! when optional fields are missing.

use super::types::NormalizedTransaction;
use serde_json::Value;

/// Hash alias keys, tried in order. First present wins. The order is part
/// of the pipeline contract and must not be reordered.
const HASH_KEYS: [&str; 5] = ["txHash", "hash", "tx_hash", "identifier", "_id"];

/// Millisecond timestamp keys, tried before the second-resolution keys.
const TIMESTAMP_MS_KEYS: [&str; 2] = ["timestampMs", "timestamp_ms"];

/// Second-resolution timestamp keys, multiplied by 1000.
const TIMESTAMP_SEC_KEYS: [&str; 2] = ["timestamp", "time"];

/// Reduce one raw gateway record to its canonical form.
///
/// Returns `None` when no hash alias key holds a non-empty string; the
/// record is then unusable for dedup and projection and is discarded.
pub fn normalize_transaction(raw: &Value) -> Option<NormalizedTransaction> {
    let obj = raw.as_object()?;

    let tx_hash = HASH_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .filter(|hash| !hash.is_empty())
        .map(str::to_owned)?;

    Some(NormalizedTransaction {
        tx_hash,
        sender: string_field(raw, "sender"),
        receiver: string_field(raw, "receiver"),
        data: string_field(raw, "data"),
        timestamp_ms: derive_timestamp_ms(raw),
        raw: raw.clone(),
    })
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Derive a millisecond timestamp. An explicit milliseconds field wins;
/// otherwise a seconds field is scaled. Non-numeric or missing values
/// yield `None` — the transaction is kept, just un-ordered-by-time.
fn derive_timestamp_ms(raw: &Value) -> Option<i64> {
    for key in TIMESTAMP_MS_KEYS {
        if let Some(ms) = numeric_field(raw, key) {
            return Some(ms);
        }
    }
    for key in TIMESTAMP_SEC_KEYS {
        if let Some(secs) = numeric_field(raw, key) {
            return Some(secs.saturating_mul(1000));
        }
    }
    None
}

/// Accept JSON numbers and numeric strings; anything else is absent.
fn numeric_field(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_tx_hash_alias_order() {
        // Test: txHash wins over every other alias when several are present
        let raw = json!({
            "txHash": "0xAAA",
            "hash": "0xBBB",
            "identifier": "0xCCC",
        });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.tx_hash, "0xAAA");

        let raw = json!({ "tx_hash": "0xDDD", "identifier": "0xEEE", "_id": "0xFFF" });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.tx_hash, "0xDDD");
    }

    #[test]
    fn test_record_without_hash_is_dropped() {
        let raw = json!({ "sender": "alice", "timestamp": 100 });
        assert!(normalize_transaction(&raw).is_none());

        // An empty hash string counts as unusable
        let raw = json!({ "txHash": "" });
        assert!(normalize_transaction(&raw).is_none());
    }

    #[test]
    fn test_milliseconds_field_wins_over_seconds() {
        let raw = json!({ "hash": "0x1", "timestampMs": 5500, "timestamp": 9 });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.timestamp_ms, Some(5500));
    }

    #[test]
    fn test_seconds_field_is_scaled() {
        let raw = json!({ "hash": "0x1", "timestamp": 1700000000 });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.timestamp_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_numeric_string_timestamp_is_accepted() {
        let raw = json!({ "hash": "0x1", "timestamp": "120" });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.timestamp_ms, Some(120_000));
    }

    #[test]
    fn test_non_numeric_timestamp_yields_absent() {
        // Test: transaction is kept, timestamp is None, ordering falls back to 0
        let raw = json!({ "hash": "0x1", "timestamp": "soon" });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.timestamp_ms, None);
        assert_eq!(tx.timestamp_or_zero(), 0);
    }

    #[test]
    fn test_optional_fields_survive() {
        let raw = json!({
            "identifier": "0x2",
            "sender": "erd1alice",
            "receiver": "erd1contract",
            "data": "Y3JlYXRlQ2hhbGxlbmdl",
        });
        let tx = normalize_transaction(&raw).unwrap();
        assert_eq!(tx.sender.as_deref(), Some("erd1alice"));
        assert_eq!(tx.receiver.as_deref(), Some("erd1contract"));
        assert_eq!(tx.data.as_deref(), Some("Y3JlYXRlQ2hhbGxlbmdl"));
        assert_eq!(tx.raw, raw);
    }
}
