//! Bounded dedup window over recently processed transactions.
//!
//! The window remembers the last `capacity` transaction hashes in a FIFO
//! set and the highest timestamp ever marked processed. A transaction is
//! novel only if its hash is unseen AND its timestamp has not fallen
//! behind the high-water-mark; the timestamp gate keeps older
//! transactions out even after their hash has aged out of the bounded set.
//!
//! The window is in-memory only. A restart resets it, so correctness
//! under replay rests on the Projector's idempotent handlers, not on
//! this structure.

use super::types::NormalizedTransaction;
use std::collections::{HashSet, VecDeque};

/// FIFO set of recent transaction hashes plus a high-water-mark timestamp.
///
/// Owned by the Projector instance; never shared or global.
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
    latest_timestamp_ms: Option<i64>,
}

impl DedupWindow {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            latest_timestamp_ms: None,
        }
    }

    /// Whether a transaction should reach the effect handlers.
    ///
    /// Novel iff the hash is not in the window AND (no transaction has
    /// been processed yet OR this one is not older than the latest
    /// processed timestamp). An absent timestamp compares as 0, matching
    /// the Fetcher's sort key.
    pub fn is_novel(&self, tx: &NormalizedTransaction) -> bool {
        if self.seen.contains(&tx.tx_hash) {
            return false;
        }
        match self.latest_timestamp_ms {
            None => true,
            Some(mark) => tx.timestamp_or_zero() >= mark,
        }
    }

    /// Record a transaction as processed, whether or not its handler
    /// succeeded. Evicts the oldest hash once past capacity and raises
    /// the high-water-mark.
    pub fn mark_processed(&mut self, tx: &NormalizedTransaction) {
        if self.seen.insert(tx.tx_hash.clone()) {
            self.order.push_back(tx.tx_hash.clone());
            if self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }

        let ts = tx.timestamp_or_zero();
        self.latest_timestamp_ms = Some(match self.latest_timestamp_ms {
            Some(mark) => mark.max(ts),
            None => ts,
        });
    }

    pub fn high_water_mark(&self) -> Option<i64> {
        self.latest_timestamp_ms
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(hash: &str, timestamp_ms: Option<i64>) -> NormalizedTransaction {
        NormalizedTransaction {
            tx_hash: hash.to_owned(),
            sender: None,
            receiver: None,
            data: None,
            timestamp_ms,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_fresh_window_accepts_everything() {
        let window = DedupWindow::default();
        assert!(window.is_novel(&tx("0xA", Some(100))));
        assert!(window.is_novel(&tx("0xB", None)));
    }

    #[test]
    fn test_seen_hash_is_not_novel() {
        let mut window = DedupWindow::default();
        window.mark_processed(&tx("0xA", Some(100)));
        assert!(!window.is_novel(&tx("0xA", Some(100))));
        // Even with a newer timestamp the hash stays blocked
        assert!(!window.is_novel(&tx("0xA", Some(500))));
    }

    #[test]
    fn test_timestamp_gate_blocks_older_transactions() {
        let mut window = DedupWindow::default();
        window.mark_processed(&tx("0xA", Some(200)));
        assert_eq!(window.high_water_mark(), Some(200));

        assert!(!window.is_novel(&tx("0xOLD", Some(100))));
        // Equal to the mark passes
        assert!(window.is_novel(&tx("0xEQ", Some(200))));
        assert!(window.is_novel(&tx("0xNEW", Some(300))));
    }

    #[test]
    fn test_high_water_mark_never_decreases() {
        let mut window = DedupWindow::default();
        window.mark_processed(&tx("0xA", Some(300)));
        window.mark_processed(&tx("0xB", Some(100)));
        assert_eq!(window.high_water_mark(), Some(300));
    }

    #[test]
    fn test_eviction_past_capacity() {
        // Test: after capacity + 1 distinct hashes the first is evicted from
        // the membership set, but the high-water-mark still blocks it
        let mut window = DedupWindow::new(3);
        for (i, hash) in ["0x1", "0x2", "0x3", "0x4"].iter().enumerate() {
            window.mark_processed(&tx(hash, Some(i as i64 * 10)));
        }

        assert_eq!(window.len(), 3);
        // 0x1 aged out of the set, but its timestamp (0) is behind the mark (30)
        assert!(!window.is_novel(&tx("0x1", Some(0))));
        assert!(!window.is_novel(&tx("0x2", Some(10))));
    }

    #[test]
    fn test_eviction_at_501_distinct_hashes() {
        let mut window = DedupWindow::default();
        for i in 0..501 {
            window.mark_processed(&tx(&format!("0x{i:x}"), Some(i)));
        }
        assert_eq!(window.len(), DedupWindow::DEFAULT_CAPACITY);
        // Hash 0 is out of the set; timestamps monotonic with hash order
        // means the gate still rejects it
        assert!(!window.is_novel(&tx("0x0", Some(0))));
    }

    #[test]
    fn test_marking_same_hash_twice_does_not_grow_window() {
        let mut window = DedupWindow::new(3);
        window.mark_processed(&tx("0xA", Some(1)));
        window.mark_processed(&tx("0xA", Some(2)));
        assert_eq!(window.len(), 1);
        assert_eq!(window.high_water_mark(), Some(2));
    }
}
