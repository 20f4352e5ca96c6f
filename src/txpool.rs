//! Transaction inventory pool.
//!
//! Deduplicates transaction observations across all admitted peers. Entries
//! decay in two-tick windows instead of carrying per-entry timestamps: every
//! tick expires whatever existed at the previous tick, so with the 20-second
//! tick an entry is retained for between 20 and 40 seconds, enough to cover
//! the network's propagation horizon.

use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::Transaction;

/// Interval between decay ticks.
pub const DECAY_INTERVAL: Duration = Duration::from_secs(20);

/// In-memory dedup cache of recently seen transactions.
///
/// The ordered sequence and the hash index always hold the same elements;
/// insertion order is observation order, which is what decay windows on.
#[derive(Debug, Default)]
pub struct TxPool {
    /// Transactions in observation order.
    order: Vec<Transaction>,
    /// Hash index for O(1) membership.
    index: HashMap<[u8; 32], ()>,
    /// Length of `order` at the previous decay tick.
    prev_len: usize,
}

impl TxPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation. Returns true when the transaction is new.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.index.contains_key(&tx.hash) {
            return false;
        }
        self.index.insert(tx.hash, ());
        self.order.push(tx);
        true
    }

    /// Whether a transaction is currently held.
    pub fn contains(&self, hash: &[u8; 32]) -> bool {
        self.index.contains_key(hash)
    }

    /// Look up a held transaction.
    pub fn get(&self, hash: &[u8; 32]) -> Option<&Transaction> {
        if !self.index.contains_key(hash) {
            return None;
        }
        self.order.iter().find(|tx| &tx.hash == hash)
    }

    /// Number of held transactions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run one decay tick: everything that existed at the previous tick
    /// expires.
    pub fn decay(&mut self) {
        let expiring = self.prev_len.min(self.order.len());
        for tx in self.order.drain(..expiring) {
            self.index.remove(&tx.hash);
        }
        self.prev_len = self.order.len();

        if expiring > 0 {
            tracing::debug!(expired = expiring, retained = self.order.len(), "Tx pool decay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn tx(byte: u8) -> Transaction {
        Transaction {
            hash: [byte; 32],
            raw: Bytes::from_static(b"tx"),
        }
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut pool = TxPool::new();
        assert!(pool.insert(tx(1)));
        assert!(!pool.insert(tx(1)));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&[1u8; 32]));
    }

    #[test]
    fn test_index_matches_order() {
        let mut pool = TxPool::new();
        for b in 0..5 {
            pool.insert(tx(b));
        }
        pool.decay();
        pool.insert(tx(5));
        pool.decay();

        assert_eq!(pool.order.len(), pool.index.len());
        for t in &pool.order {
            assert!(pool.index.contains_key(&t.hash));
        }
    }

    #[test]
    fn test_two_tick_decay() {
        let mut pool = TxPool::new();
        pool.insert(tx(1));

        // First tick after insertion: the entry survives, the window closes
        // behind it.
        pool.decay();
        assert!(pool.contains(&[1u8; 32]));

        // An entry inserted inside the new window...
        pool.insert(tx(2));

        // ...survives the tick that expires the first one.
        pool.decay();
        assert!(!pool.contains(&[1u8; 32]));
        assert!(pool.contains(&[2u8; 32]));

        pool.decay();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_get() {
        let mut pool = TxPool::new();
        pool.insert(tx(3));
        assert_eq!(pool.get(&[3u8; 32]).unwrap().hash, [3u8; 32]);
        assert!(pool.get(&[4u8; 32]).is_none());
    }
}
