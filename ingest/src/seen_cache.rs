//! Bounded FIFO set of transaction ids already handed to the pipeline, used by
//! the mempool listener and the account-model pending set.
//!
//! When full, the oldest id is evicted. Lookups are O(1) via a `HashSet`;
//! explicit removal scans the eviction queue.

use std::collections::{HashSet, VecDeque};

pub struct SeenCache {
    set: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Record a txid. Returns `true` if it had not been seen yet.
    ///
    /// With zero capacity nothing is remembered and every id is new.
    pub fn insert(&mut self, tx_id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.set.contains(tx_id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.set.insert(tx_id.to_string());
        self.order.push_back(tx_id.to_string());
        true
    }

    /// Forget `tx_id`. Returns `true` if it was present.
    pub fn remove(&mut self, tx_id: &str) -> bool {
        if !self.set.remove(tx_id) {
            return false;
        }
        if let Some(pos) = self.order.iter().position(|id| id == tx_id) {
            self.order.remove(pos);
        }
        true
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.set.contains(tx_id)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_not() {
        let mut seen = SeenCache::new(10);
        assert!(seen.insert("aa"));
        assert!(!seen.insert("aa"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn fifo_eviction_order() {
        let mut seen = SeenCache::new(2);
        seen.insert("t1");
        seen.insert("t2");
        seen.insert("t3"); // evicts t1
        seen.insert("t4"); // evicts t2

        assert!(!seen.contains("t1"));
        assert!(!seen.contains("t2"));
        assert!(seen.contains("t3"));
        assert!(seen.contains("t4"));
    }

    #[test]
    fn evicted_id_counts_as_new_again() {
        let mut seen = SeenCache::new(1);
        seen.insert("t1");
        seen.insert("t2");
        assert!(seen.insert("t1"));
    }

    #[test]
    fn removed_id_frees_its_slot() {
        let mut seen = SeenCache::new(2);
        seen.insert("t1");
        seen.insert("t2");
        assert!(seen.remove("t1"));
        assert!(!seen.remove("t1"));
        seen.insert("t3");
        assert!(seen.contains("t2"));
        assert!(seen.contains("t3"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn zero_capacity_remembers_nothing() {
        let mut seen = SeenCache::new(0);
        assert!(seen.insert("t1"));
        assert!(seen.insert("t1"));
        assert!(seen.is_empty());
    }
}
