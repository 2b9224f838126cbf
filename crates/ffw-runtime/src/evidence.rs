#![forbid(unsafe_code)]

//! Bounded FIFO ledger used for plan/execution audit trails.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Bounded FIFO buffer of structured records.
///
/// Capacity is enforced via `capacity.max(1)`, so at least one entry is kept.
/// When full, the oldest entry (front of the `VecDeque`) is evicted before a
/// new entry is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedLedger<T> {
    capacity: usize,
    entries: VecDeque<T>,
    evicted: u64,
}

impl<T> BoundedLedger<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            evicted: 0,
        }
    }

    /// Append an entry, evicting the oldest if at capacity.
    pub fn record(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently recorded entry.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries dropped because the ledger was full.
    #[must_use]
    pub const fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        self.entries.drain(..).collect()
    }

    /// Remove and return the entries matching `predicate`, oldest first.
    /// Other entries keep their order.
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if predicate(&entry) {
                taken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        taken
    }
}

impl<T: Serialize> BoundedLedger<T> {
    /// One JSON document per entry, newline separated.
    #[must_use]
    pub fn serialize_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|entry| serde_json::to_string(entry).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::BoundedLedger;

    #[test]
    fn ledger_evicts_oldest_first() {
        let mut ledger = BoundedLedger::new(2);
        ledger.record(1);
        ledger.record(2);
        ledger.record(3);
        assert_eq!(ledger.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(ledger.evicted(), 1);
        assert_eq!(ledger.latest(), Some(&3));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut ledger = BoundedLedger::new(0);
        ledger.record("a");
        ledger.record("b");
        assert_eq!(ledger.capacity(), 1);
        assert_eq!(ledger.drain(), vec!["b"]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn drain_where_leaves_other_entries_in_order() {
        let mut ledger = BoundedLedger::new(8);
        for value in 1..=6 {
            ledger.record(value);
        }
        assert_eq!(ledger.drain_where(|value| value % 2 == 0), vec![2, 4, 6]);
        assert_eq!(ledger.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(ledger.evicted(), 0);
    }

    #[test]
    fn jsonl_has_one_line_per_entry() {
        let mut ledger = BoundedLedger::new(4);
        ledger.record(vec![1, 2]);
        ledger.record(vec![3]);
        assert_eq!(ledger.serialize_jsonl(), "[1,2]\n[3]");
    }
}
