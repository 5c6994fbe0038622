//! Per-key resolution counts.
//!
//! The ledger is an in-memory mirror of the persisted counter map. Counts
//! only grow, except when a migration explicitly clears the keys it moved.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub frequency: u64,
    pub last_seen: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FrequencyLedger {
    entries: HashMap<String, LedgerEntry>,
}

impl FrequencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted counters. Zero counts are skipped.
    pub fn from_counts(counts: HashMap<String, u64>) -> Self {
        let entries = counts
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(k, frequency)| {
                (
                    k,
                    LedgerEntry {
                        frequency,
                        last_seen: 0,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Increment the counter for `key`, creating it on first sight.
    /// Returns the new count.
    pub fn bump(&mut self, key: &str, now: u64) -> u64 {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(LedgerEntry {
                frequency: 0,
                last_seen: now,
            });
        entry.frequency = entry.frequency.saturating_add(1);
        entry.last_seen = now;
        entry.frequency
    }

    /// Force a counter to `frequency`. Used when a key starts a new life in
    /// the self-learned tier.
    pub fn set(&mut self, key: &str, frequency: u64, now: u64) {
        self.entries.insert(
            key.to_string(),
            LedgerEntry {
                frequency,
                last_seen: now,
            },
        );
    }

    pub fn frequency(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(0, |e| e.frequency)
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop the counters of migrated keys. Other counters are untouched.
    pub fn clear<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flat counter map for the frequency persistence collaborator.
    pub fn counts(&self) -> HashMap<String, u64> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.frequency))
            .collect()
    }
}
