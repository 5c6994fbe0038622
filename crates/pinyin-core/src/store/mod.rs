//! Collaborator contracts around the engine.
//!
//! The engine never touches disk or network itself. Tier snapshots and
//! frequency counters go through the persistence traits; unresolved
//! characters go to a [`NotFoundSink`]; time and load come from a
//! [`Clock`]. File-backed and in-memory implementations are provided.

mod file;
mod memory;

pub use file::{FileDictionaryStore, FileFrequencyStore};
pub use memory::MemoryStore;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dict::{DictError, Tier, TierMap, ToneVariant};

/// Atomic snapshots of one tier variant.
pub trait DictionaryStore: Send + Sync {
    /// `Ok(None)` when no snapshot exists yet.
    fn load(&self, tier: Tier, variant: ToneVariant) -> Result<Option<TierMap>, DictError>;
    fn save(&self, tier: Tier, variant: ToneVariant, map: &TierMap) -> Result<(), DictError>;
}

/// Persisted counter map, mirrored in memory by the ledger.
pub trait FrequencyStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, u64>, DictError>;
    fn save(&self, counts: &HashMap<String, u64>) -> Result<(), DictError>;
}

/// Receives keys nothing could resolve. Deduplication is the sink's job.
pub trait NotFoundSink: Send + Sync {
    fn record(&self, key: &str);
}

/// Out-of-band pronunciation source for not-found keys. Never called on
/// the resolution path.
pub trait PronunciationFetcher {
    fn fetch(&self, key: &str) -> Option<String>;
}

/// Time in epoch seconds plus an optional load signal for migration backoff.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
    fn load(&self) -> Option<f64> {
        None
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Clock driven by hand, for simulations and tests.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
    load: Mutex<Option<f64>>,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
            load: Mutex::new(None),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set_load(&self, load: Option<f64>) {
        *self.load.lock().unwrap_or_else(PoisonError::into_inner) = load;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn load(&self) -> Option<f64> {
        *self.load.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Discards everything.
pub struct NullSink;

impl NotFoundSink for NullSink {
    fn record(&self, _key: &str) {}
}

/// Deduplicating queue of not-found keys, drained by downstream processing.
#[derive(Default)]
pub struct PendingLookups {
    pending: Mutex<BTreeSet<String>>,
}

impl PendingLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every pending key, in sorted order.
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending).into_iter().collect()
    }

    /// Fetch pronunciations for pending keys. Keys the fetcher cannot
    /// answer stay queued.
    pub fn fetch_with(&self, fetcher: &dyn PronunciationFetcher) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for key in self.drain() {
            match fetcher.fetch(&key) {
                Some(p) => found.push((key, p)),
                None => self.record(&key),
            }
        }
        found
    }
}

impl NotFoundSink for PendingLookups {
    fn record(&self, key: &str) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }
}
