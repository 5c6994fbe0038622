use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{DictionaryStore, FrequencyStore};
use crate::dict::{DictError, Tier, TierMap, ToneVariant};

/// In-process implementation of both persistence traits.
///
/// Saves can be switched to fail, which is how migration rollback is
/// exercised without touching disk.
#[derive(Default)]
pub struct MemoryStore {
    tiers: Mutex<HashMap<(Tier, ToneVariant), TierMap>>,
    counts: Mutex<HashMap<String, u64>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding of one tier variant.
    pub fn with_tier(self, tier: Tier, variant: ToneVariant, map: TierMap) -> Self {
        self.seed(tier, variant, map);
        self
    }

    pub fn seed(&self, tier: Tier, variant: ToneVariant, map: TierMap) {
        self.tiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tier, variant), map);
    }

    pub fn seed_counts(&self, counts: HashMap<String, u64>) {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner) = counts;
    }

    /// Last saved (or seeded) contents of a tier variant.
    pub fn tier(&self, tier: Tier, variant: ToneVariant) -> Option<TierMap> {
        self.tiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(tier, variant))
            .cloned()
    }

    pub fn counts(&self) -> HashMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves across both traits.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), DictError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DictError::Unavailable("saves disabled".to_string()));
        }
        Ok(())
    }
}

impl DictionaryStore for MemoryStore {
    fn load(&self, tier: Tier, variant: ToneVariant) -> Result<Option<TierMap>, DictError> {
        Ok(self.tier(tier, variant))
    }

    fn save(&self, tier: Tier, variant: ToneVariant, map: &TierMap) -> Result<(), DictError> {
        self.check_writable()?;
        self.seed(tier, variant, map.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl FrequencyStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, u64>, DictError> {
        Ok(self.counts())
    }

    fn save(&self, counts: &HashMap<String, u64>) -> Result<(), DictError> {
        self.check_writable()?;
        self.seed_counts(counts.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
