//! The engine ties the pieces together.
//!
//! Readers take the current tier snapshot (an `Arc` clone under a brief
//! read lock), convert without holding any lock, then feed their
//! resolutions to the [`Learner`] behind the single writer lock. When a
//! migration holds that lock, observations are queued instead and applied
//! by the next writer, so conversions never wait on persistence.
//!
//! Whole-text results are cached behind their own lock. Tier migrations do
//! not invalidate the cache; entries age out under LRU pressure or the TTL
//! sweep.

mod builder;
#[cfg(test)]
mod tests;

pub use builder::EngineBuilder;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use tracing::warn;

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::convert::{convert_text, ConvertOptions, Converted, Observation};
use crate::dict::{DictError, Tier, TierSnapshot, ToneVariant};
use crate::learning::{DemotionReport, Learner, MergeReport, MigrationError, Stores};
use crate::polyphone::{Context, RuleError, RuleSet};
use crate::resolver::{Resolution, Resolver, Source};
use crate::settings::Settings;
use crate::store::{
    Clock, DictionaryStore, FrequencyStore, NotFoundSink, PendingLookups, PronunciationFetcher,
};
use crate::unicode::is_hanzi;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to load snapshot: {0}")]
    Persistence(#[from] DictError),

    #[error("invalid polyphone rules: {0}")]
    Rule(#[from] RuleError),
}

pub struct Engine {
    settings: Settings,
    rules: RuleSet,
    tiers: RwLock<Arc<TierSnapshot>>,
    /// Single writer lock over ledger and migrations.
    learner: Mutex<Learner>,
    /// Observations that arrived while a writer held `learner`.
    backlog: Mutex<Vec<Observation>>,
    cache: Mutex<ResultCache>,
    dict_store: Arc<dyn DictionaryStore>,
    freq_store: Arc<dyn FrequencyStore>,
    not_found: Arc<dyn NotFoundSink>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The current tier snapshot. Stays valid (and unchanged) after later
    /// migrations swap in a new one.
    pub fn snapshot(&self) -> Arc<TierSnapshot> {
        Arc::clone(&self.tiers.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, next: TierSnapshot) {
        *self.tiers.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    fn lock_cache(&self) -> MutexGuard<'_, ResultCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolver<'a>(&'a self, tiers: &'a TierSnapshot) -> Resolver<'a> {
        Resolver::new(tiers, &self.rules)
            .with_passthrough(&self.settings.resolver.passthrough_punctuation)
    }

    fn run(&self, text: &str, options: &ConvertOptions) -> Converted {
        let tiers = self.snapshot();
        let resolver = self
            .resolver(&tiers)
            .with_overrides(&options.overrides)
            .with_polyphone(options.polyphone);
        let converted = convert_text(&resolver, text, options);
        self.feed(&converted.observations);
        converted
    }

    /// Convert `text` to a pinyin string. Repeated calls with the same
    /// text and options are served from the cache and skip resolution.
    ///
    /// The cache lock is released while converting, so this is
    /// [`ResultCache::get_or_compute`] split in two: concurrent misses on
    /// one key may both convert, and the later `put` wins.
    pub fn convert(&self, text: &str, options: &ConvertOptions) -> String {
        let key = CacheKey::new(text, options);
        let now = self.clock.now();
        let cached = self.lock_cache().get(&key, now);
        if let Some(hit) = cached {
            return hit;
        }
        let out = self.run(text, options).join(options);
        self.lock_cache().put(key, out.clone(), now);
        out
    }

    /// Rendered tokens instead of a joined string. Not cached.
    pub fn syllables(&self, text: &str, options: &ConvertOptions) -> Vec<String> {
        self.run(text, options).rendered(options.tone)
    }

    /// First letter of every syllable: `银行` → `yh`. Not cached.
    pub fn initials(&self, text: &str, options: &ConvertOptions) -> String {
        self.run(text, options).initials()
    }

    /// Resolve a single character and feed the result back.
    pub fn resolve(&self, ch: char, ctx: Option<&Context>) -> Resolution {
        let tiers = self.snapshot();
        let resolution = self.resolver(&tiers).resolve(ch, ctx);
        self.feed(&[Observation {
            key: ch.to_string(),
            resolution: resolution.clone(),
        }]);
        resolution
    }

    fn feed(&self, observations: &[Observation]) {
        for o in observations {
            if o.resolution.source == Source::Unresolved && o.key.chars().all(is_hanzi) {
                self.not_found.record(&o.key);
            }
        }
        let mut learner = match self.learner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.backlog
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(observations);
                return;
            }
        };
        self.apply(&mut learner, observations);
    }

    /// Apply queued and fresh observations. Caller holds the writer lock.
    fn apply(&self, learner: &mut Learner, fresh: &[Observation]) {
        let queued =
            std::mem::take(&mut *self.backlog.lock().unwrap_or_else(PoisonError::into_inner));
        if queued.is_empty() && fresh.is_empty() {
            return;
        }
        let now = self.clock.now();
        let mut next = TierSnapshot::clone(&self.snapshot());
        let mut changed = false;
        for o in queued.iter().chain(fresh) {
            changed |= learner
                .observe(&mut next, &o.key, &o.resolution, now)
                .is_some();
        }
        if changed {
            self.publish(next);
        }
    }

    /// Run `f` as the single writer. The new snapshot is published only
    /// when `f` succeeds.
    fn migrate<T>(
        &self,
        f: impl FnOnce(&mut Learner, &mut TierSnapshot, Stores) -> Result<T, MigrationError>,
    ) -> Result<T, MigrationError> {
        let mut learner = self.learner.lock().unwrap_or_else(PoisonError::into_inner);
        self.apply(&mut learner, &[]);
        let mut next = TierSnapshot::clone(&self.snapshot());
        let stores = Stores {
            dict: self.dict_store.as_ref(),
            freq: self.freq_store.as_ref(),
        };
        let out = f(&mut learner, &mut next, stores)?;
        self.publish(next);
        Ok(out)
    }

    /// Scheduled (or, with `force`, unconditional) batch merge of one
    /// tone variant of the self-learned tier.
    pub fn merge(&self, variant: ToneVariant, force: bool) -> Result<MergeReport, MigrationError> {
        let now = self.clock.now();
        self.migrate(|l, tiers, stores| l.merge(tiers, variant, now, force, stores))
    }

    /// Scheduled (or forced) demotion of cold common entries.
    pub fn demote(&self, force: bool) -> Result<DemotionReport, MigrationError> {
        let now = self.clock.now();
        let load = self.clock.load();
        self.migrate(|l, tiers, stores| l.demote(tiers, now, load, force, stores))
    }

    /// Persist unsaved tiers and the frequency ledger.
    pub fn flush(&self) -> Result<usize, MigrationError> {
        self.migrate(|l, tiers, stores| l.flush(tiers, stores))
    }

    /// Put a fetched pronunciation into the self-learned tier.
    pub fn learn(&self, key: &str, pronunciation: &str) -> Result<bool, MigrationError> {
        let now = self.clock.now();
        self.migrate(|l, tiers, _| l.learn(tiers, key, pronunciation, now))
    }

    /// Drain `pending` through `fetcher` and learn every answer. Keys the
    /// fetcher cannot answer stay pending; invalid answers are dropped.
    /// Returns how many keys were learned.
    pub fn learn_pending(&self, pending: &PendingLookups, fetcher: &dyn PronunciationFetcher) -> usize {
        let mut learned = 0;
        for (key, pronunciation) in pending.fetch_with(fetcher) {
            match self.learn(&key, &pronunciation) {
                Ok(true) => learned += 1,
                Ok(false) => {}
                Err(e) => warn!(%key, error = %e, "dropping fetched pronunciation"),
            }
        }
        learned
    }

    pub fn set_custom<S: AsRef<str>>(&self, key: &str, candidates: &[S]) -> Result<(), MigrationError> {
        self.migrate(|l, tiers, stores| l.set_custom(tiers, key, candidates, stores))
    }

    pub fn remove_custom(&self, key: &str) -> Result<bool, MigrationError> {
        self.migrate(|l, tiers, stores| l.remove_custom(tiers, key, stores))
    }

    pub fn lookup(&self, tier: Tier, variant: ToneVariant, key: &str) -> Option<Vec<String>> {
        self.snapshot().get(tier, variant, key).map(<[String]>::to_vec)
    }

    pub fn tiers_of(&self, key: &str) -> Vec<Tier> {
        self.snapshot().tiers_of(key)
    }

    /// Ledger counter for `key`, including queued observations.
    pub fn frequency(&self, key: &str) -> u64 {
        let mut learner = self.learner.lock().unwrap_or_else(PoisonError::into_inner);
        self.apply(&mut learner, &[]);
        learner.ledger().frequency(key)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    /// Drop cache entries older than the configured TTL.
    pub fn sweep_cache(&self) -> usize {
        let now = self.clock.now();
        self.lock_cache().sweep_expired(now)
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }
}
