use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use super::{Engine, EngineError};
use crate::cache::ResultCache;
use crate::dict::{clean_candidates, Tier, TierSnapshot, ToneVariant};
use crate::learning::Learner;
use crate::ledger::FrequencyLedger;
use crate::polyphone::{default_rules, parse_polyphone_toml, RuleSet};
use crate::settings::{settings as global_settings, Settings};
use crate::store::{
    Clock, DictionaryStore, FrequencyStore, MemoryStore, NotFoundSink, NullSink, SystemClock,
};

/// Configures and loads an [`Engine`].
///
/// Every collaborator is optional: dictionaries and counters default to an
/// in-memory store, time to the system clock, and not-found keys are
/// discarded.
#[derive(Default)]
pub struct EngineBuilder {
    settings: Option<Settings>,
    rules: Option<RuleSet>,
    extra_rules: Vec<String>,
    dict_store: Option<Arc<dyn DictionaryStore>>,
    freq_store: Option<Arc<dyn FrequencyStore>>,
    not_found: Option<Arc<dyn NotFoundSink>>,
    clock: Option<Arc<dyn Clock>>,
    seed: TierSnapshot,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these settings instead of the process-wide ones.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the embedded default rule set.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Additional `[[rules]]` TOML, appended after the base rules.
    pub fn rules_toml(mut self, toml: impl Into<String>) -> Self {
        self.extra_rules.push(toml.into());
        self
    }

    pub fn dictionary_store(mut self, store: Arc<dyn DictionaryStore>) -> Self {
        self.dict_store = Some(store);
        self
    }

    pub fn frequency_store(mut self, store: Arc<dyn FrequencyStore>) -> Self {
        self.freq_store = Some(store);
        self
    }

    /// One object serving both persistence traits.
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: DictionaryStore + FrequencyStore + 'static,
    {
        let dict: Arc<dyn DictionaryStore> = store.clone();
        let freq: Arc<dyn FrequencyStore> = store;
        self.dictionary_store(dict).frequency_store(freq)
    }

    pub fn not_found(mut self, sink: Arc<dyn NotFoundSink>) -> Self {
        self.not_found = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Inline entry in diacritic or numbered form; invalid candidates are
    /// dropped and the untoned variant is derived. Custom keys may be words,
    /// including ones that start with ASCII (`A股`). A persisted snapshot of
    /// the same tier variant replaces inline entries wholesale.
    pub fn entry<S: AsRef<str>>(mut self, tier: Tier, key: &str, candidates: &[S]) -> Self {
        self.seed.insert_both(tier, key, &clean_candidates(candidates));
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let settings = self.settings.unwrap_or_else(|| global_settings().clone());

        let mut rules = self.rules.unwrap_or_else(|| default_rules().clone());
        for toml in &self.extra_rules {
            rules.extend(parse_polyphone_toml(toml)?);
        }

        let memory = Arc::new(MemoryStore::new());
        let dict_store: Arc<dyn DictionaryStore> = match self.dict_store {
            Some(store) => store,
            None => memory.clone(),
        };
        let freq_store: Arc<dyn FrequencyStore> = match self.freq_store {
            Some(store) => store,
            None => memory,
        };
        let not_found: Arc<dyn NotFoundSink> = match self.not_found {
            Some(sink) => sink,
            None => Arc::new(NullSink),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let mut tiers = self.seed;
        for tier in Tier::ALL {
            for variant in ToneVariant::ALL {
                if let Some(map) = dict_store.load(tier, variant)? {
                    tiers.replace(tier, variant, map);
                }
            }
            tiers.derive_untoned(tier);
        }
        for c in tiers.heal() {
            warn!(
                key = %c.key,
                variant = c.variant.name(),
                kept = c.kept.name(),
                dropped = c.dropped.name(),
                "healed inconsistent tier state on load"
            );
        }

        let ledger = FrequencyLedger::from_counts(freq_store.load()?);
        let capacity = NonZeroUsize::new(settings.cache.capacity).unwrap_or(NonZeroUsize::MIN);

        debug!(
            common = tiers.len(Tier::Common, ToneVariant::Toned),
            rare = tiers.len(Tier::Rare, ToneVariant::Toned),
            extended = tiers.len(Tier::Extended, ToneVariant::Toned),
            self_learned = tiers.len(Tier::SelfLearned, ToneVariant::Toned),
            custom = tiers.len(Tier::Custom, ToneVariant::Toned),
            rules = rules.len(),
            tracked = ledger.len(),
            "engine loaded"
        );

        Ok(Engine {
            learner: Mutex::new(Learner::new(settings.learning.clone(), ledger, clock.now())),
            cache: Mutex::new(ResultCache::new(capacity, settings.cache.ttl_secs)),
            tiers: RwLock::new(Arc::new(tiers)),
            backlog: Mutex::new(Vec::new()),
            settings,
            rules,
            dict_store,
            freq_store,
            not_found,
            clock,
        })
    }
}
