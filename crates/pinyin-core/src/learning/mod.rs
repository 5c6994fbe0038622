//! Self-learning feedback loop.
//!
//! A character first resolved through the rare or extended tier is copied
//! into the self-learned tier with frequency 1. Hot self-learned entries
//! jump straight to common; the rest wait for a scheduled batch merge.
//! Cold common entries are periodically demoted to rare.
//!
//! All migration state (ledger, schedule, unsaved tiers) lives in
//! [`Learner`], which the engine keeps behind its single writer lock.
//! Migrations build the next snapshot on a clone and only replace the live
//! one after every touched tier has been persisted.


use std::collections::{BTreeSet, HashSet};

use tracing::{debug, debug_span, warn};

use crate::dict::{
    clean_candidates, normalize_candidates, untoned_candidates, DictError, Tier, TierSnapshot,
    ToneVariant,
};
use crate::ledger::FrequencyLedger;
use crate::resolver::{Resolution, Source};
use crate::settings::LearningSettings;
use crate::store::{DictionaryStore, FrequencyStore};
use crate::tone::{from_numbered, is_toneless, is_valid_pronunciation, same_base, to_diacritic};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] DictError),

    #[error("invalid entry {key:?}: {reason}")]
    InvalidEntry { key: String, reason: String },
}

/// Persistence collaborators a migration writes through.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub dict: &'a dyn DictionaryStore,
    pub freq: &'a dyn FrequencyStore,
}

/// Tier movement caused by a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Copied into the self-learned tier.
    Learned,
    /// Reached the immediate threshold and moved into common.
    Common,
}

/// Why a scheduled migration did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    BelowThreshold,
    Interval,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: Vec<String>,
    /// Already in common, dropped from self-learned without overwriting.
    pub discarded: Vec<String>,
    pub deferred: Option<Deferred>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemotionReport {
    pub demoted: Vec<String>,
    pub deferred: Option<Deferred>,
    /// The load signal stretched the interval.
    pub backoff: bool,
}

type TierKey = (Tier, ToneVariant);

fn touch(set: &mut HashSet<TierKey>, tier: Tier) {
    for v in ToneVariant::ALL {
        set.insert((tier, v));
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> MigrationError {
    MigrationError::InvalidEntry {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Diacritic candidates for toneless ones.
///
/// Each candidate takes the first toned pronunciation with the same base
/// syllable held for `key` by any tier, then a numbered reading if it has
/// digits. When neither exists the toneless form is carried over and the
/// gap is logged.
pub fn restore_tone(tiers: &TierSnapshot, key: &str, untoned: &[String]) -> Vec<String> {
    let known: Vec<&String> = Tier::ALL
        .iter()
        .filter_map(|&t| tiers.get(t, ToneVariant::Toned, key))
        .flatten()
        .collect();
    let restored = untoned.iter().map(|u| {
        if let Some(t) = known.iter().find(|t| same_base(t, u)) {
            return (*t).clone();
        }
        if u.chars().any(|c| c.is_ascii_digit()) {
            return from_numbered(u);
        }
        warn!(key, pronunciation = %u, "no toned form found, keeping toneless pronunciation");
        u.clone()
    });
    normalize_candidates(restored)
}

/// Candidates of `key` in `tier` for both variants, deriving whichever
/// variant is missing.
fn both_variants(tiers: &TierSnapshot, tier: Tier, key: &str) -> Option<(Vec<String>, Vec<String>)> {
    let toned = tiers.get(tier, ToneVariant::Toned, key).map(<[String]>::to_vec);
    let untoned = tiers.get(tier, ToneVariant::Untoned, key).map(<[String]>::to_vec);
    match (toned, untoned) {
        (Some(t), Some(u)) => Some((t, u)),
        (Some(t), None) => {
            let u = untoned_candidates(&t);
            Some((t, u))
        }
        (None, Some(u)) => Some((restore_tone(tiers, key, &u), u)),
        (None, None) => None,
    }
}

/// Candidates for the other variant of a merged entry.
fn translate(tiers: &TierSnapshot, key: &str, candidates: &[String], from: ToneVariant) -> Vec<String> {
    match from {
        ToneVariant::Toned => untoned_candidates(candidates),
        ToneVariant::Untoned => restore_tone(tiers, key, candidates),
    }
}

/// A key in two exclusive tiers after a migration is a bug. Debug builds
/// stop; release builds keep the higher-priority entry.
fn settle(next: &mut TierSnapshot) {
    debug_assert!(
        next.conflicts().is_empty(),
        "tier conflict after migration: {:?}",
        next.conflicts()
    );
    for c in next.heal() {
        warn!(
            key = %c.key,
            variant = c.variant.name(),
            kept = c.kept.name(),
            dropped = c.dropped.name(),
            "healed inconsistent tier state"
        );
    }
}

pub struct Learner {
    cfg: LearningSettings,
    ledger: FrequencyLedger,
    last_merge: [u64; 2],
    last_demotion: u64,
    /// Tier variants changed in memory but not yet persisted.
    dirty: HashSet<TierKey>,
    ledger_dirty: bool,
}

impl Learner {
    /// Merges are allowed right away; demotion waits a full interval
    /// from `now`.
    pub fn new(cfg: LearningSettings, ledger: FrequencyLedger, now: u64) -> Self {
        Self {
            cfg,
            ledger,
            last_merge: [0; 2],
            last_demotion: now,
            dirty: HashSet::new(),
            ledger_dirty: false,
        }
    }

    pub fn settings(&self) -> &LearningSettings {
        &self.cfg
    }

    pub fn ledger(&self) -> &FrequencyLedger {
        &self.ledger
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.dirty.is_empty() || self.ledger_dirty
    }

    fn mark(&mut self, tier: Tier) {
        touch(&mut self.dirty, tier);
    }

    /// Feed one resolution back. Counts it, tracks rare and extended hits
    /// in the self-learned tier, and promotes hot entries to common.
    ///
    /// `tiers` is the live snapshot; the resolution may come from an older
    /// one, so tier membership is re-checked here.
    pub fn observe(
        &mut self,
        tiers: &mut TierSnapshot,
        key: &str,
        resolution: &Resolution,
        now: u64,
    ) -> Option<Promotion> {
        if matches!(
            resolution.source,
            Source::Passthrough | Source::Unresolved | Source::Override
        ) {
            return None;
        }
        self.ledger.bump(key, now);
        self.ledger_dirty = true;

        let mut promotion = None;
        match resolution.tier() {
            Some(tier @ (Tier::Rare | Tier::Extended))
                if !tiers.contains(Tier::SelfLearned, key) =>
            {
                let (toned, untoned) = both_variants(tiers, tier, key)?;
                tiers.insert(Tier::SelfLearned, ToneVariant::Toned, key, &toned);
                tiers.insert(Tier::SelfLearned, ToneVariant::Untoned, key, &untoned);
                self.mark(Tier::SelfLearned);
                self.ledger.set(key, 1, now);
                debug!(key, from = tier.name(), "tracking in self-learned tier");
                promotion = Some(Promotion::Learned);
            }
            Some(Tier::Rare | Tier::Extended | Tier::SelfLearned) => {}
            _ => return None,
        }

        if self.ledger.frequency(key) >= self.cfg.immediate_threshold
            && self.promote_to_common(tiers, key)
        {
            return Some(Promotion::Common);
        }
        promotion
    }

    /// Move a self-learned entry into common, out of every lower tier.
    fn promote_to_common(&mut self, tiers: &mut TierSnapshot, key: &str) -> bool {
        let Some((toned, untoned)) = both_variants(tiers, Tier::SelfLearned, key) else {
            return false;
        };
        let _span = debug_span!("immediate_promotion", key).entered();
        if !tiers.contains(Tier::Common, key) {
            tiers.insert(Tier::Common, ToneVariant::Toned, key, &toned);
            tiers.insert(Tier::Common, ToneVariant::Untoned, key, &untoned);
            self.mark(Tier::Common);
        }
        for tier in [Tier::SelfLearned, Tier::Rare, Tier::Extended] {
            if tiers.remove(tier, key) {
                self.mark(tier);
            }
        }
        self.ledger.clear([key]);
        debug!(key, "promoted to common");
        true
    }

    /// Add a fetched pronunciation to the self-learned tier with
    /// frequency 1. Returns false when custom, common, or self-learned
    /// already holds the key.
    pub fn learn(
        &mut self,
        tiers: &mut TierSnapshot,
        key: &str,
        pronunciation: &str,
        now: u64,
    ) -> Result<bool, MigrationError> {
        if key.is_empty() {
            return Err(invalid(key, "empty key"));
        }
        let toned = to_diacritic(pronunciation);
        if !is_valid_pronunciation(&toned) {
            return Err(invalid(key, format!("invalid pronunciation {pronunciation:?}")));
        }
        if [Tier::Custom, Tier::Common, Tier::SelfLearned]
            .iter()
            .any(|&t| tiers.contains(t, key))
        {
            return Ok(false);
        }
        let toned = if is_toneless(&toned) {
            restore_tone(tiers, key, &[toned])
        } else {
            vec![toned]
        };
        tiers.insert_both(Tier::SelfLearned, key, &toned);
        self.mark(Tier::SelfLearned);
        self.ledger.set(key, 1, now);
        self.ledger_dirty = true;
        debug!(key, "learned pronunciation");
        Ok(true)
    }

    /// Set a custom entry and persist it right away.
    pub fn set_custom<S: AsRef<str>>(
        &mut self,
        tiers: &mut TierSnapshot,
        key: &str,
        candidates: &[S],
        stores: Stores,
    ) -> Result<(), MigrationError> {
        if key.is_empty() {
            return Err(invalid(key, "empty key"));
        }
        if let Some(bad) = candidates
            .iter()
            .map(|c| c.as_ref())
            .find(|c| !c.trim().is_empty() && !is_valid_pronunciation(&to_diacritic(c)))
        {
            return Err(invalid(key, format!("invalid pronunciation {bad:?}")));
        }
        let candidates = clean_candidates(candidates);
        if candidates.is_empty() {
            return Err(invalid(key, "no pronunciations"));
        }
        let mut next = tiers.clone();
        next.insert_both(Tier::Custom, key, &candidates);
        let mut touched = HashSet::new();
        touch(&mut touched, Tier::Custom);
        let ledger = self.ledger.clone();
        self.commit(tiers, next, &touched, ledger, stores)?;
        debug!(key, "custom entry set");
        Ok(())
    }

    pub fn remove_custom(
        &mut self,
        tiers: &mut TierSnapshot,
        key: &str,
        stores: Stores,
    ) -> Result<bool, MigrationError> {
        if !tiers.contains(Tier::Custom, key) {
            return Ok(false);
        }
        let mut next = tiers.clone();
        next.remove(Tier::Custom, key);
        let mut touched = HashSet::new();
        touch(&mut touched, Tier::Custom);
        let ledger = self.ledger.clone();
        self.commit(tiers, next, &touched, ledger, stores)?;
        debug!(key, "custom entry removed");
        Ok(true)
    }

    /// Move self-learned entries of `variant` into common, most frequent
    /// first. Without `force` this waits for the size threshold and the
    /// per-variant interval.
    pub fn merge(
        &mut self,
        tiers: &mut TierSnapshot,
        variant: ToneVariant,
        now: u64,
        force: bool,
        stores: Stores,
    ) -> Result<MergeReport, MigrationError> {
        let _span = debug_span!("batch_merge", variant = variant.name(), force).entered();
        let pending = tiers.len(Tier::SelfLearned, variant);
        let mut report = MergeReport::default();
        if !force {
            let since = now.saturating_sub(self.last_merge[variant.index()]);
            report.deferred = if pending < self.cfg.merge_threshold {
                Some(Deferred::BelowThreshold)
            } else if since < self.cfg.merge_interval_secs {
                Some(Deferred::Interval)
            } else {
                None
            };
            if let Some(reason) = report.deferred {
                debug!(pending, ?reason, "merge deferred");
                return Ok(report);
            }
        }
        if pending == 0 {
            self.last_merge[variant.index()] = now;
            return Ok(report);
        }

        let mut order: Vec<(&String, u64)> = tiers
            .map(Tier::SelfLearned, variant)
            .keys()
            .map(|k| (k, self.ledger.frequency(k)))
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut next = tiers.clone();
        let mut ledger = self.ledger.clone();
        let mut touched = HashSet::new();
        for (key, _) in order {
            if report.merged.len() >= self.cfg.max_merge {
                break;
            }
            if next.contains(Tier::Common, key) {
                next.remove(Tier::SelfLearned, key);
                touch(&mut touched, Tier::SelfLearned);
                report.discarded.push(key.clone());
                continue;
            }
            let Some(here) = tiers.get(Tier::SelfLearned, variant, key) else {
                continue;
            };
            let there = match tiers.get(Tier::SelfLearned, variant.other(), key) {
                Some(c) => c.to_vec(),
                None => translate(tiers, key, here, variant),
            };
            next.insert(Tier::Common, variant, key, here);
            next.insert(Tier::Common, variant.other(), key, &there);
            touch(&mut touched, Tier::Common);
            for tier in [Tier::SelfLearned, Tier::Rare, Tier::Extended] {
                if next.remove(tier, key) {
                    touch(&mut touched, tier);
                }
            }
            ledger.clear([key.as_str()]);
            report.merged.push(key.clone());
        }

        settle(&mut next);
        self.commit(tiers, next, &touched, ledger, stores)?;
        self.last_merge[variant.index()] = now;
        debug!(
            merged = report.merged.len(),
            discarded = report.discarded.len(),
            remaining = tiers.len(Tier::SelfLearned, variant),
            "batch merge done"
        );
        Ok(report)
    }

    /// Move cold common entries to rare. Only entries with a ledger
    /// counter are candidates; the average is taken over them. A load at
    /// or above the backoff threshold stretches the interval.
    pub fn demote(
        &mut self,
        tiers: &mut TierSnapshot,
        now: u64,
        load: Option<f64>,
        force: bool,
        stores: Stores,
    ) -> Result<DemotionReport, MigrationError> {
        let backoff = load.is_some_and(|l| l >= self.cfg.backoff_load_threshold);
        let interval = if backoff {
            self.cfg
                .demotion_interval_secs
                .saturating_mul(self.cfg.backoff_multiplier)
        } else {
            self.cfg.demotion_interval_secs
        };
        let _span = debug_span!("demotion", force, backoff).entered();
        let mut report = DemotionReport {
            backoff,
            ..DemotionReport::default()
        };
        if !force && now.saturating_sub(self.last_demotion) < interval {
            report.deferred = Some(Deferred::Interval);
            debug!(interval, "demotion deferred");
            return Ok(report);
        }

        let tracked: BTreeSet<&String> = ToneVariant::ALL
            .iter()
            .flat_map(|&v| tiers.map(Tier::Common, v).keys())
            .filter(|k| self.ledger.is_tracked(k))
            .collect();
        if tracked.is_empty() {
            self.last_demotion = now;
            return Ok(report);
        }
        let total = tracked
            .iter()
            .fold(0u64, |acc, k| acc.saturating_add(self.ledger.frequency(k)));
        let average = total as f64 / tracked.len() as f64;
        let cutoff = average * self.cfg.demotion_average_fraction;
        let cold: Vec<String> = tracked
            .into_iter()
            .filter(|k| {
                let f = self.ledger.frequency(k);
                (f as f64) < cutoff && f < self.cfg.demotion_floor
            })
            .cloned()
            .collect();
        if cold.is_empty() {
            self.last_demotion = now;
            debug!(average, "nothing to demote");
            return Ok(report);
        }

        let mut next = tiers.clone();
        let mut ledger = self.ledger.clone();
        for key in &cold {
            for v in ToneVariant::ALL {
                if let Some(c) = tiers.get(Tier::Common, v, key) {
                    next.insert(Tier::Rare, v, key, c);
                }
            }
            next.remove(Tier::Common, key);
            ledger.clear([key.as_str()]);
        }
        let mut touched = HashSet::new();
        touch(&mut touched, Tier::Common);
        touch(&mut touched, Tier::Rare);

        settle(&mut next);
        self.commit(tiers, next, &touched, ledger, stores)?;
        self.last_demotion = now;
        report.demoted = cold;
        debug!(demoted = report.demoted.len(), average, "demotion done");
        Ok(report)
    }

    /// Persist unsaved tiers and the ledger. Returns the number of tier
    /// variants written.
    pub fn flush(&mut self, tiers: &TierSnapshot, stores: Stores) -> Result<usize, MigrationError> {
        if !self.has_unsaved_changes() {
            return Ok(0);
        }
        let _span = debug_span!("flush").entered();
        let written = self.persist(tiers, &HashSet::new(), &self.ledger, stores)?;
        self.dirty.clear();
        self.ledger_dirty = false;
        debug!(written, "flushed");
        Ok(written)
    }

    fn persist(
        &self,
        tiers: &TierSnapshot,
        touched: &HashSet<TierKey>,
        ledger: &FrequencyLedger,
        stores: Stores,
    ) -> Result<usize, MigrationError> {
        let mut targets: Vec<TierKey> = self.dirty.union(touched).copied().collect();
        targets.sort_by_key(|&(t, v)| (t, v.index()));
        for &(tier, variant) in &targets {
            stores.dict.save(tier, variant, tiers.map(tier, variant))?;
        }
        stores.freq.save(&ledger.counts())?;
        Ok(targets.len())
    }

    /// Persist `next`, then make it and `ledger` live. On failure the
    /// snapshot and ledger stay as they were; the touched tiers are marked
    /// dirty since some of their files may already hold `next`.
    fn commit(
        &mut self,
        tiers: &mut TierSnapshot,
        next: TierSnapshot,
        touched: &HashSet<TierKey>,
        ledger: FrequencyLedger,
        stores: Stores,
    ) -> Result<(), MigrationError> {
        if let Err(e) = self.persist(&next, touched, &ledger, stores) {
            self.dirty.extend(touched.iter().copied());
            self.ledger_dirty = true;
            return Err(e);
        }
        *tiers = next;
        self.ledger = ledger;
        self.dirty.clear();
        self.ledger_dirty = false;
        Ok(())
    }
}
