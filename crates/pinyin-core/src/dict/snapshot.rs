use std::sync::Arc;

use super::{normalize_candidates, untoned_candidates, Tier, TierMap, ToneVariant};

/// Tier pairs that must never share a key as a terminal state, with the
/// tier that wins when healing. A self-learned entry next to a rare or
/// extended one is the normal pending state and is not listed.
const EXCLUSIVE: [(Tier, Tier); 4] = [
    (Tier::Common, Tier::Rare),
    (Tier::Common, Tier::Extended),
    (Tier::Common, Tier::SelfLearned),
    (Tier::Rare, Tier::Extended),
];

/// A key found in two mutually exclusive tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub key: String,
    pub variant: ToneVariant,
    pub kept: Tier,
    pub dropped: Tier,
}

/// Immutable-until-migration view of every tier in both tone variants.
///
/// Cloning is cheap (one `Arc` per tier map). Mutation goes through
/// `Arc::make_mut`, so readers holding the previous snapshot keep seeing
/// it unchanged until the new one is swapped in.
#[derive(Clone, Default)]
pub struct TierSnapshot {
    maps: [[Arc<TierMap>; 2]; 5],
    /// Character count of the longest custom key, kept in step with every
    /// custom tier write.
    custom_key_len: usize,
}

impl TierSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, tier: Tier, variant: ToneVariant) -> &TierMap {
        &self.maps[tier.index()][variant.index()]
    }

    fn map_mut(&mut self, tier: Tier, variant: ToneVariant) -> &mut TierMap {
        Arc::make_mut(&mut self.maps[tier.index()][variant.index()])
    }

    fn refresh(&mut self, tier: Tier) {
        if tier != Tier::Custom {
            return;
        }
        self.custom_key_len = ToneVariant::ALL
            .iter()
            .flat_map(|&v| self.map(Tier::Custom, v).keys())
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(0);
    }

    /// Longest custom key in characters; 0 when the custom tier is empty.
    pub fn longest_custom_key(&self) -> usize {
        self.custom_key_len
    }

    pub fn get(&self, tier: Tier, variant: ToneVariant, key: &str) -> Option<&[String]> {
        self.map(tier, variant).get(key).map(Vec::as_slice)
    }

    /// Entry for `key` in `tier`, toned variant first.
    pub fn lookup(&self, tier: Tier, key: &str) -> Option<(&[String], ToneVariant)> {
        ToneVariant::ALL
            .iter()
            .find_map(|&v| self.get(tier, v, key).map(|c| (c, v)))
    }

    pub fn contains(&self, tier: Tier, key: &str) -> bool {
        self.lookup(tier, key).is_some()
    }

    pub fn len(&self, tier: Tier, variant: ToneVariant) -> usize {
        self.map(tier, variant).len()
    }

    /// Tiers holding `key` in either variant, in priority order.
    pub fn tiers_of(&self, key: &str) -> Vec<Tier> {
        Tier::ALL
            .iter()
            .copied()
            .filter(|&t| self.contains(t, key))
            .collect()
    }

    /// Insert into one variant. An empty candidate list removes the key
    /// instead, so no entry ever exists with zero pronunciations.
    pub fn insert<S: AsRef<str>>(
        &mut self,
        tier: Tier,
        variant: ToneVariant,
        key: &str,
        candidates: &[S],
    ) -> bool {
        let candidates = normalize_candidates(candidates);
        let inserted = if candidates.is_empty() {
            self.map_mut(tier, variant).remove(key);
            false
        } else {
            self.map_mut(tier, variant)
                .insert(key.to_string(), candidates);
            true
        };
        self.refresh(tier);
        inserted
    }

    /// Insert diacritic candidates and their stripped counterparts.
    pub fn insert_both<S: AsRef<str>>(&mut self, tier: Tier, key: &str, toned: &[S]) -> bool {
        let toned = normalize_candidates(toned);
        let untoned = untoned_candidates(&toned);
        self.insert(tier, ToneVariant::Untoned, key, &untoned);
        self.insert(tier, ToneVariant::Toned, key, &toned)
    }

    /// Remove `key` from both variants of `tier`.
    pub fn remove(&mut self, tier: Tier, key: &str) -> bool {
        let mut removed = false;
        for v in ToneVariant::ALL {
            if self.map(tier, v).contains_key(key) {
                self.map_mut(tier, v).remove(key);
                removed = true;
            }
        }
        if removed {
            self.refresh(tier);
        }
        removed
    }

    /// Replace a whole tier variant, normalizing every entry.
    pub fn replace(&mut self, tier: Tier, variant: ToneVariant, map: TierMap) {
        let normalized: TierMap = map
            .into_iter()
            .filter_map(|(k, v)| {
                let v = normalize_candidates(&v);
                (!k.is_empty() && !v.is_empty()).then_some((k, v))
            })
            .collect();
        self.maps[tier.index()][variant.index()] = Arc::new(normalized);
        self.refresh(tier);
    }

    /// Fill the untoned variant of `tier` from the toned one when empty.
    pub fn derive_untoned(&mut self, tier: Tier) {
        if !self.map(tier, ToneVariant::Untoned).is_empty() {
            return;
        }
        let derived: TierMap = self
            .map(tier, ToneVariant::Toned)
            .iter()
            .map(|(k, v)| (k.clone(), untoned_candidates(v)))
            .collect();
        self.maps[tier.index()][ToneVariant::Untoned.index()] = Arc::new(derived);
        self.refresh(tier);
    }

    /// Keys present in two mutually exclusive tiers, sorted for stable output.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut out = Vec::new();
        for variant in ToneVariant::ALL {
            for (kept, dropped) in EXCLUSIVE {
                let (small, large) = {
                    let a = self.map(kept, variant);
                    let b = self.map(dropped, variant);
                    if a.len() <= b.len() {
                        (a, b)
                    } else {
                        (b, a)
                    }
                };
                for key in small.keys().filter(|k| large.contains_key(*k)) {
                    out.push(Conflict {
                        key: key.clone(),
                        variant,
                        kept,
                        dropped,
                    });
                }
            }
        }
        out.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then(a.dropped.cmp(&b.dropped))
                .then(a.variant.index().cmp(&b.variant.index()))
        });
        out
    }

    /// Resolve every conflict by dropping the lower-priority entry.
    /// Returns what was dropped.
    pub fn heal(&mut self) -> Vec<Conflict> {
        let conflicts = self.conflicts();
        for c in &conflicts {
            self.map_mut(c.dropped, c.variant).remove(&c.key);
        }
        for tier in Tier::ALL {
            self.refresh(tier);
        }
        conflicts
    }
}
