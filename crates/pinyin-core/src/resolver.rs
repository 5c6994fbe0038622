//! Per-character pronunciation lookup.
//!
//! Lookup order, first hit wins:
//! 1. ASCII letters/digits and allowed punctuation pass through unchanged
//! 2. per-call overrides, then the custom tier (no disambiguation)
//! 3. polyphone rules over the candidates of the first tier holding the key
//! 4. common, rare, extended, self-learned tiers (first candidate)
//! 5. built-in fallback
//! 6. unresolved: the character itself

use std::collections::BTreeMap;

use tracing::debug;

use crate::dict::{builtin_fallback, clean_candidates, Tier, TierSnapshot};
use crate::polyphone::{score_and_select, Context, RuleSet};
use crate::settings::settings;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Passthrough,
    Override,
    Custom,
    /// A rule chose among the candidates of this tier.
    Polyphone(Tier),
    /// Default candidate of this tier.
    Tier(Tier),
    Builtin,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Chosen pronunciation in diacritic form, or the input itself for
    /// passthrough and unresolved characters.
    pub pronunciation: String,
    /// Full candidate set of the entry that answered.
    pub candidates: Vec<String>,
    pub source: Source,
}

impl Resolution {
    fn literal(ch: char, source: Source) -> Self {
        Self {
            pronunciation: ch.to_string(),
            candidates: Vec::new(),
            source,
        }
    }

    /// False for passthrough and unresolved characters.
    pub fn is_pronunciation(&self) -> bool {
        !matches!(self.source, Source::Passthrough | Source::Unresolved)
    }

    /// Dictionary tier that supplied the candidates, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self.source {
            Source::Custom => Some(Tier::Custom),
            Source::Polyphone(t) | Source::Tier(t) => Some(t),
            _ => None,
        }
    }
}

/// Read-only resolver over one tier snapshot.
pub struct Resolver<'a> {
    tiers: &'a TierSnapshot,
    rules: &'a RuleSet,
    /// Cleaned per-call entries; keys with no valid candidate are gone.
    overrides: BTreeMap<String, Vec<String>>,
    passthrough_punctuation: &'a str,
    polyphone: bool,
    max_word_len: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(tiers: &'a TierSnapshot, rules: &'a RuleSet) -> Self {
        Self {
            tiers,
            rules,
            overrides: BTreeMap::new(),
            passthrough_punctuation: &settings().resolver.passthrough_punctuation,
            polyphone: true,
            max_word_len: tiers.longest_custom_key().max(1),
        }
    }

    /// Per-call entries that take priority over the custom tier.
    ///
    /// Candidates are cleaned like custom entries: numbered readings become
    /// diacritic, invalid ones are dropped. A key left without candidates
    /// falls through to the tiers.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        self.overrides = overrides
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .filter_map(|(k, v)| {
                let cleaned = clean_candidates(v);
                (!cleaned.is_empty()).then(|| (k.clone(), cleaned))
            })
            .collect();
        let longest = self
            .overrides
            .keys()
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(1);
        self.max_word_len = self.max_word_len.max(longest);
        self
    }

    pub fn with_passthrough(mut self, punctuation: &'a str) -> Self {
        self.passthrough_punctuation = punctuation;
        self
    }

    /// Disable rule evaluation; tiers then answer with their first candidate.
    pub fn with_polyphone(mut self, enabled: bool) -> Self {
        self.polyphone = enabled;
        self
    }

    pub fn is_passthrough(&self, ch: char) -> bool {
        crate::unicode::is_passthrough(ch, self.passthrough_punctuation)
    }

    fn user_entry(&self, key: &str) -> Option<(Vec<String>, Source)> {
        if let Some(c) = self.overrides.get(key) {
            return Some((c.clone(), Source::Override));
        }
        self.tiers
            .lookup(Tier::Custom, key)
            .map(|(c, _)| (c.to_vec(), Source::Custom))
    }

    /// Longest override or custom word (two characters or more) starting at
    /// `chars[0]`. Returns its length in characters and its resolution.
    pub fn match_word(&self, chars: &[char]) -> Option<(usize, Resolution)> {
        let upper = self.max_word_len.min(chars.len());
        (2..=upper).rev().find_map(|len| {
            let key: String = chars[..len].iter().collect();
            self.user_entry(&key).map(|(candidates, source)| {
                (
                    len,
                    Resolution {
                        pronunciation: candidates[0].clone(),
                        candidates,
                        source,
                    },
                )
            })
        })
    }

    /// Resolve one character. `ctx` is optional; without it, rules that
    /// need context simply score zero.
    pub fn resolve(&self, ch: char, ctx: Option<&Context>) -> Resolution {
        if self.is_passthrough(ch) {
            return Resolution::literal(ch, Source::Passthrough);
        }

        let mut buf = [0u8; 4];
        let key: &str = ch.encode_utf8(&mut buf);

        if let Some((candidates, source)) = self.user_entry(key) {
            return Resolution {
                pronunciation: candidates[0].clone(),
                candidates,
                source,
            };
        }

        if let Some((tier, candidates)) = Tier::LOOKUP
            .iter()
            .find_map(|&t| self.tiers.lookup(t, key).map(|(c, _)| (t, c)))
        {
            if self.polyphone && candidates.len() >= 2 && self.rules.has_rules(ch) {
                if let Some(chosen) =
                    score_and_select(ch, candidates, self.rules.rules_for(ch), ctx)
                {
                    debug!(%ch, %chosen, tier = tier.name(), "polyphone rule applied");
                    return Resolution {
                        pronunciation: chosen,
                        candidates: candidates.to_vec(),
                        source: Source::Polyphone(tier),
                    };
                }
            }
            return Resolution {
                pronunciation: candidates[0].clone(),
                candidates: candidates.to_vec(),
                source: Source::Tier(tier),
            };
        }

        if let Some(p) = builtin_fallback(ch) {
            return Resolution {
                pronunciation: p.to_string(),
                candidates: vec![p.to_string()],
                source: Source::Builtin,
            };
        }

        Resolution::literal(ch, Source::Unresolved)
    }
}
