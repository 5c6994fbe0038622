//! Tiered pronunciation dictionaries.
//!
//! Each tier maps a character (or, in the custom tier, a short word) to an
//! ordered, deduplicated list of candidate pronunciations. Every tier exists
//! in two tone variants kept side by side: diacritic and stripped.

mod builtin;
mod snapshot;
#[cfg(test)]
mod tests;

pub use builtin::builtin_fallback;
pub use snapshot::{Conflict, TierSnapshot};

use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};

/// Key → candidate pronunciations, first candidate is the default.
pub type TierMap = HashMap<String, Vec<String>>;

/// Unified error type for tier and ledger snapshot I/O.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected PYTD or PYFQ)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Named dictionary partition. Declaration order is lookup priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// User overrides; bypass disambiguation.
    Custom,
    Common,
    Rare,
    /// Supplementary authoritative source (Unihan).
    Extended,
    /// Holding area for characters seen outside common, pending promotion.
    SelfLearned,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Custom,
        Tier::Common,
        Tier::Rare,
        Tier::Extended,
        Tier::SelfLearned,
    ];

    /// Tiers consulted after the custom tier, in order.
    pub const LOOKUP: [Tier; 4] = [Tier::Common, Tier::Rare, Tier::Extended, Tier::SelfLearned];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Custom => "custom",
            Tier::Common => "common",
            Tier::Rare => "rare",
            Tier::Extended => "extended",
            Tier::SelfLearned => "self_learned",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToneVariant {
    Toned,
    Untoned,
}

impl ToneVariant {
    pub const ALL: [ToneVariant; 2] = [ToneVariant::Toned, ToneVariant::Untoned];

    pub fn other(self) -> Self {
        match self {
            ToneVariant::Toned => ToneVariant::Untoned,
            ToneVariant::Untoned => ToneVariant::Toned,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ToneVariant::Toned => "toned",
            ToneVariant::Untoned => "untoned",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Trim, drop empties, and deduplicate candidates keeping first occurrence.
pub fn normalize_candidates<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for c in candidates {
        let c = c.as_ref().trim();
        if !c.is_empty() && !out.iter().any(|existing| existing == c) {
            out.push(c.to_string());
        }
    }
    out
}

/// Candidates from outside input (overrides, custom entries): numbered
/// readings become diacritic, invalid pronunciations are dropped, and the
/// rest is normalized.
pub fn clean_candidates<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let converted = candidates
        .into_iter()
        .map(|c| crate::tone::to_diacritic(c.as_ref()))
        .filter(|c| crate::tone::is_valid_pronunciation(c));
    normalize_candidates(converted)
}

/// Stripped-form candidates for the untoned variant, deduplicated
/// (`xíng`/`xìng` collapse to one `xing`).
pub fn untoned_candidates(toned: &[String]) -> Vec<String> {
    normalize_candidates(toned.iter().map(|c| crate::tone::strip_diacritic(c)))
}
