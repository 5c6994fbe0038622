//! Polyphone disambiguation rules.
//!
//! A character with several pronunciations carries an ordered list of
//! rules. Each rule names the pronunciation it implies and the context
//! that implies it. Rules are validated when registered; scoring lives in
//! [`scorer`] so it can be exercised without a resolver.

mod config;
pub mod scorer;

pub use config::{default_rules, parse_polyphone_toml, DEFAULT_POLYPHONES_TOML};
pub use scorer::{score_and_select, Context, ACCEPTANCE_THRESHOLD};

use std::collections::HashMap;

use regex::Regex;

use crate::tone::is_valid_pronunciation;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("rule #{index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("rule for {ch}: unknown kind `{kind}`")]
    UnknownKind { ch: char, kind: String },
    #[error("rule for {ch}: unparseable pronunciation `{pinyin}`")]
    InvalidPronunciation { ch: char, pinyin: String },
    #[error("rule for {ch}: weight must be finite and non-negative, got {weight}")]
    InvalidWeight { ch: char, weight: f64 },
    #[error("rule for {ch}: invalid target `{target}`: {reason}")]
    InvalidTarget {
        ch: char,
        target: String,
        reason: &'static str,
    },
    #[error("rule for {ch}: invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        ch: char,
        pattern: String,
        reason: String,
    },
}

/// What a rule looks at.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Two- or three-character word covering the character.
    Word(String),
    /// Character immediately before.
    Preceding(char),
    /// Character immediately after.
    Following(char),
    /// Regex over the whole surrounding text.
    Pattern(Regex),
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Word(_) => "word",
            RuleKind::Preceding(_) => "preceding",
            RuleKind::Following(_) => "following",
            RuleKind::Pattern(_) => "pattern",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    /// Implied pronunciation, diacritic or plain form.
    pub pronunciation: String,
    pub weight: f64,
}

/// Rules keyed by character, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<char, Vec<Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a rule for `ch`.
    pub fn add(
        &mut self,
        ch: char,
        kind: RuleKind,
        pronunciation: &str,
        weight: f64,
    ) -> Result<(), RuleError> {
        if !is_valid_pronunciation(pronunciation) || pronunciation.contains(' ') {
            return Err(RuleError::InvalidPronunciation {
                ch,
                pinyin: pronunciation.to_string(),
            });
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(RuleError::InvalidWeight { ch, weight });
        }
        if let RuleKind::Word(word) = &kind {
            validate_word(ch, word)?;
        }
        self.rules.entry(ch).or_default().push(Rule {
            kind,
            pronunciation: pronunciation.to_string(),
            weight,
        });
        Ok(())
    }

    /// Parse the textual form used by configuration files and add it.
    pub fn add_parsed(
        &mut self,
        ch: char,
        kind: &str,
        target: &str,
        pronunciation: &str,
        weight: f64,
    ) -> Result<(), RuleError> {
        let kind = parse_kind(ch, kind, target)?;
        self.add(ch, kind, pronunciation, weight)
    }

    pub fn rules_for(&self, ch: char) -> &[Rule] {
        self.rules.get(&ch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_rules(&self, ch: char) -> bool {
        self.rules.contains_key(&ch)
    }

    /// Append every rule of `other` after the existing ones.
    pub fn extend(&mut self, other: RuleSet) {
        for (ch, rules) in other.rules {
            self.rules.entry(ch).or_default().extend(rules);
        }
    }

    /// Total number of rules.
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn single_char(ch: char, target: &str) -> Result<char, RuleError> {
    let mut chars = target.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(RuleError::InvalidTarget {
            ch,
            target: target.to_string(),
            reason: "expected exactly one character",
        }),
    }
}

fn validate_word(ch: char, word: &str) -> Result<(), RuleError> {
    let len = word.chars().count();
    if !(2..=3).contains(&len) {
        return Err(RuleError::InvalidTarget {
            ch,
            target: word.to_string(),
            reason: "word must be two or three characters",
        });
    }
    if !word.contains(ch) {
        return Err(RuleError::InvalidTarget {
            ch,
            target: word.to_string(),
            reason: "word must contain the character",
        });
    }
    Ok(())
}

fn parse_kind(ch: char, kind: &str, target: &str) -> Result<RuleKind, RuleError> {
    match kind {
        "word" => Ok(RuleKind::Word(target.to_string())),
        "preceding" => single_char(ch, target).map(RuleKind::Preceding),
        "following" => single_char(ch, target).map(RuleKind::Following),
        "pattern" => Regex::new(target)
            .map(RuleKind::Pattern)
            .map_err(|e| RuleError::InvalidPattern {
                ch,
                pattern: target.to_string(),
                reason: e.to_string(),
            }),
        other => Err(RuleError::UnknownKind {
            ch,
            kind: other.to_string(),
        }),
    }
}
