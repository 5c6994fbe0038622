//! Context scoring for polyphone rules.

use crate::tone::same_base;

use super::{Rule, RuleKind};

/// Minimum score a rule must reach to override the default candidate.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.5;

const WORD_SCORE: f64 = 1.0;
const PRECEDING_SCORE: f64 = 0.8;
const FOLLOWING_SCORE: f64 = 0.8;
const PATTERN_SCORE: f64 = 0.9;

/// Surroundings of the character being resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'a> {
    pub prev: Option<char>,
    pub next: Option<char>,
    /// Full surrounding text, for pattern rules.
    pub text: Option<&'a str>,
}

impl<'a> Context<'a> {
    pub fn new(prev: Option<char>, next: Option<char>) -> Self {
        Self {
            prev,
            next,
            text: None,
        }
    }

    pub fn with_text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }

    /// Context of `chars[pos]` inside `text`.
    pub fn in_text(chars: &[char], pos: usize, text: &'a str) -> Self {
        Self {
            prev: pos.checked_sub(1).and_then(|i| chars.get(i)).copied(),
            next: chars.get(pos + 1).copied(),
            text: Some(text),
        }
    }
}

/// True when `word` equals a contiguous span of `[prev, ch, next]` that
/// covers `ch`.
fn word_matches(word: &str, ch: char, ctx: &Context) -> bool {
    let window = [ctx.prev, Some(ch), ctx.next];
    let word: Vec<char> = word.chars().collect();
    let len = word.len();
    if len == 0 || len > window.len() {
        return false;
    }
    (0..=window.len() - len)
        .filter(|&start| start <= 1 && 1 < start + len)
        .any(|start| {
            window[start..start + len]
                .iter()
                .zip(&word)
                .all(|(w, c)| *w == Some(*c))
        })
}

/// Score of one rule in context, before the candidate check.
pub fn score(rule: &Rule, ch: char, ctx: &Context) -> f64 {
    let base = match &rule.kind {
        RuleKind::Word(word) if word_matches(word, ch, ctx) => WORD_SCORE,
        RuleKind::Preceding(c) if ctx.prev == Some(*c) => PRECEDING_SCORE,
        RuleKind::Following(c) if ctx.next == Some(*c) => FOLLOWING_SCORE,
        RuleKind::Pattern(re) if ctx.text.is_some_and(|t| re.is_match(t)) => PATTERN_SCORE,
        _ => 0.0,
    };
    base * rule.weight
}

/// The candidate a rule implies: exact match first, then the first
/// candidate with the same base syllable. `None` makes the rule inert.
fn implied_candidate<'c>(rule: &Rule, candidates: &'c [String]) -> Option<&'c String> {
    candidates
        .iter()
        .find(|c| **c == rule.pronunciation)
        .or_else(|| candidates.iter().find(|c| same_base(c, &rule.pronunciation)))
}

/// Pick a pronunciation for `ch` among `candidates` using its rules.
///
/// The highest-scoring rule wins if it reaches [`ACCEPTANCE_THRESHOLD`];
/// among equal scores the earliest declared rule wins. Without context
/// every rule scores zero.
pub fn score_and_select(
    ch: char,
    candidates: &[String],
    rules: &[Rule],
    ctx: Option<&Context>,
) -> Option<String> {
    let ctx = ctx?;
    let mut best: Option<(f64, &String)> = None;
    for rule in rules {
        let Some(candidate) = implied_candidate(rule, candidates) else {
            continue;
        };
        let s = score(rule, ch, ctx);
        if best.map_or(true, |(top, _)| s > top) {
            best = Some((s, candidate));
        }
    }
    best.filter(|(s, _)| *s >= ACCEPTANCE_THRESHOLD)
        .map(|(_, c)| c.clone())
}
