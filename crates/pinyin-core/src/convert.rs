//! Whole-text conversion on top of the resolver.
//!
//! Text is walked left to right: custom words first (longest match, also
//! from inside an ASCII run, so `A股` can be an entry), then one character
//! at a time with its neighbours as context. Runs of passthrough ASCII stay
//! together as one token, whitespace only separates tokens, and everything
//! else follows the special-character policy.

use std::collections::BTreeMap;

use crate::polyphone::Context;
use crate::resolver::{Resolution, Resolver};
use crate::tone::{initial, strip_diacritic, to_numbered};
use crate::unicode::is_hanzi;

/// How pronunciations are written in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToneStyle {
    /// `xíng`
    #[default]
    Mark,
    /// `xing2`
    Number,
    /// `xing`
    None,
}

impl ToneStyle {
    /// Render a diacritic pronunciation. Always applied after selection.
    pub fn apply(self, pronunciation: &str) -> String {
        match self {
            ToneStyle::Mark => pronunciation.to_string(),
            ToneStyle::Number => to_numbered(pronunciation),
            ToneStyle::None => strip_diacritic(pronunciation),
        }
    }
}

/// Policy for characters that are neither Chinese nor passthrough ASCII.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SpecialChars {
    #[default]
    Keep,
    Drop,
    Replace(String),
}

/// Every option that changes the output. Part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConvertOptions {
    pub separator: String,
    pub tone: ToneStyle,
    pub special: SpecialChars,
    /// Evaluate polyphone rules; off means first candidate everywhere.
    pub polyphone: bool,
    /// Per-call entries, above the custom tier. Keys may be words.
    pub overrides: BTreeMap<String, Vec<String>>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            tone: ToneStyle::Mark,
            special: SpecialChars::Keep,
            polyphone: true,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// One syllable in diacritic form.
    Syllable(String),
    /// Passthrough run, unresolved character, or special character.
    Literal(String),
}

/// A resolved key (character or custom word) and how it resolved.
#[derive(Debug, Clone)]
pub struct Observation {
    pub key: String,
    pub resolution: Resolution,
}

#[derive(Debug, Default)]
pub struct Converted {
    pub tokens: Vec<Token>,
    pub observations: Vec<Observation>,
}

impl Converted {
    /// Tokens rendered with the tone style, in order.
    pub fn rendered(&self, tone: ToneStyle) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| match t {
                Token::Syllable(s) => tone.apply(s),
                Token::Literal(s) => s.clone(),
            })
            .collect()
    }

    pub fn join(&self, options: &ConvertOptions) -> String {
        self.rendered(options.tone).join(&options.separator)
    }

    /// First letter of each syllable; literals are kept as they are.
    pub fn initials(&self) -> String {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Syllable(s) => initial(s).map(String::from),
                Token::Literal(s) => Some(s.clone()),
            })
            .collect()
    }

    /// Keys that no tier, rule, or fallback could resolve.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.observations
            .iter()
            .filter(|o| !o.resolution.is_pronunciation())
            .map(|o| o.key.as_str())
    }
}

fn push_syllables(tokens: &mut Vec<Token>, pronunciation: &str) {
    tokens.extend(
        pronunciation
            .split(' ')
            .filter(|s| !s.is_empty())
            .map(|s| Token::Syllable(s.to_string())),
    );
}

fn flush(tokens: &mut Vec<Token>, literal: &mut String) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

/// Convert `text` into tokens. Pure: feedback is left to the caller, who
/// gets every resolution back in `observations`.
pub fn convert_text(resolver: &Resolver, text: &str, options: &ConvertOptions) -> Converted {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Converted::default();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            flush(&mut out.tokens, &mut literal);
            i += 1;
            continue;
        }
        if let Some((len, res)) = resolver.match_word(&chars[i..]) {
            flush(&mut out.tokens, &mut literal);
            push_syllables(&mut out.tokens, &res.pronunciation);
            out.observations.push(Observation {
                key: chars[i..i + len].iter().collect(),
                resolution: res,
            });
            i += len;
            continue;
        }
        if resolver.is_passthrough(c) {
            literal.push(c);
            i += 1;
            continue;
        }
        flush(&mut out.tokens, &mut literal);

        let ctx = Context::in_text(&chars, i, text);
        let res = resolver.resolve(c, Some(&ctx));
        if res.is_pronunciation() {
            push_syllables(&mut out.tokens, &res.pronunciation);
        } else if is_hanzi(c) {
            out.tokens.push(Token::Literal(c.to_string()));
        } else {
            match &options.special {
                SpecialChars::Keep => out.tokens.push(Token::Literal(c.to_string())),
                SpecialChars::Drop => {}
                SpecialChars::Replace(r) if r.is_empty() => {}
                SpecialChars::Replace(r) => out.tokens.push(Token::Literal(r.clone())),
            }
        }
        out.observations.push(Observation {
            key: c.to_string(),
            resolution: res,
        });
        i += 1;
    }
    flush(&mut out.tokens, &mut literal);
    out
}
