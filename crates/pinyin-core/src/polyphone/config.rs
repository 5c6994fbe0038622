use std::sync::OnceLock;

use serde::Deserialize;

use super::{RuleError, RuleSet};

pub const DEFAULT_POLYPHONES_TOML: &str = include_str!("default_polyphones.toml");

#[derive(Deserialize)]
struct PolyphoneConfig {
    #[serde(default)]
    rules: Vec<RawRule>,
}

/// Every field is optional at the serde level so that a missing field
/// surfaces as `RuleError::MissingField` with the rule's position.
#[derive(Deserialize)]
struct RawRule {
    #[serde(rename = "char")]
    ch: Option<String>,
    kind: Option<String>,
    target: Option<String>,
    pinyin: Option<String>,
    weight: Option<f64>,
}

/// Parse `[[rules]]` tables into a validated rule set. One bad rule
/// rejects the whole file.
pub fn parse_polyphone_toml(toml_str: &str) -> Result<RuleSet, RuleError> {
    let config: PolyphoneConfig =
        toml::from_str(toml_str).map_err(|e| RuleError::Parse(e.to_string()))?;

    let mut set = RuleSet::new();
    for (index, raw) in config.rules.into_iter().enumerate() {
        let missing = |field| RuleError::MissingField { index, field };
        let ch_str = raw.ch.ok_or_else(|| missing("char"))?;
        let kind = raw.kind.ok_or_else(|| missing("kind"))?;
        let target = raw.target.ok_or_else(|| missing("target"))?;
        let pinyin = raw.pinyin.ok_or_else(|| missing("pinyin"))?;

        let mut chars = ch_str.chars();
        let ch = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(missing("char")),
        };
        set.add_parsed(ch, &kind, &target, &pinyin, raw.weight.unwrap_or(1.0))?;
    }
    Ok(set)
}

/// The embedded default rule set.
pub fn default_rules() -> &'static RuleSet {
    static INSTANCE: OnceLock<RuleSet> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        parse_polyphone_toml(DEFAULT_POLYPHONES_TOML).expect("default polyphone TOML must be valid")
    })
}
