//! Tuning for the result cache, the learning tiers and the resolver.
//!
//! The defaults in `default_settings.toml` cover cache capacity and TTL,
//! promotion and merge thresholds, demotion cadence and backoff, and the
//! ASCII punctuation that passes through unchanged. A host can replace them
//! once per process with [`init_custom`]; every value is range-checked
//! before it is accepted. Engines take an owned clone through the builder,
//! so tests and embedders may run engines with different thresholds side
//! by side.

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Replace the embedded defaults. Has no effect once [`settings`] has been
/// read; fails if the TOML is invalid or a custom TOML was already set.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Process-wide settings, parsed on first use.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cache: CacheSettings,
    pub learning: LearningSettings,
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub capacity: usize,
    /// Entries older than this are dropped by `sweep_expired`. 0 disables expiry.
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningSettings {
    /// Self-learned frequency at which a character jumps straight to common.
    pub immediate_threshold: u64,
    /// Self-learned size that makes a scheduled batch merge eligible.
    pub merge_threshold: usize,
    pub merge_interval_secs: u64,
    /// Upper bound on entries moved per batch merge.
    pub max_merge: usize,
    pub demotion_interval_secs: u64,
    /// Demote when frequency < average × fraction (and below the floor).
    pub demotion_average_fraction: f64,
    pub demotion_floor: u64,
    /// Load at or above which the demotion interval is stretched.
    pub backoff_load_threshold: f64,
    pub backoff_multiplier: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    /// ASCII punctuation returned unchanged alongside letters and digits.
    pub passthrough_punctuation: String,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_fraction {
        ($section:ident . $field:ident) => {
            if !(0.0..=1.0).contains(&s.$section.$field) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be within 0.0..=1.0".to_string(),
                });
            }
        };
    }

    check_positive!(cache.capacity);

    check_positive!(learning.immediate_threshold);
    check_positive!(learning.merge_threshold);
    check_positive!(learning.max_merge);
    check_positive!(learning.backoff_multiplier);
    check_fraction!(learning.demotion_average_fraction);
    if !(s.learning.backoff_load_threshold >= 0.0) {
        return Err(SettingsError::InvalidValue {
            field: "learning.backoff_load_threshold".to_string(),
            reason: "must be non-negative".to_string(),
        });
    }

    if let Some(c) = s
        .resolver
        .passthrough_punctuation
        .chars()
        .find(|c| !c.is_ascii_punctuation())
    {
        return Err(SettingsError::InvalidValue {
            field: "resolver.passthrough_punctuation".to_string(),
            reason: format!("{c:?} is not ASCII punctuation"),
        });
    }

    Ok(())
}
