//! Character resolution engine for Chinese-to-pinyin conversion.
//!
//! Tiered dictionaries, context-scored polyphone disambiguation, a bounded
//! result cache, and a frequency-driven feedback loop that migrates
//! characters between tiers.

pub mod cache;
pub mod convert;
pub mod dict;
pub mod engine;
pub mod learning;
pub mod ledger;
pub mod polyphone;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod tone;
pub mod unicode;

pub use engine::{Engine, EngineBuilder, EngineError};
