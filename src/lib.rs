//! Chinese-to-pinyin conversion with self-learning dictionary tiers.
//!
//! The conversion engine lives in `pinyin_core` and is re-exported here.
//! This crate adds the background [`MigrationWorker`] and optional trace
//! output.

pub mod migration_worker;
pub mod trace_init;

pub use migration_worker::{MigrationRequest, MigrationWorker};
pub use pinyin_core::*;
pub use trace_init::init_tracing;
