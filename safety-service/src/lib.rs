//! Serving layer for the safety scoring engine.
//!
//! Responsibilities:
//! - Serve scores cache-first, keyed by geocell and local hour
//!   ([`ScoreCache`]).
//! - Fold computed scores into per-day history ([`HistoryAggregator`]).
//! - Persist new records and invalidate their cells ([`ScoreEngine`]).
//!
//! Boundaries:
//! - Storage is reached only through the traits in `safety-core`; the SQLite
//!   backend lives in `safety-data`.
//! - Scoring rules live in `safety-scorer`.
//!
//! Invariants:
//! - A write-back computed before an invalidation is never stored after it.
//! - Fallback scores are neither cached nor recorded.

#![forbid(unsafe_code)]

mod cache;
mod config;
mod engine;
mod error;
mod history;

pub use cache::{CacheProbe, ScoreCache};
pub use config::{ConfigError, EngineConfig, HistoryMode, MAX_CACHE_TTL_SECS, MAX_WINDOW_DAYS};
pub use engine::{ScoreEngine, ScoreEngineBuilder};
pub use error::EngineError;
pub use history::HistoryAggregator;
