//! Engine error types.
#![forbid(unsafe_code)]

use safety_core::{CoordinateError, GeocellId, RecordError, StoreError};
use safety_scorer::ScorerError;
use thiserror::Error;

use crate::ConfigError;

/// Errors surfaced by [`ScoreEngine`](crate::ScoreEngine).
///
/// Scoring itself never fails once a coordinate is valid; these errors come
/// from input validation, ingestion and construction.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A raw coordinate was rejected before any I/O.
    #[error("invalid coordinate")]
    Validation {
        /// Validation failure.
        #[source]
        source: CoordinateError,
    },
    /// A record was rejected before it reached the store.
    #[error("invalid record")]
    InvalidRecord {
        /// Validation failure.
        #[source]
        source: RecordError,
    },
    /// Writing or reading through a store failed.
    #[error("store operation {operation} failed")]
    Persistence {
        /// Operation that failed.
        operation: &'static str,
        /// Error reported by the store.
        #[source]
        source: StoreError,
    },
    /// Cached scores for a cell could not be invalidated.
    #[error("failed to invalidate cached scores for {geocell}")]
    Invalidation {
        /// Cell whose scores may be stale.
        geocell: GeocellId,
        /// Error reported by the cache store.
        #[source]
        source: StoreError,
    },
    /// The engine configuration was rejected.
    #[error("invalid engine configuration")]
    Configuration {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// The scorer weights were rejected.
    #[error("invalid scorer weights")]
    Weights {
        /// Validation failure.
        #[source]
        source: ScorerError,
    },
    /// The builder was missing a required component.
    #[error("score engine requires a {component}")]
    MissingComponent {
        /// Name of the missing component.
        component: &'static str,
    },
}

impl EngineError {
    pub(crate) fn persistence(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Persistence { operation, source }
    }
}
