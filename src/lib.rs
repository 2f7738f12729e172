//! Facade crate for the safety scoring engine.
//!
//! This crate re-exports the core domain types and the scorer, and exposes
//! the SQLite backend and the caching service behind feature flags.

#![forbid(unsafe_code)]

pub use safety_core::{
    AreaData, AreaProvenance, AreaRecordSink, AreaRecordSource, AreaScorer, AreaStaticAttributes,
    CommunityReport, Coordinate, CoordinateError, GeocellId, HistoryBucket, HistoryStore,
    HourlyScore, IncidentKind, IncidentRecord, LocalClock, NewCommunityReport, NewIncident,
    Rating, ReportKind, SafetyLevel, SafetyScore, ScoreBreakdown, ScoreCacheStore, StoreError,
    StoredAreaAttributes,
};
pub use safety_scorer::{SafetyScorer, ScoreWeights, ScorerError};

#[cfg(feature = "store-sqlite")]
pub use safety_data::{AreaDataRepository, SqliteSafetyStore, SqliteStoreError};

#[cfg(feature = "service")]
pub use safety_service::{EngineConfig, EngineError, HistoryMode, ScoreEngine};
