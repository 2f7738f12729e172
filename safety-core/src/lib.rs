//! Core domain types for the safety scoring engine.
//!
//! These models provide basic validation to keep downstream
//! components honest. Constructors return `Result` to surface
//! invalid input early, so coordinates, ratings and geocell identifiers
//! that reach the scorer or a store are always in range.
//!
//! The crate also defines the storage seams ([`AreaRecordSource`],
//! [`AreaRecordSink`], [`ScoreCacheStore`], [`HistoryStore`]) and the
//! [`AreaScorer`] trait implemented by the scoring crate.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod area;
pub mod cache;
pub mod clock;
pub mod coordinate;
pub mod geocell;
pub mod history;
pub mod record;
pub mod score;
pub mod scorer;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use area::{AreaData, AreaProvenance, AreaStaticAttributes, StoredAreaAttributes};
pub use cache::{CacheEntry, CacheLookup, CacheWrite};
pub use clock::{ClockError, HOURS_PER_DAY, LocalClock};
pub use coordinate::{Coordinate, CoordinateError};
pub use geocell::{GEOCELL_PRECISION, GeocellId, GeocellParseError};
pub use history::{HistoryBucket, HourlyScore};
pub use record::{
    CommunityReport, IncidentKind, IncidentRecord, NewCommunityReport, NewIncident, Rating,
    RecordError, ReportKind,
};
pub use score::{SafetyLevel, SafetyScore, ScoreBreakdown};
pub use scorer::AreaScorer;
pub use store::{AreaRecordSink, AreaRecordSource, HistoryStore, ScoreCacheStore, StoreError};
