//! Data access traits for records, cached scores and history.
//!
//! The engine never talks to a database directly. Each concern is a separate
//! async trait so deployments can back them with different systems, and
//! tests can replace any one of them. Implementations must be `Send + Sync`
//! because the engine shares them as `Arc<dyn …>` across tasks.

use std::error::Error;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    CacheEntry, CacheLookup, CacheWrite, CommunityReport, GeocellId, HistoryBucket, HourlyScore,
    IncidentRecord, NewCommunityReport, NewIncident, StoredAreaAttributes,
};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed an operation.
    #[error("store operation {operation} failed")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A lock guarding the backend was poisoned by a panic.
    #[error("store lock poisoned during {operation}")]
    Poisoned {
        /// Operation that observed the poisoned lock.
        operation: &'static str,
    },
    /// A persisted value could not be decoded.
    #[error("stored {entity} is corrupt: {reason}")]
    Corrupt {
        /// Kind of value that failed to decode.
        entity: &'static str,
        /// Decoding failure.
        reason: String,
    },
    /// The backend is unreachable.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the backend could not be reached.
        reason: String,
    },
}

impl StoreError {
    /// Wrap a backend error for `operation`.
    pub fn backend(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Read access to the raw records behind a geocell.
///
/// Windows are inclusive of `since`. Results are newest first and hold at
/// most `limit` items.
#[async_trait]
pub trait AreaRecordSource: Send + Sync {
    /// Incidents in `geocell` with `occurred_at >= since`.
    async fn recent_incidents(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<IncidentRecord>, StoreError>;

    /// Community reports in `geocell` with `occurred_at >= since`.
    async fn recent_reports(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommunityReport>, StoreError>;

    /// Static attributes for `geocell`, if a row exists.
    async fn area_attributes(
        &self,
        geocell: &GeocellId,
    ) -> Result<Option<StoredAreaAttributes>, StoreError>;
}

/// Write access for records and static attributes.
#[async_trait]
pub trait AreaRecordSink: Send + Sync {
    /// Persist an incident tagged with `geocell` and return it with its id.
    async fn insert_incident(
        &self,
        geocell: &GeocellId,
        incident: NewIncident,
    ) -> Result<IncidentRecord, StoreError>;

    /// Persist a community report tagged with `geocell`.
    async fn insert_report(
        &self,
        geocell: &GeocellId,
        report: NewCommunityReport,
    ) -> Result<CommunityReport, StoreError>;

    /// Update the verification flag of an incident.
    ///
    /// Returns the incident's geocell, or `None` if no incident has `id`.
    async fn set_incident_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<GeocellId>, StoreError>;

    /// Replace the static attributes of `geocell`.
    async fn upsert_area_attributes(
        &self,
        geocell: &GeocellId,
        attributes: StoredAreaAttributes,
    ) -> Result<(), StoreError>;
}

/// Persistence for cached scores.
///
/// Each geocell has an epoch counter starting at zero. [`invalidate`]
/// removes every hour of the cell and bumps the epoch in one atomic step;
/// [`store`] must refuse a write whose `epoch` differs from the current one.
///
/// [`invalidate`]: ScoreCacheStore::invalidate
/// [`store`]: ScoreCacheStore::store
#[async_trait]
pub trait ScoreCacheStore: Send + Sync {
    /// Read the entry for `(geocell, hour)` with the cell's current epoch.
    ///
    /// Expired entries are returned as-is; freshness is the caller's call.
    async fn lookup(&self, geocell: &GeocellId, hour: u8) -> Result<CacheLookup, StoreError>;

    /// Write `entry` if its epoch still matches the cell's.
    async fn store(&self, entry: CacheEntry) -> Result<CacheWrite, StoreError>;

    /// Drop all entries for `geocell` and return the new epoch.
    async fn invalidate(&self, geocell: &GeocellId) -> Result<u64, StoreError>;
}

/// Persistence for per-day score history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Merge `entry` into the bucket for `(geocell, date)`, creating it if
    /// needed, and return the updated bucket.
    ///
    /// The read-modify-write must be atomic with respect to other calls for
    /// the same key.
    async fn record(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
        entry: HourlyScore,
    ) -> Result<HistoryBucket, StoreError>;

    /// Bucket for `(geocell, date)`, if one exists.
    async fn bucket(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
    ) -> Result<Option<HistoryBucket>, StoreError>;

    /// Buckets for `geocell` with `from <= date <= to`, ordered by date.
    async fn buckets_between(
        &self,
        geocell: &GeocellId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryBucket>, StoreError>;
}
