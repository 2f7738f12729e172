//! Aggregates the records behind a geocell into an [`AreaData`] snapshot.
//!
//! The repository fans out three reads (incidents, community reports and
//! static attributes) concurrently under a single timeout. Callers that need
//! a score regardless of backend health use [`AreaDataRepository::fetch`],
//! which degrades to [`AreaData::fallback`] and logs the cause.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use safety_core::{
    AreaData, AreaProvenance, AreaRecordSource, Coordinate, GEOCELL_PRECISION, GeocellId,
    StoreError, geocell,
};
use thiserror::Error;

/// Tuning knobs for [`AreaDataRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Geohash precision used to derive the cell of a coordinate.
    pub geocell_precision: usize,
    /// Incidents older than this many days are ignored.
    pub incident_window_days: i64,
    /// Most incidents kept per snapshot.
    pub incident_limit: usize,
    /// Community reports older than this many days are ignored.
    pub report_window_days: i64,
    /// Most community reports kept per snapshot.
    pub report_limit: usize,
    /// Upper bound on the whole fan-out.
    pub timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            geocell_precision: GEOCELL_PRECISION,
            incident_window_days: 180,
            incident_limit: 100,
            report_window_days: 30,
            report_limit: 50,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Errors raised by [`AreaDataRepository::try_fetch`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// One of the underlying store reads failed.
    #[error("failed to load {query} for the area")]
    Store {
        /// Read that failed.
        query: &'static str,
        /// Error reported by the store.
        #[source]
        source: StoreError,
    },
    /// A look-back window reaches past the representable time range.
    #[error("{field} of {days} days cannot be applied to {now}")]
    WindowOutOfRange {
        /// Name of the offending window.
        field: &'static str,
        /// Configured window.
        days: i64,
        /// Instant the window was measured back from.
        now: DateTime<Utc>,
    },
    /// The reads did not complete within the configured timeout.
    #[error("area data for {geocell} not loaded within {timeout:?}")]
    Timeout {
        /// Cell whose data was requested.
        geocell: GeocellId,
        /// Configured bound.
        timeout: Duration,
    },
}

fn window_start(
    now: DateTime<Utc>,
    field: &'static str,
    days: i64,
) -> Result<DateTime<Utc>, RepositoryError> {
    chrono::Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(RepositoryError::WindowOutOfRange { field, days, now })
}

fn store_error(query: &'static str) -> impl FnOnce(StoreError) -> RepositoryError {
    move |source| RepositoryError::Store { query, source }
}

/// Read-only aggregation of area records.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use chrono::Utc;
/// use safety_core::{Coordinate, test_support::MemorySafetyStore};
/// use safety_data::{AreaDataRepository, RepositoryConfig};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = Arc::new(MemorySafetyStore::default());
/// let repository = AreaDataRepository::new(store, RepositoryConfig::default());
/// let point = Coordinate::new(40.7128, -74.006).expect("valid coordinate");
/// let area = repository.fetch(point, Utc::now()).await;
/// assert!(area.incidents.is_empty());
/// assert!(!area.is_fallback());
/// # });
/// ```
#[derive(Clone)]
pub struct AreaDataRepository {
    source: Arc<dyn AreaRecordSource>,
    config: RepositoryConfig,
}

impl std::fmt::Debug for AreaDataRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AreaDataRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AreaDataRepository {
    /// Build a repository reading from `source`.
    pub fn new(source: Arc<dyn AreaRecordSource>, config: RepositoryConfig) -> Self {
        Self { source, config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Cell a coordinate aggregates into.
    #[must_use]
    pub fn geocell_for(&self, location: Coordinate) -> GeocellId {
        geocell::encode(location, self.config.geocell_precision)
    }

    /// Load the snapshot for `location`, surfacing store failures.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Store`] when a read fails,
    /// [`RepositoryError::Timeout`] when the reads exceed the configured
    /// bound and [`RepositoryError::WindowOutOfRange`] when a window cannot
    /// be subtracted from `now`.
    pub async fn try_fetch(
        &self,
        location: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<AreaData, RepositoryError> {
        let cell = self.geocell_for(location);
        let incident_since = window_start(
            now,
            "incident_window_days",
            self.config.incident_window_days,
        )?;
        let report_since =
            window_start(now, "report_window_days", self.config.report_window_days)?;

        let reads = async {
            tokio::join!(
                self.source
                    .recent_incidents(&cell, incident_since, self.config.incident_limit),
                self.source
                    .recent_reports(&cell, report_since, self.config.report_limit),
                self.source.area_attributes(&cell),
            )
        };
        let (incidents, reports, attributes) = tokio::time::timeout(self.config.timeout, reads)
            .await
            .map_err(|_| RepositoryError::Timeout {
                geocell: cell.clone(),
                timeout: self.config.timeout,
            })?;

        let mut incidents: Vec<_> = incidents
            .map_err(store_error("incidents"))?
            .into_iter()
            .filter(|incident| incident.occurred_at >= incident_since)
            .collect();
        incidents.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        incidents.truncate(self.config.incident_limit);

        let mut reports: Vec<_> = reports
            .map_err(store_error("community reports"))?
            .into_iter()
            .filter(|report| report.occurred_at >= report_since)
            .collect();
        reports.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        reports.truncate(self.config.report_limit);

        let stored = attributes.map_err(store_error("area attributes"))?;
        let last_updated = stored.and_then(|row| row.updated_at).unwrap_or(now);
        let attributes = stored.unwrap_or_default().resolve();

        debug!(
            "loaded {} incidents and {} reports for {cell}",
            incidents.len(),
            reports.len()
        );
        Ok(AreaData {
            geocell: cell,
            location,
            incidents,
            reports,
            attributes,
            last_updated,
            provenance: AreaProvenance::Store,
        })
    }

    /// Load the snapshot for `location`, degrading to defaults on failure.
    pub async fn fetch(&self, location: Coordinate, now: DateTime<Utc>) -> AreaData {
        match self.try_fetch(location, now).await {
            Ok(area) => area,
            Err(err) => {
                warn!("area data unavailable, using defaults: {err}");
                AreaData::fallback(self.geocell_for(location), location, now)
            }
        }
    }
}
