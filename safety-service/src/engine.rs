//! The score engine: cache-first scoring plus ingestion hooks.
#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, warn};
use safety_core::{
    AreaRecordSink, AreaRecordSource, AreaScorer, CommunityReport, Coordinate, GeocellId,
    HistoryBucket, HistoryStore, IncidentRecord, LocalClock, NewCommunityReport, NewIncident,
    SafetyScore, ScoreCacheStore, StoredAreaAttributes,
};
use safety_data::AreaDataRepository;
use safety_scorer::{SafetyScorer, ScoreWeights};

use crate::{CacheProbe, EngineConfig, EngineError, HistoryAggregator, ScoreCache};

/// Serves cached safety scores and keeps them consistent with new records.
///
/// A scoring request consults the [`ScoreCache`] for the cell and local hour;
/// on a miss it loads the area through the [`AreaDataRepository`], scores it,
/// writes the entry back under the epoch seen by the lookup and hands the
/// score to the [`HistoryAggregator`]. Ingestion persists a record and then
/// invalidates its cell before returning.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use chrono::{TimeZone, Utc};
/// use safety_core::test_support::MemorySafetyStore;
/// use safety_service::{EngineConfig, ScoreEngine};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let engine = ScoreEngine::with_store(
///     Arc::new(MemorySafetyStore::default()),
///     EngineConfig::default(),
/// )
/// .expect("valid configuration");
/// let afternoon = Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap();
/// let score = engine
///     .score_at(40.7128, -74.006, afternoon)
///     .await
///     .expect("valid coordinate");
/// assert_eq!(score.overall, 89);
/// # });
/// ```
#[derive(Clone)]
pub struct ScoreEngine {
    repository: AreaDataRepository,
    scorer: Arc<dyn AreaScorer>,
    cache: ScoreCache,
    history: HistoryAggregator,
    sink: Arc<dyn AreaRecordSink>,
    clock: LocalClock,
    config: EngineConfig,
}

impl std::fmt::Debug for ScoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreEngine")
            .field("repository", &self.repository)
            .field("cache", &self.cache)
            .field("history", &self.history)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScoreEngine {
    /// Build an engine over one store implementing every store trait.
    ///
    /// # Errors
    /// Returns [`EngineError::Configuration`] when `config` is invalid.
    pub fn with_store<S>(store: Arc<S>, config: EngineConfig) -> Result<Self, EngineError>
    where
        S: AreaRecordSource + AreaRecordSink + ScoreCacheStore + HistoryStore + 'static,
    {
        ScoreEngineBuilder::new()
            .config(config)
            .record_source(store.clone())
            .record_sink(store.clone())
            .cache_store(store.clone())
            .history_store(store)
            .build()
    }

    /// Start a builder for injecting components separately.
    #[must_use]
    pub fn builder() -> ScoreEngineBuilder {
        ScoreEngineBuilder::new()
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clock deriving local hours and dates.
    #[must_use]
    pub const fn clock(&self) -> LocalClock {
        self.clock
    }

    /// Cell `location` is scored and cached under.
    #[must_use]
    pub fn geocell_for(&self, location: Coordinate) -> GeocellId {
        self.repository.geocell_for(location)
    }

    /// Score a raw latitude and longitude.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] for out-of-range or non-finite
    /// input; no store is touched in that case.
    pub async fn score_at(
        &self,
        lat: f64,
        lng: f64,
        now: DateTime<Utc>,
    ) -> Result<SafetyScore, EngineError> {
        let location =
            Coordinate::new(lat, lng).map_err(|source| EngineError::Validation { source })?;
        Ok(self.get_or_calculate_score(location, now).await)
    }

    /// Serve the cached score for `location` at `now`, computing it on a miss.
    ///
    /// Store failures degrade: an unreadable cache is treated as a miss and
    /// unreadable area data yields a zero-confidence fallback score, which is
    /// neither cached nor recorded in history.
    pub async fn get_or_calculate_score(
        &self,
        location: Coordinate,
        now: DateTime<Utc>,
    ) -> SafetyScore {
        let cell = self.geocell_for(location);
        let hour = self.clock.hour(now);
        let epoch = match self.cache.lookup(&cell, hour, now).await {
            CacheProbe::Hit(score) => return score,
            CacheProbe::Miss { epoch } => epoch,
        };

        let area = self.repository.fetch(location, now).await;
        let score = self.scorer.score(location, now, &area);
        if score.is_fallback() {
            warn!("serving uncached fallback score for {cell}");
            return score;
        }

        match epoch {
            Some(observed) => {
                self.cache.store(&cell, hour, &score, now, observed).await;
            }
            None => debug!("cache unreadable for {cell}, skipping write-back"),
        }
        self.history
            .record(&cell, score.calculated_at, score.overall)
            .await;
        score
    }

    /// Persist an incident and invalidate its cell.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidRecord`] before any I/O for invalid
    /// input, [`EngineError::Persistence`] when the insert fails and
    /// [`EngineError::Invalidation`] when the cache cannot be cleared.
    pub async fn record_incident(
        &self,
        incident: NewIncident,
    ) -> Result<IncidentRecord, EngineError> {
        incident
            .validate()
            .map_err(|source| EngineError::InvalidRecord { source })?;
        let cell = self.geocell_for(incident.location);
        let record = self
            .sink
            .insert_incident(&cell, incident)
            .await
            .map_err(EngineError::persistence("insert incident"))?;
        self.invalidate(&cell).await?;
        Ok(record)
    }

    /// Persist a community report and invalidate its cell.
    ///
    /// # Errors
    /// As for [`ScoreEngine::record_incident`].
    pub async fn record_report(
        &self,
        report: NewCommunityReport,
    ) -> Result<CommunityReport, EngineError> {
        report
            .validate()
            .map_err(|source| EngineError::InvalidRecord { source })?;
        let cell = self.geocell_for(report.location);
        let record = self
            .sink
            .insert_report(&cell, report)
            .await
            .map_err(EngineError::persistence("insert community report"))?;
        self.invalidate(&cell).await?;
        Ok(record)
    }

    /// Invalidate `geocell` after a collaborator stored an incident there.
    ///
    /// Returns the cell's new epoch.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalidation`] when the cache cannot be cleared.
    pub async fn on_incident_recorded(&self, geocell: &GeocellId) -> Result<u64, EngineError> {
        self.invalidate(geocell).await
    }

    /// Invalidate `geocell` after a collaborator stored a report there.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalidation`] when the cache cannot be cleared.
    pub async fn on_report_recorded(&self, geocell: &GeocellId) -> Result<u64, EngineError> {
        self.invalidate(geocell).await
    }

    /// Change the verification flag of incident `id`.
    ///
    /// Returns the incident's cell, or `None` when no such incident exists.
    ///
    /// # Errors
    /// Returns [`EngineError::Persistence`] or [`EngineError::Invalidation`]
    /// when the store fails.
    pub async fn set_incident_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<GeocellId>, EngineError> {
        let cell = self
            .sink
            .set_incident_verified(id, verified)
            .await
            .map_err(EngineError::persistence("update incident verification"))?;
        let Some(found) = cell else {
            debug!("no incident {id} to update");
            return Ok(None);
        };
        self.invalidate(&found).await?;
        Ok(Some(found))
    }

    /// Replace the static attributes of the cell containing `location`.
    ///
    /// Returns the cell that was updated.
    ///
    /// # Errors
    /// Returns [`EngineError::Persistence`] or [`EngineError::Invalidation`]
    /// when the store fails.
    pub async fn set_area_attributes(
        &self,
        location: Coordinate,
        attributes: StoredAreaAttributes,
    ) -> Result<GeocellId, EngineError> {
        let cell = self.geocell_for(location);
        self.sink
            .upsert_area_attributes(&cell, attributes)
            .await
            .map_err(EngineError::persistence("upsert area attributes"))?;
        self.invalidate(&cell).await?;
        Ok(cell)
    }

    /// History bucket for `geocell` on `date`.
    ///
    /// # Errors
    /// Returns [`EngineError::Persistence`] when the bucket cannot be read.
    pub async fn history(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
    ) -> Result<Option<HistoryBucket>, EngineError> {
        self.history
            .get(geocell, date)
            .await
            .map_err(EngineError::persistence("read history bucket"))
    }

    /// History buckets for `geocell` between two dates, oldest first.
    ///
    /// # Errors
    /// Returns [`EngineError::Persistence`] when the buckets cannot be read.
    pub async fn history_range(
        &self,
        geocell: &GeocellId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryBucket>, EngineError> {
        self.history
            .range(geocell, from, to)
            .await
            .map_err(EngineError::persistence("read history range"))
    }

    async fn invalidate(&self, geocell: &GeocellId) -> Result<u64, EngineError> {
        self.cache.invalidate(geocell).await.map_err(|source| {
            error!("cached scores for {geocell} may be stale: {source}");
            EngineError::Invalidation {
                geocell: geocell.clone(),
                source,
            }
        })
    }
}

/// Assembles a [`ScoreEngine`] from separately injected components.
///
/// Every store is required. Without an explicit scorer the engine uses a
/// [`SafetyScorer`] with the configured weights and clock.
#[derive(Default)]
pub struct ScoreEngineBuilder {
    config: EngineConfig,
    weights: ScoreWeights,
    records: Option<Arc<dyn AreaRecordSource>>,
    sink: Option<Arc<dyn AreaRecordSink>>,
    cache: Option<Arc<dyn ScoreCacheStore>>,
    history: Option<Arc<dyn HistoryStore>>,
    scorer: Option<Arc<dyn AreaScorer>>,
}

impl std::fmt::Debug for ScoreEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreEngineBuilder")
            .field("config", &self.config)
            .field("weights", &self.weights)
            .field("records", &self.records.is_some())
            .field("sink", &self.sink.is_some())
            .field("cache", &self.cache.is_some())
            .field("history", &self.history.is_some())
            .field("scorer", &self.scorer.is_some())
            .finish()
    }
}

impl ScoreEngineBuilder {
    /// Builder with default configuration and no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    #[must_use]
    pub const fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Weights for the default scorer.
    #[must_use]
    pub const fn weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Store the repository reads records from.
    #[must_use]
    pub fn record_source(mut self, source: Arc<dyn AreaRecordSource>) -> Self {
        self.records = Some(source);
        self
    }

    /// Store ingestion writes records to.
    #[must_use]
    pub fn record_sink(mut self, sink: Arc<dyn AreaRecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Store holding cached scores.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn ScoreCacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    /// Store holding score history.
    #[must_use]
    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    /// Replace the default scorer.
    #[must_use]
    pub fn scorer(mut self, scorer: Arc<dyn AreaScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// # Errors
    /// Returns [`EngineError::Configuration`], [`EngineError::Weights`] or
    /// [`EngineError::MissingComponent`].
    pub fn build(self) -> Result<ScoreEngine, EngineError> {
        self.config
            .validate()
            .map_err(|source| EngineError::Configuration { source })?;
        let clock = self
            .config
            .clock()
            .map_err(|source| EngineError::Configuration { source })?;
        let records = self.records.ok_or(EngineError::MissingComponent {
            component: "record source",
        })?;
        let sink = self.sink.ok_or(EngineError::MissingComponent {
            component: "record sink",
        })?;
        let cache = self.cache.ok_or(EngineError::MissingComponent {
            component: "cache store",
        })?;
        let history = self.history.ok_or(EngineError::MissingComponent {
            component: "history store",
        })?;
        let weights = self.weights;
        let config = self.config;
        let scorer = self
            .scorer
            .map_or_else(|| default_scorer(weights, &config, clock), Ok)?;

        Ok(ScoreEngine {
            repository: AreaDataRepository::new(records, self.config.repository_config()),
            scorer,
            cache: ScoreCache::new(cache, self.config.cache_ttl()),
            history: HistoryAggregator::new(history, clock, self.config.history_mode),
            sink,
            clock,
            config: self.config,
        })
    }
}

fn default_scorer(
    weights: ScoreWeights,
    config: &EngineConfig,
    clock: LocalClock,
) -> Result<Arc<dyn AreaScorer>, EngineError> {
    let scorer = SafetyScorer::new(weights)
        .map_err(|source| EngineError::Weights { source })?
        .with_clock(clock)
        .with_windows(config.incident_window(), config.report_window());
    Ok(Arc::new(scorer))
}
