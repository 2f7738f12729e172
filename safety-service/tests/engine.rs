#![expect(
    clippy::expect_used,
    reason = "tests should fail fast when setup breaks"
)]

//! Integration tests for `ScoreEngine` over the in-memory store.

use std::sync::{Arc, atomic::Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rstest::{fixture, rstest};
use safety_core::{
    AreaRecordSink, AreaRecordSource, CommunityReport, Coordinate, GeocellId, IncidentKind,
    IncidentRecord, NewCommunityReport, NewIncident, Rating, ReportKind, ScoreCacheStore,
    StoreError, StoredAreaAttributes, test_support::MemorySafetyStore,
};
use safety_service::{EngineConfig, EngineError, HistoryMode, ScoreEngine};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 18, hour, minute, 0)
        .single()
        .expect("valid instant")
}

fn location() -> Coordinate {
    Coordinate::new(52.52, 13.405).expect("valid coordinate")
}

fn inline_config() -> EngineConfig {
    EngineConfig {
        history_mode: HistoryMode::Inline,
        ..EngineConfig::default()
    }
}

#[fixture]
fn store() -> Arc<MemorySafetyStore> {
    Arc::new(MemorySafetyStore::default())
}

fn engine(store: &Arc<MemorySafetyStore>, config: EngineConfig) -> ScoreEngine {
    ScoreEngine::with_store(store.clone(), config).expect("valid config")
}

#[rstest]
#[tokio::test]
async fn cached_scores_keep_their_calculation_time(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let first = engine.get_or_calculate_score(location(), at(14, 0)).await;
    let second = engine.get_or_calculate_score(location(), at(14, 45)).await;
    assert_eq!(second.calculated_at, at(14, 0));
    assert_eq!(first, second);
    assert_eq!(store.incident_queries(), 1);
}

#[rstest]
#[tokio::test]
async fn each_local_hour_is_cached_separately(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let afternoon = engine.get_or_calculate_score(location(), at(14, 0)).await;
    let night = engine.get_or_calculate_score(location(), at(2, 0)).await;
    assert_ne!(afternoon.breakdown.time_of_day, night.breakdown.time_of_day);
    assert_eq!(store.cached_hours(&engine.geocell_for(location())), 2);
}

#[rstest]
#[tokio::test]
async fn expired_entries_are_recomputed(store: Arc<MemorySafetyStore>) {
    let engine = engine(
        &store,
        EngineConfig {
            cache_ttl_secs: 600,
            ..inline_config()
        },
    );
    engine.get_or_calculate_score(location(), at(14, 0)).await;
    engine.get_or_calculate_score(location(), at(14, 9)).await;
    assert_eq!(store.incident_queries(), 1);
    let recomputed = engine.get_or_calculate_score(location(), at(14, 10)).await;
    assert_eq!(store.incident_queries(), 2);
    assert_eq!(recomputed.calculated_at, at(14, 10));
}

#[rstest]
#[tokio::test]
async fn raw_coordinates_are_validated_before_io(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let err = engine
        .score_at(91.0, 0.0, at(14, 0))
        .await
        .expect_err("latitude out of range");
    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(engine.score_at(0.0, f64::NAN, at(14, 0)).await.is_err());
    assert_eq!(store.calls.cache_lookups.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn invalid_records_are_rejected_before_io(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let incident = NewIncident::new(IncidentKind::Theft, at(9, 0), location(), "reporter")
        .with_severity(-1.0);
    assert!(matches!(
        engine.record_incident(incident).await,
        Err(EngineError::InvalidRecord { .. })
    ));
    let report = NewCommunityReport::new(
        ReportKind::Unsafe,
        Rating::new(1).expect("valid rating"),
        at(9, 0),
        location(),
        "",
    );
    assert!(matches!(
        engine.record_report(report).await,
        Err(EngineError::InvalidRecord { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn reports_invalidate_their_cell(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let cell = engine.geocell_for(location());
    let before = engine.get_or_calculate_score(location(), at(14, 0)).await;
    let report = NewCommunityReport::new(
        ReportKind::Unsafe,
        Rating::new(5).expect("valid rating"),
        at(14, 5),
        location(),
        "walker",
    );
    engine.record_report(report).await.expect("record report");
    assert_eq!(store.cached_hours(&cell), 0);

    let after = engine.get_or_calculate_score(location(), at(14, 10)).await;
    assert_eq!(before.breakdown.community_reports, 70);
    assert_eq!(after.breakdown.community_reports, 0);
}

#[rstest]
#[tokio::test]
async fn collaborator_hooks_invalidate_without_writing(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let cell = engine.geocell_for(location());
    engine.get_or_calculate_score(location(), at(14, 0)).await;

    store
        .insert_incident(
            &cell,
            NewIncident::new(IncidentKind::Assault, at(14, 1), location(), "other app"),
        )
        .await
        .expect("insert directly");
    let stale = engine.get_or_calculate_score(location(), at(14, 2)).await;
    assert_eq!(stale.breakdown.historical_incidents, 100);

    assert_eq!(engine.on_incident_recorded(&cell).await.expect("hook"), 1);
    let fresh = engine.get_or_calculate_score(location(), at(14, 3)).await;
    assert_eq!(fresh.breakdown.historical_incidents, 70);
    assert_eq!(engine.on_report_recorded(&cell).await.expect("hook"), 2);
}

#[rstest]
#[tokio::test]
async fn verification_changes_invalidate_the_incident_cell(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let record = engine
        .record_incident(NewIncident::new(
            IncidentKind::Assault,
            at(2, 0),
            location(),
            "witness",
        ))
        .await
        .expect("record incident");
    let unverified = engine.get_or_calculate_score(location(), at(2, 0)).await;
    assert_eq!(unverified.breakdown.historical_incidents, 70);

    let cell = engine
        .set_incident_verified(&record.id, true)
        .await
        .expect("verify");
    assert_eq!(cell, Some(engine.geocell_for(location())));
    let verified = engine.get_or_calculate_score(location(), at(2, 0)).await;
    assert_eq!(verified.breakdown.historical_incidents, 55);

    assert_eq!(
        engine
            .set_incident_verified("incident-404", true)
            .await
            .expect("missing incident"),
        None
    );
}

#[rstest]
#[tokio::test]
async fn configured_incident_window_reaches_the_scorer(store: Arc<MemorySafetyStore>) {
    let year = EngineConfig {
        incident_window_days: 365,
        ..inline_config()
    };
    let wide = engine(&store, year);
    for _ in 0..20 {
        wide.record_incident(NewIncident::new(
            IncidentKind::Assault,
            at(14, 0) - Duration::days(190),
            location(),
            "witness",
        ))
        .await
        .expect("record incident");
    }
    let score = wide.get_or_calculate_score(location(), at(14, 0)).await;
    assert_eq!(score.breakdown.historical_incidents, 99);
    assert_eq!(score.confidence, 70);

    let default = engine(&store, inline_config());
    let score = default.get_or_calculate_score(location(), at(15, 0)).await;
    assert_eq!(score.breakdown.historical_incidents, 100);
    assert_eq!(score.confidence, 40);
}

#[rstest]
#[tokio::test]
async fn area_attributes_apply_after_update(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    assert_eq!(
        engine
            .get_or_calculate_score(location(), at(2, 0))
            .await
            .breakdown
            .lighting,
        60
    );
    let cell = engine
        .set_area_attributes(
            location(),
            StoredAreaAttributes {
                street_light_coverage: Some(20.0),
                ..StoredAreaAttributes::default()
            },
        )
        .await
        .expect("update attributes");
    assert_eq!(cell, engine.geocell_for(location()));
    let dark = engine.get_or_calculate_score(location(), at(2, 0)).await;
    assert_eq!(dark.breakdown.lighting, 20);
}

#[rstest]
#[tokio::test]
async fn failed_invalidation_keeps_the_record(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    store.fail_invalidation(true);
    let err = engine
        .record_incident(NewIncident::new(
            IncidentKind::Theft,
            at(9, 0),
            location(),
            "reporter",
        ))
        .await
        .expect_err("invalidation fails");
    assert!(matches!(err, EngineError::Invalidation { .. }));

    let area = store
        .recent_incidents(&engine.geocell_for(location()), at(0, 0), 10)
        .await
        .expect("query");
    assert_eq!(area.len(), 1);
}

#[rstest]
#[tokio::test]
async fn scores_are_recorded_in_history(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    let cell = engine.geocell_for(location());
    engine.get_or_calculate_score(location(), at(14, 0)).await;
    engine.get_or_calculate_score(location(), at(2, 0)).await;
    engine.get_or_calculate_score(location(), at(14, 30)).await;

    let date = NaiveDate::from_ymd_opt(2024, 4, 18).expect("valid date");
    let bucket = engine
        .history(&cell, date)
        .await
        .expect("read history")
        .expect("bucket exists");
    assert_eq!(bucket.len(), 2);
    assert_eq!(bucket.hour(14).map(|entry| entry.score), Some(89));
    assert_eq!(store.history_writes(), 2);

    let range = engine
        .history_range(&cell, date - Duration::days(1), date)
        .await
        .expect("read range");
    assert_eq!(range.len(), 1);
}

#[rstest]
#[tokio::test]
async fn detached_history_does_not_block_scoring(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, EngineConfig::default());
    engine.get_or_calculate_score(location(), at(14, 0)).await;
    for _ in 0..100 {
        if store.history_writes() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(store.history_writes(), 1);
}

#[rstest]
#[tokio::test]
async fn fallback_scores_skip_cache_and_history(store: Arc<MemorySafetyStore>) {
    let engine = engine(&store, inline_config());
    store.fail_records(true);
    let score = engine.get_or_calculate_score(location(), at(14, 0)).await;
    assert_eq!(score.confidence, 0);
    assert_eq!(store.cache_writes(), 0);
    assert_eq!(store.history_writes(), 0);

    store.fail_records(false);
    let recovered = engine.get_or_calculate_score(location(), at(14, 1)).await;
    assert_eq!(recovered.confidence, 40);
    assert_eq!(store.cache_writes(), 1);
}

/// Record source that invalidates the cell while the engine computes,
/// standing in for an ingestion racing a cache miss.
struct RacingSource {
    inner: Arc<MemorySafetyStore>,
}

#[async_trait]
impl AreaRecordSource for RacingSource {
    async fn recent_incidents(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<IncidentRecord>, StoreError> {
        self.inner.invalidate(geocell).await?;
        self.inner.recent_incidents(geocell, since, limit).await
    }

    async fn recent_reports(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommunityReport>, StoreError> {
        self.inner.recent_reports(geocell, since, limit).await
    }

    async fn area_attributes(
        &self,
        geocell: &GeocellId,
    ) -> Result<Option<StoredAreaAttributes>, StoreError> {
        self.inner.area_attributes(geocell).await
    }
}

#[rstest]
#[tokio::test]
async fn write_back_after_concurrent_invalidation_is_dropped(store: Arc<MemorySafetyStore>) {
    let engine = ScoreEngine::builder()
        .config(inline_config())
        .record_source(Arc::new(RacingSource {
            inner: store.clone(),
        }))
        .record_sink(store.clone())
        .cache_store(store.clone())
        .history_store(store.clone())
        .build()
        .expect("valid engine");
    let score = engine.get_or_calculate_score(location(), at(14, 0)).await;
    assert_eq!(score.overall, 89);
    assert_eq!(store.cache_writes(), 0);
    assert_eq!(store.cached_hours(&engine.geocell_for(location())), 0);
}

#[rstest]
fn builder_requires_every_store(store: Arc<MemorySafetyStore>) {
    let err = ScoreEngine::builder()
        .record_source(store.clone())
        .record_sink(store.clone())
        .cache_store(store)
        .build()
        .expect_err("history store missing");
    assert!(matches!(
        err,
        EngineError::MissingComponent {
            component: "history store"
        }
    ));
}

#[rstest]
fn invalid_configuration_is_rejected(store: Arc<MemorySafetyStore>) {
    let err = ScoreEngine::with_store(
        store,
        EngineConfig {
            report_limit: 0,
            ..EngineConfig::default()
        },
    )
    .expect_err("zero report limit");
    assert!(matches!(err, EngineError::Configuration { .. }));
}
