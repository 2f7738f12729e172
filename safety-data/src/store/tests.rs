use super::*;
use chrono::{Duration, NaiveDate, TimeZone};
use rstest::{fixture, rstest};
use safety_core::{
    AreaRecordSink, AreaRecordSource, CacheEntry, CacheWrite, Coordinate, GeocellId,
    HistoryBucket, HistoryStore, HourlyScore, IncidentKind, NewCommunityReport, NewIncident,
    Rating, ReportKind, SafetyLevel, SafetyScore, ScoreBreakdown, ScoreCacheStore,
    StoredAreaAttributes,
};
use tempfile::TempDir;

#[fixture]
fn store() -> SqliteSafetyStore {
    SqliteSafetyStore::open_in_memory().expect("open in-memory store")
}

#[fixture]
fn cell() -> GeocellId {
    GeocellId::parse("dr5reg").expect("valid cell")
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 20, 15, 30, 0)
        .single()
        .expect("valid instant")
}

fn location() -> Coordinate {
    Coordinate::new(40.7128, -74.006).expect("valid coordinate")
}

fn score(cell: &GeocellId, overall: u8) -> SafetyScore {
    let level = SafetyLevel::from_overall(overall);
    SafetyScore {
        overall,
        breakdown: ScoreBreakdown {
            time_of_day: 85,
            historical_incidents: 90,
            population_density: 80,
            lighting: 95,
            police_presence: 75,
            community_reports: 70,
        },
        confidence: 60,
        level,
        color: level.color().to_owned(),
        geocell: cell.clone(),
        calculated_at: now(),
    }
}

fn cache_entry(cell: &GeocellId, epoch: u64) -> CacheEntry {
    CacheEntry {
        geocell: cell.clone(),
        hour: 15,
        score: score(cell, 84),
        expires_at: now() + Duration::hours(1),
        epoch,
    }
}

#[rstest]
#[tokio::test]
async fn incidents_are_filtered_sorted_and_capped(store: SqliteSafetyStore, cell: GeocellId) {
    let other = GeocellId::parse("dr5ref").expect("valid cell");
    for days in [5, 1, 200, 3] {
        let incident = NewIncident::new(
            IncidentKind::Harassment,
            now() - Duration::days(days),
            location(),
            "reporter",
        );
        store
            .insert_incident(&cell, incident)
            .await
            .expect("insert incident");
    }
    store
        .insert_incident(
            &other,
            NewIncident::new(IncidentKind::Theft, now(), location(), "reporter"),
        )
        .await
        .expect("insert incident elsewhere");

    let found = store
        .recent_incidents(&cell, now() - Duration::days(180), 2)
        .await
        .expect("query incidents");
    let ages: Vec<i64> = found
        .iter()
        .map(|incident| (now() - incident.occurred_at).num_days())
        .collect();
    assert_eq!(ages, [1, 3]);
}

#[rstest]
#[tokio::test]
async fn reports_round_trip_their_fields(store: SqliteSafetyStore, cell: GeocellId) {
    let rating = Rating::new(2).expect("valid rating");
    let report = NewCommunityReport::new(ReportKind::Unsafe, rating, now(), location(), "alice")
        .with_comment("dark underpass");
    let stored = store
        .insert_report(&cell, report)
        .await
        .expect("insert report");
    let found = store
        .recent_reports(&cell, now() - Duration::days(30), 50)
        .await
        .expect("query reports");
    assert_eq!(found, vec![stored]);
}

#[rstest]
#[tokio::test]
async fn verification_returns_the_incident_cell(store: SqliteSafetyStore, cell: GeocellId) {
    let record = store
        .insert_incident(
            &cell,
            NewIncident::new(IncidentKind::Assault, now(), location(), "bob"),
        )
        .await
        .expect("insert incident");
    let updated = store
        .set_incident_verified(&record.id, true)
        .await
        .expect("update verification");
    assert_eq!(updated, Some(cell.clone()));
    let found = store
        .recent_incidents(&cell, now() - Duration::days(1), 10)
        .await
        .expect("query incidents");
    assert!(found.iter().all(|incident| incident.verified));
    assert_eq!(
        store
            .set_incident_verified("999", true)
            .await
            .expect("update missing"),
        None
    );
    assert_eq!(
        store
            .set_incident_verified("not-a-number", true)
            .await
            .expect("update malformed"),
        None
    );
}

#[rstest]
#[tokio::test]
async fn area_attributes_keep_missing_fields_absent(store: SqliteSafetyStore, cell: GeocellId) {
    assert_eq!(
        store.area_attributes(&cell).await.expect("query missing"),
        None
    );
    let attributes = StoredAreaAttributes {
        street_light_coverage: Some(35.0),
        updated_at: Some(now()),
        ..StoredAreaAttributes::default()
    };
    store
        .upsert_area_attributes(&cell, attributes)
        .await
        .expect("upsert attributes");
    let found = store
        .area_attributes(&cell)
        .await
        .expect("query attributes")
        .expect("row exists");
    assert_eq!(found, attributes);
    assert_eq!(found.resolve().population_density, 1000.0);
}

#[rstest]
#[tokio::test]
async fn cache_round_trips_and_invalidates(store: SqliteSafetyStore, cell: GeocellId) {
    let empty = store.lookup(&cell, 15).await.expect("lookup empty");
    assert_eq!((empty.entry, empty.epoch), (None, 0));

    let entry = cache_entry(&cell, 0);
    assert_eq!(
        store.store(entry.clone()).await.expect("store entry"),
        CacheWrite::Stored
    );
    let hit = store.lookup(&cell, 15).await.expect("lookup hit");
    assert_eq!(hit.entry, Some(entry));

    assert_eq!(store.invalidate(&cell).await.expect("invalidate"), 1);
    assert_eq!(store.invalidate(&cell).await.expect("invalidate again"), 2);
    let miss = store.lookup(&cell, 15).await.expect("lookup miss");
    assert!(miss.entry.is_none());
    assert_eq!(miss.epoch, 2);
}

#[rstest]
#[tokio::test]
async fn unreadable_cache_rows_count_as_misses(cell: GeocellId) {
    let temp = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(temp.path().join("safety.db")).expect("utf-8 path");
    let store = SqliteSafetyStore::open(&path).expect("open store");
    store.invalidate(&cell).await.expect("invalidate");
    store
        .store(cache_entry(&cell, 1))
        .await
        .expect("store entry");

    let connection = Connection::open(path.as_std_path()).expect("open raw connection");
    connection
        .execute("UPDATE score_cache SET score = '{not json'", [])
        .expect("corrupt score");
    drop(connection);

    let miss = store.lookup(&cell, 15).await.expect("lookup survives");
    assert_eq!((miss.entry, miss.epoch), (None, 1));
    assert_eq!(
        store
            .store(cache_entry(&cell, miss.epoch))
            .await
            .expect("rewrite entry"),
        CacheWrite::Stored
    );
    let hit = store.lookup(&cell, 15).await.expect("lookup hit");
    assert_eq!(hit.entry, Some(cache_entry(&cell, 1)));
}

#[rstest]
#[tokio::test]
async fn stale_epoch_writes_are_rejected(store: SqliteSafetyStore, cell: GeocellId) {
    let observed = store.lookup(&cell, 15).await.expect("lookup").epoch;
    store.invalidate(&cell).await.expect("invalidate");
    assert_eq!(
        store
            .store(cache_entry(&cell, observed))
            .await
            .expect("store stale entry"),
        CacheWrite::Superseded { current_epoch: 1 }
    );
    assert!(
        store
            .lookup(&cell, 15)
            .await
            .expect("lookup")
            .entry
            .is_none()
    );
}

#[rstest]
#[tokio::test]
async fn history_merges_hours_and_orders_ranges(store: SqliteSafetyStore, cell: GeocellId) {
    let first = NaiveDate::from_ymd_opt(2024, 8, 19).expect("valid date");
    let second = NaiveDate::from_ymd_opt(2024, 8, 20).expect("valid date");
    for (date, hour, overall) in [(second, 9, 80), (first, 22, 40), (second, 23, 50)] {
        store
            .record(
                &cell,
                date,
                HourlyScore {
                    hour,
                    score: overall,
                    calculated_at: now(),
                },
            )
            .await
            .expect("record history");
    }
    let bucket = store
        .bucket(&cell, second)
        .await
        .expect("read bucket")
        .expect("bucket exists");
    assert_eq!((bucket.min(), bucket.max()), (50, 80));
    assert!((bucket.average() - 65.0).abs() < f64::EPSILON);

    let range = store
        .buckets_between(&cell, first, second)
        .await
        .expect("read range");
    let dates: Vec<NaiveDate> = range.iter().map(HistoryBucket::date).collect();
    assert_eq!(dates, [first, second]);
}

#[rstest]
#[tokio::test]
async fn data_survives_reopening(cell: GeocellId) {
    let temp = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nested/safety.db"))
        .expect("utf-8 path");
    {
        let store = SqliteSafetyStore::open(&path).expect("open store");
        store.invalidate(&cell).await.expect("invalidate");
    }
    let reopened = SqliteSafetyStore::open(&path).expect("reopen store");
    assert_eq!(reopened.lookup(&cell, 0).await.expect("lookup").epoch, 1);
}

#[rstest]
fn rejects_unknown_schema_version() {
    let temp = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(temp.path().join("safety.db")).expect("utf-8 path");
    SqliteSafetyStore::open(&path).expect("create store");
    let connection = Connection::open(path.as_std_path()).expect("open raw connection");
    connection
        .execute("UPDATE safety_schema_version SET version = 99", [])
        .expect("bump version");
    drop(connection);
    assert!(matches!(
        SqliteSafetyStore::open(&path),
        Err(SqliteStoreError::UnsupportedVersion { found: 99, .. })
    ));
}
