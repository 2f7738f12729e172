//! Test-only, in-memory store used by unit and behaviour tests.
//!
//! [`MemorySafetyStore`] implements every store trait over a single mutex
//! and can be told to fail individual concerns, which lets tests exercise
//! the engine's degraded paths without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    AreaRecordSink, AreaRecordSource, CacheEntry, CacheLookup, CacheWrite, CommunityReport,
    GeocellId, HistoryBucket, HistoryStore, HourlyScore, IncidentRecord, NewCommunityReport,
    NewIncident, ScoreCacheStore, StoreError, StoredAreaAttributes,
};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    incidents: Vec<(GeocellId, IncidentRecord)>,
    reports: Vec<(GeocellId, CommunityReport)>,
    attributes: HashMap<GeocellId, StoredAreaAttributes>,
    cache: HashMap<(GeocellId, u8), CacheEntry>,
    epochs: HashMap<GeocellId, u64>,
    history: BTreeMap<(GeocellId, NaiveDate), HistoryBucket>,
}

/// Switches that make one concern of [`MemorySafetyStore`] fail.
#[derive(Debug, Default)]
pub struct FailureSwitches {
    /// Fail record and attribute reads.
    pub records: AtomicBool,
    /// Fail cache lookups and writes.
    pub cache: AtomicBool,
    /// Fail cache invalidation.
    pub invalidation: AtomicBool,
    /// Fail history reads and writes.
    pub history: AtomicBool,
}

/// Number of calls observed per concern.
#[derive(Debug, Default)]
pub struct CallCounters {
    /// Incident queries issued.
    pub incident_queries: AtomicUsize,
    /// Cache lookups issued.
    pub cache_lookups: AtomicUsize,
    /// Cache writes accepted.
    pub cache_writes: AtomicUsize,
    /// History records merged.
    pub history_writes: AtomicUsize,
}

/// In-memory implementation of all store traits.
#[derive(Debug, Default)]
pub struct MemorySafetyStore {
    state: Mutex<State>,
    /// Failure injection.
    pub fail: FailureSwitches,
    /// Call statistics.
    pub calls: CallCounters,
}

fn lock_state<'a>(
    state: &'a Mutex<State>,
    operation: &'static str,
) -> Result<std::sync::MutexGuard<'a, State>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Poisoned { operation })
}

fn check(flag: &AtomicBool, operation: &'static str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable {
            reason: format!("{operation} disabled for test"),
        });
    }
    Ok(())
}

impl MemorySafetyStore {
    /// Make record reads fail (or succeed again).
    pub fn fail_records(&self, fail: bool) {
        self.fail.records.store(fail, Ordering::SeqCst);
    }

    /// Make cache lookups and writes fail.
    pub fn fail_cache(&self, fail: bool) {
        self.fail.cache.store(fail, Ordering::SeqCst);
    }

    /// Make invalidation fail.
    pub fn fail_invalidation(&self, fail: bool) {
        self.fail.invalidation.store(fail, Ordering::SeqCst);
    }

    /// Make history reads and writes fail.
    pub fn fail_history(&self, fail: bool) {
        self.fail.history.store(fail, Ordering::SeqCst);
    }

    /// Incident queries observed so far.
    pub fn incident_queries(&self) -> usize {
        self.calls.incident_queries.load(Ordering::SeqCst)
    }

    /// Cache writes accepted so far.
    pub fn cache_writes(&self) -> usize {
        self.calls.cache_writes.load(Ordering::SeqCst)
    }

    /// History merges observed so far.
    pub fn history_writes(&self) -> usize {
        self.calls.history_writes.load(Ordering::SeqCst)
    }

    /// Number of cached entries for `geocell`.
    pub fn cached_hours(&self, geocell: &GeocellId) -> usize {
        self.state
            .lock()
            .map(|state| state.cache.keys().filter(|(cell, _)| cell == geocell).count())
            .unwrap_or(0)
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

fn newest_first<T>(
    rows: impl Iterator<Item = T>,
    at: impl Fn(&T) -> DateTime<Utc>,
    limit: usize,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|row| std::cmp::Reverse(at(row)));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl AreaRecordSource for MemorySafetyStore {
    async fn recent_incidents(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<IncidentRecord>, StoreError> {
        self.calls.incident_queries.fetch_add(1, Ordering::SeqCst);
        check(&self.fail.records, "recent_incidents")?;
        let state = lock_state(&self.state, "recent_incidents")?;
        let rows = state
            .incidents
            .iter()
            .filter(|(cell, record)| cell == geocell && record.occurred_at >= since)
            .map(|(_, record)| record.clone());
        Ok(newest_first(rows, |r| r.occurred_at, limit))
    }

    async fn recent_reports(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommunityReport>, StoreError> {
        check(&self.fail.records, "recent_reports")?;
        let state = lock_state(&self.state, "recent_reports")?;
        let rows = state
            .reports
            .iter()
            .filter(|(cell, report)| cell == geocell && report.occurred_at >= since)
            .map(|(_, report)| report.clone());
        Ok(newest_first(rows, |r| r.occurred_at, limit))
    }

    async fn area_attributes(
        &self,
        geocell: &GeocellId,
    ) -> Result<Option<StoredAreaAttributes>, StoreError> {
        check(&self.fail.records, "area_attributes")?;
        let state = lock_state(&self.state, "area_attributes")?;
        Ok(state.attributes.get(geocell).copied())
    }
}

#[async_trait]
impl AreaRecordSink for MemorySafetyStore {
    async fn insert_incident(
        &self,
        geocell: &GeocellId,
        incident: NewIncident,
    ) -> Result<IncidentRecord, StoreError> {
        let mut state = lock_state(&self.state, "insert_incident")?;
        let id = Self::next_id(&mut state, "incident");
        let record = incident.into_record(id);
        state.incidents.push((geocell.clone(), record.clone()));
        Ok(record)
    }

    async fn insert_report(
        &self,
        geocell: &GeocellId,
        report: NewCommunityReport,
    ) -> Result<CommunityReport, StoreError> {
        let mut state = lock_state(&self.state, "insert_report")?;
        let id = Self::next_id(&mut state, "report");
        let record = report.into_record(id);
        state.reports.push((geocell.clone(), record.clone()));
        Ok(record)
    }

    async fn set_incident_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<GeocellId>, StoreError> {
        let mut state = lock_state(&self.state, "set_incident_verified")?;
        Ok(state
            .incidents
            .iter_mut()
            .find(|(_, record)| record.id == id)
            .map(|(cell, record)| {
                record.verified = verified;
                cell.clone()
            }))
    }

    async fn upsert_area_attributes(
        &self,
        geocell: &GeocellId,
        attributes: StoredAreaAttributes,
    ) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state, "upsert_area_attributes")?;
        state.attributes.insert(geocell.clone(), attributes);
        Ok(())
    }
}

#[async_trait]
impl ScoreCacheStore for MemorySafetyStore {
    async fn lookup(&self, geocell: &GeocellId, hour: u8) -> Result<CacheLookup, StoreError> {
        self.calls.cache_lookups.fetch_add(1, Ordering::SeqCst);
        check(&self.fail.cache, "cache lookup")?;
        let state = lock_state(&self.state, "cache lookup")?;
        Ok(CacheLookup {
            entry: state.cache.get(&(geocell.clone(), hour)).cloned(),
            epoch: state.epochs.get(geocell).copied().unwrap_or(0),
        })
    }

    async fn store(&self, entry: CacheEntry) -> Result<CacheWrite, StoreError> {
        check(&self.fail.cache, "cache store")?;
        let mut state = lock_state(&self.state, "cache store")?;
        let current_epoch = state.epochs.get(&entry.geocell).copied().unwrap_or(0);
        if current_epoch != entry.epoch {
            return Ok(CacheWrite::Superseded { current_epoch });
        }
        state
            .cache
            .insert((entry.geocell.clone(), entry.hour), entry);
        self.calls.cache_writes.fetch_add(1, Ordering::SeqCst);
        Ok(CacheWrite::Stored)
    }

    async fn invalidate(&self, geocell: &GeocellId) -> Result<u64, StoreError> {
        check(&self.fail.invalidation, "cache invalidate")?;
        let mut state = lock_state(&self.state, "cache invalidate")?;
        state.cache.retain(|(cell, _), _| cell != geocell);
        let epoch = state.epochs.entry(geocell.clone()).or_insert(0);
        *epoch += 1;
        Ok(*epoch)
    }
}

#[async_trait]
impl HistoryStore for MemorySafetyStore {
    async fn record(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
        entry: HourlyScore,
    ) -> Result<HistoryBucket, StoreError> {
        check(&self.fail.history, "history record")?;
        let mut state = lock_state(&self.state, "history record")?;
        let bucket = state
            .history
            .entry((geocell.clone(), date))
            .or_insert_with(|| HistoryBucket::empty(geocell.clone(), date));
        bucket.record(entry);
        self.calls.history_writes.fetch_add(1, Ordering::SeqCst);
        Ok(bucket.clone())
    }

    async fn bucket(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
    ) -> Result<Option<HistoryBucket>, StoreError> {
        check(&self.fail.history, "history bucket")?;
        let state = lock_state(&self.state, "history bucket")?;
        Ok(state.history.get(&(geocell.clone(), date)).cloned())
    }

    async fn buckets_between(
        &self,
        geocell: &GeocellId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryBucket>, StoreError> {
        check(&self.fail.history, "history range")?;
        if from > to {
            return Ok(Vec::new());
        }
        let state = lock_state(&self.state, "history range")?;
        Ok(state
            .history
            .range((geocell.clone(), from)..=(geocell.clone(), to))
            .map(|(_, bucket)| bucket.clone())
            .collect())
    }
}
