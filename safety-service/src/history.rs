//! Per-day score history.
//!
//! Every computed score is folded into the bucket for its cell and local
//! date. Writes are best-effort: failures are logged and never reach the
//! scoring caller.
#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use safety_core::{GeocellId, HistoryBucket, HistoryStore, HourlyScore, LocalClock, StoreError};

use crate::HistoryMode;

/// Records scores into daily buckets and reads them back.
#[derive(Clone)]
pub struct HistoryAggregator {
    store: Arc<dyn HistoryStore>,
    clock: LocalClock,
    mode: HistoryMode,
}

impl std::fmt::Debug for HistoryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryAggregator")
            .field("clock", &self.clock)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl HistoryAggregator {
    /// Aggregator writing through `store`, bucketing by `clock`.
    pub fn new(store: Arc<dyn HistoryStore>, clock: LocalClock, mode: HistoryMode) -> Self {
        Self { store, clock, mode }
    }

    /// Write mode in use.
    #[must_use]
    pub const fn mode(&self) -> HistoryMode {
        self.mode
    }

    /// Fold `score` computed at `at` into the bucket for its local date.
    ///
    /// In [`HistoryMode::Detached`] the write is spawned on the current
    /// Tokio runtime; without one it is skipped with a warning.
    pub async fn record(&self, geocell: &GeocellId, at: DateTime<Utc>, score: u8) {
        let date = self.clock.date(at);
        let entry = HourlyScore {
            hour: self.clock.hour(at),
            score,
            calculated_at: at,
        };
        match self.mode {
            HistoryMode::Inline => write(self.store.as_ref(), geocell, date, entry).await,
            HistoryMode::Detached => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let store = Arc::clone(&self.store);
                    let cell = geocell.clone();
                    drop(handle.spawn(async move {
                        write(store.as_ref(), &cell, date, entry).await;
                    }));
                }
                Err(err) => warn!("no runtime for history write of {geocell}: {err}"),
            },
        }
    }

    /// Bucket for `geocell` on `date`, if any score was recorded.
    ///
    /// # Errors
    /// Returns the store error when the bucket cannot be read.
    pub async fn get(
        &self,
        geocell: &GeocellId,
        date: NaiveDate,
    ) -> Result<Option<HistoryBucket>, StoreError> {
        self.store.bucket(geocell, date).await
    }

    /// Buckets for `geocell` from `from` to `to` inclusive, oldest first.
    ///
    /// An inverted range yields no buckets.
    ///
    /// # Errors
    /// Returns the store error when the buckets cannot be read.
    pub async fn range(
        &self,
        geocell: &GeocellId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryBucket>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        self.store.buckets_between(geocell, from, to).await
    }
}

async fn write(store: &dyn HistoryStore, geocell: &GeocellId, date: NaiveDate, entry: HourlyScore) {
    let hour = entry.hour;
    match store.record(geocell, date, entry).await {
        Ok(bucket) => debug!(
            "recorded hour {hour} for {geocell} on {date}, average now {:.1}",
            bucket.average()
        ),
        Err(err) => warn!("failed to record history for {geocell} on {date}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use safety_core::test_support::MemorySafetyStore;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, hour, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).expect("valid date")
    }

    fn cell() -> GeocellId {
        GeocellId::parse("9q8yyk").expect("valid cell")
    }

    #[fixture]
    fn store() -> Arc<MemorySafetyStore> {
        Arc::new(MemorySafetyStore::default())
    }

    fn inline(store: &Arc<MemorySafetyStore>, clock: LocalClock) -> HistoryAggregator {
        HistoryAggregator::new(store.clone(), clock, HistoryMode::Inline)
    }

    #[rstest]
    #[tokio::test]
    async fn records_hourly_scores_into_daily_buckets(store: Arc<MemorySafetyStore>) {
        let history = inline(&store, LocalClock::utc());
        history.record(&cell(), at(1, 8), 90).await;
        history.record(&cell(), at(1, 22), 40).await;
        history.record(&cell(), at(2, 8), 70).await;

        let bucket = history
            .get(&cell(), date(1))
            .await
            .expect("read bucket")
            .expect("bucket exists");
        assert_eq!(bucket.len(), 2);
        assert_eq!((bucket.min(), bucket.max()), (40, 90));
        assert!((bucket.average() - 65.0).abs() < f64::EPSILON);
        assert_eq!(bucket.hour(22).map(|entry| entry.score), Some(40));
    }

    #[rstest]
    #[tokio::test]
    async fn local_offset_moves_late_scores_to_the_next_day(store: Arc<MemorySafetyStore>) {
        let clock = LocalClock::from_offset_minutes(180).expect("valid offset");
        let history = inline(&store, clock);
        history.record(&cell(), at(1, 22), 55).await;

        assert!(history.get(&cell(), date(1)).await.expect("read").is_none());
        let bucket = history
            .get(&cell(), date(2))
            .await
            .expect("read")
            .expect("bucket exists");
        assert_eq!(bucket.hour(1).map(|entry| entry.score), Some(55));
    }

    #[rstest]
    #[tokio::test]
    async fn range_is_ordered_and_inclusive(store: Arc<MemorySafetyStore>) {
        let history = inline(&store, LocalClock::utc());
        for day in [4, 2, 3, 6] {
            history.record(&cell(), at(day, 12), 60).await;
        }
        let dates: Vec<NaiveDate> = history
            .range(&cell(), date(2), date(4))
            .await
            .expect("read range")
            .iter()
            .map(HistoryBucket::date)
            .collect();
        assert_eq!(dates, [date(2), date(3), date(4)]);
        assert!(
            history
                .range(&cell(), date(4), date(2))
                .await
                .expect("read inverted range")
                .is_empty()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn write_failures_are_swallowed(store: Arc<MemorySafetyStore>) {
        store.fail_history(true);
        let history = inline(&store, LocalClock::utc());
        history.record(&cell(), at(1, 8), 90).await;
        assert_eq!(store.history_writes(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn detached_writes_complete_in_the_background(store: Arc<MemorySafetyStore>) {
        let history =
            HistoryAggregator::new(store.clone(), LocalClock::utc(), HistoryMode::Detached);
        history.record(&cell(), at(1, 8), 90).await;
        for _ in 0..100 {
            if store.history_writes() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.history_writes(), 1);
    }
}
