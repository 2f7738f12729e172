//! Per-day score statistics for a geocell.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::GeocellId;

/// Score recorded for one local hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HourlyScore {
    /// Local hour of day, `0..24`.
    pub hour: u8,
    /// Overall score computed for that hour.
    pub score: u8,
    /// When the score was computed; later computations win.
    pub calculated_at: DateTime<Utc>,
}

/// Rolling statistics for one `(geocell, date)` pair.
///
/// The aggregate fields are always recomputed from `hourly`, so a bucket
/// never reports an average that its hours do not support.
///
/// # Examples
/// ```
/// use chrono::{NaiveDate, Utc};
/// use safety_core::{GeocellId, HistoryBucket, HourlyScore};
///
/// let cell = GeocellId::parse("u4pruy").expect("valid cell");
/// let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
/// let now = Utc::now();
/// let mut bucket = HistoryBucket::empty(cell, date);
/// bucket.record(HourlyScore { hour: 9, score: 80, calculated_at: now });
/// bucket.record(HourlyScore { hour: 22, score: 40, calculated_at: now });
/// assert_eq!(bucket.average(), 60.0);
/// assert_eq!((bucket.min(), bucket.max()), (40, 80));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoryBucket {
    geocell: GeocellId,
    date: NaiveDate,
    hourly: BTreeMap<u8, HourlyScore>,
    average: f64,
    min: u8,
    max: u8,
}

impl HistoryBucket {
    /// Bucket with no recorded hours.
    #[must_use]
    pub const fn empty(geocell: GeocellId, date: NaiveDate) -> Self {
        Self {
            geocell,
            date,
            hourly: BTreeMap::new(),
            average: 0.0,
            min: 0,
            max: 0,
        }
    }

    /// Bucket holding a single hour.
    #[must_use]
    pub fn with_score(geocell: GeocellId, date: NaiveDate, entry: HourlyScore) -> Self {
        let mut bucket = Self::empty(geocell, date);
        bucket.record(entry);
        bucket
    }

    /// Merge an hourly score, keeping whichever was computed later.
    ///
    /// Equal timestamps take the incoming value. Returns `true` if the
    /// bucket changed.
    pub fn record(&mut self, entry: HourlyScore) -> bool {
        let replace = self
            .hourly
            .get(&entry.hour)
            .is_none_or(|existing| entry.calculated_at >= existing.calculated_at);
        if replace {
            self.hourly.insert(entry.hour, entry);
            self.recompute();
        }
        replace
    }

    fn recompute(&mut self) {
        let scores = self.hourly.values().map(|entry| entry.score);
        self.min = scores.clone().min().unwrap_or(0);
        self.max = scores.clone().max().unwrap_or(0);
        let count = self.hourly.len();
        self.average = if count == 0 {
            0.0
        } else {
            let total: u32 = scores.map(u32::from).sum();
            f64::from(total) / f64::from(u32::try_from(count).unwrap_or(u32::MAX))
        };
    }

    /// Cell this bucket belongs to.
    #[must_use]
    pub const fn geocell(&self) -> &GeocellId {
        &self.geocell
    }

    /// Local date this bucket covers.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Recorded hours in ascending order.
    pub fn hourly(&self) -> impl Iterator<Item = &HourlyScore> {
        self.hourly.values()
    }

    /// Score recorded for `hour`, if any.
    #[must_use]
    pub fn hour(&self, hour: u8) -> Option<&HourlyScore> {
        self.hourly.get(&hour)
    }

    /// Mean of the recorded hourly scores.
    #[must_use]
    pub const fn average(&self) -> f64 {
        self.average
    }

    /// Lowest recorded hourly score.
    #[must_use]
    pub const fn min(&self) -> u8 {
        self.min
    }

    /// Highest recorded hourly score.
    #[must_use]
    pub const fn max(&self) -> u8 {
        self.max
    }

    /// Number of recorded hours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hourly.len()
    }

    /// Return `true` when no hour has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::{fixture, rstest};

    #[fixture]
    fn bucket() -> HistoryBucket {
        HistoryBucket::empty(
            GeocellId::parse("gcpuvr").expect("valid cell"),
            NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date"),
        )
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[rstest]
    fn later_computation_wins(mut bucket: HistoryBucket) {
        bucket.record(HourlyScore { hour: 5, score: 70, calculated_at: at(5) });
        let stale = HourlyScore {
            hour: 5,
            score: 10,
            calculated_at: at(5) - Duration::minutes(1),
        };
        assert!(!bucket.record(stale));
        assert_eq!(bucket.hour(5).map(|h| h.score), Some(70));
    }

    #[rstest]
    fn equal_timestamps_take_incoming(mut bucket: HistoryBucket) {
        bucket.record(HourlyScore { hour: 5, score: 70, calculated_at: at(5) });
        assert!(bucket.record(HourlyScore { hour: 5, score: 65, calculated_at: at(5) }));
        assert_eq!(bucket.hour(5).map(|h| h.score), Some(65));
        assert_eq!(bucket.len(), 1);
    }

    #[rstest]
    fn aggregates_follow_hours(mut bucket: HistoryBucket) {
        for (hour, score) in [(1_u8, 30_u8), (12, 90), (18, 60)] {
            bucket.record(HourlyScore {
                hour,
                score,
                calculated_at: at(u32::from(hour)),
            });
        }
        assert_eq!(bucket.min(), 30);
        assert_eq!(bucket.max(), 90);
        assert!((bucket.average() - 60.0).abs() < f64::EPSILON);
        let hours: Vec<u8> = bucket.hourly().map(|h| h.hour).collect();
        assert_eq!(hours, [1, 12, 18]);
    }

    #[rstest]
    fn empty_bucket_reports_zeroes(bucket: HistoryBucket) {
        assert!(bucket.is_empty());
        assert_eq!((bucket.min(), bucket.max()), (0, 0));
        assert!(bucket.average().abs() < f64::EPSILON);
    }
}
