//! Local hour and calendar-day derivation.
//!
//! Scores vary by local hour of day, and history buckets are keyed by local
//! date. Both come from a fixed UTC offset so results stay deterministic for
//! a given instant.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use thiserror::Error;

/// Number of hour buckets per geocell.
pub const HOURS_PER_DAY: u8 = 24;

const SECONDS_PER_MINUTE: i32 = 60;

/// Errors returned by [`LocalClock::from_offset_minutes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    /// The offset exceeded chrono's ±24 h bound.
    #[error("UTC offset of {minutes} minutes is out of range")]
    OffsetOutOfRange {
        /// Rejected offset.
        minutes: i32,
    },
}

/// Converts instants to local hours and dates at a fixed offset.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use safety_core::LocalClock;
///
/// let clock = LocalClock::from_offset_minutes(120).expect("valid offset");
/// let at = Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
/// assert_eq!(clock.hour(at), 1);
/// assert_eq!(clock.date(at).to_string(), "2024-05-02");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Clock reporting UTC hours and dates.
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Clock at `minutes` east of UTC (negative values are west).
    ///
    /// # Errors
    /// Returns [`ClockError::OffsetOutOfRange`] when the offset is not
    /// strictly within one day.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ClockError> {
        minutes
            .checked_mul(SECONDS_PER_MINUTE)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(ClockError::OffsetOutOfRange { minutes })
    }

    /// Offset applied by this clock.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local hour of day in `0..24`.
    #[must_use]
    pub fn hour(&self, at: DateTime<Utc>) -> u8 {
        let hour = at.with_timezone(&self.offset).hour();
        u8::try_from(hour).unwrap_or(HOURS_PER_DAY - 1)
    }

    /// Local calendar date.
    #[must_use]
    pub fn date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(0, 14)]
    #[case(-300, 9)]
    #[case(600, 0)]
    fn hour_follows_offset(#[case] minutes: i32, #[case] expected: u8) {
        let clock = LocalClock::from_offset_minutes(minutes).expect("valid offset");
        let at = Utc
            .with_ymd_and_hms(2024, 3, 10, 14, 15, 0)
            .single()
            .expect("valid instant");
        assert_eq!(clock.hour(at), expected);
    }

    #[rstest]
    fn west_offset_moves_date_back() {
        let clock = LocalClock::from_offset_minutes(-60).expect("valid offset");
        let at = Utc
            .with_ymd_and_hms(2024, 3, 10, 0, 30, 0)
            .single()
            .expect("valid instant");
        assert_eq!(
            clock.date(at),
            NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date")
        );
    }

    #[rstest]
    #[case(24 * 60)]
    #[case(i32::MAX)]
    fn rejects_offsets_beyond_a_day(#[case] minutes: i32) {
        assert_eq!(
            LocalClock::from_offset_minutes(minutes),
            Err(ClockError::OffsetOutOfRange { minutes })
        );
    }
}
