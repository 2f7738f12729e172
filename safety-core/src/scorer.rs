//! Score an area for safety at an instant.
//!
//! The `AreaScorer` trait turns an [`AreaData`] snapshot into a
//! [`SafetyScore`]. The scoring crate provides the weighted implementation;
//! the engine depends only on this trait.

use chrono::{DateTime, Utc};

use crate::{AreaData, Coordinate, SafetyScore};

/// Calculate a safety score for a location.
///
/// Implementations must be thread-safe (`Send` + `Sync`) so one scorer can
/// serve concurrent requests. The method is infallible and performs no I/O;
/// the same inputs must always yield the same score.
///
/// Implementations must:
/// - Produce sub-scores and an overall score within `0..=100`.
/// - Report zero confidence for fallback data.
///
/// Use [`AreaScorer::sanitise`] to guard raw factor values.
///
/// # Examples
///
/// ```rust
/// use chrono::{DateTime, Utc};
/// use safety_core::{
///     AreaData, AreaScorer, Coordinate, SafetyLevel, SafetyScore, ScoreBreakdown,
/// };
///
/// struct FlatScorer;
///
/// impl AreaScorer for FlatScorer {
///     fn score(&self, _location: Coordinate, now: DateTime<Utc>, area: &AreaData) -> SafetyScore {
///         let level = SafetyLevel::from_overall(50);
///         SafetyScore {
///             overall: 50,
///             breakdown: ScoreBreakdown::default(),
///             confidence: 0,
///             level,
///             color: level.color().to_owned(),
///             geocell: area.geocell.clone(),
///             calculated_at: now,
///         }
///     }
/// }
///
/// assert_eq!(FlatScorer::sanitise(f64::NAN), 0.0);
/// assert_eq!(FlatScorer::sanitise(140.0), 100.0);
/// ```
pub trait AreaScorer: Send + Sync {
    /// Return the score for `location` at `now` given `area`.
    fn score(&self, location: Coordinate, now: DateTime<Utc>, area: &AreaData) -> SafetyScore;

    /// Clamp and validate a raw factor value.
    ///
    /// Returns `0.0` for non-finite values and clamps to `0.0..=100.0`.
    fn sanitise(value: f64) -> f64
    where
        Self: Sized,
    {
        if !value.is_finite() {
            return 0.0;
        }
        value.clamp(0.0, 100.0)
    }
}
