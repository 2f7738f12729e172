//! The weighted safety scorer.
#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, Utc};
use log::trace;
use safety_core::{
    AreaData, AreaScorer, Coordinate, LocalClock, SafetyLevel, SafetyScore, ScoreBreakdown,
};

use crate::{
    ScoreWeights, ScorerError, factors,
    weights::{BASIS_POINTS, WeightBasisPoints},
};

/// Score areas with fixed weights over six factors.
///
/// The scorer is pure: it performs no I/O and the same inputs always give
/// the same score. Hour-based factors use the local hour from its
/// [`LocalClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyScorer {
    weights: WeightBasisPoints,
    clock: LocalClock,
    incident_window: Duration,
    report_window: Duration,
}

impl SafetyScorer {
    /// Build a scorer with custom weights.
    ///
    /// # Errors
    /// Returns [`ScorerError`] when the weights are invalid.
    pub fn new(weights: ScoreWeights) -> Result<Self, ScorerError> {
        Ok(Self {
            weights: weights.to_basis_points()?,
            ..Self::default()
        })
    }

    /// Use `clock` to derive local hours.
    #[must_use]
    pub const fn with_clock(mut self, clock: LocalClock) -> Self {
        self.clock = clock;
        self
    }

    /// Only count incidents younger than `incident` and community reports
    /// younger than `report`.
    ///
    /// # Examples
    /// ```
    /// use chrono::Duration;
    /// use safety_scorer::SafetyScorer;
    ///
    /// let scorer =
    ///     SafetyScorer::default().with_windows(Duration::days(365), Duration::days(60));
    /// assert_eq!(scorer.windows(), (Duration::days(365), Duration::days(60)));
    /// ```
    #[must_use]
    pub const fn with_windows(mut self, incident: Duration, report: Duration) -> Self {
        self.incident_window = incident;
        self.report_window = report;
        self
    }

    /// Incident and community report look-back windows.
    #[must_use]
    pub const fn windows(&self) -> (Duration, Duration) {
        (self.incident_window, self.report_window)
    }

    /// Clock used to derive local hours.
    #[must_use]
    pub const fn clock(&self) -> LocalClock {
        self.clock
    }

    fn breakdown(&self, now: DateTime<Utc>, area: &AreaData) -> ScoreBreakdown {
        let hour = self.clock.hour(now);
        let attributes = &area.attributes;
        ScoreBreakdown {
            time_of_day: percent(factors::time_of_day(hour)),
            historical_incidents: percent(factors::historical_incidents(
                &area.incidents,
                now,
                self.incident_window,
            )),
            population_density: percent(factors::population_density(
                attributes.population_density,
                hour,
            )),
            lighting: percent(factors::lighting(attributes.street_light_coverage, hour)),
            police_presence: percent(factors::police_presence(attributes)),
            community_reports: percent(factors::community_reports(
                &area.reports,
                now,
                self.report_window,
            )),
        }
    }

    #[expect(
        clippy::integer_division,
        reason = "rounding half up in basis points is intentional"
    )]
    fn overall(&self, breakdown: &ScoreBreakdown) -> u8 {
        let w = &self.weights;
        let weighted = [
            (w.time_of_day, breakdown.time_of_day),
            (w.historical_incidents, breakdown.historical_incidents),
            (w.population_density, breakdown.population_density),
            (w.lighting, breakdown.lighting),
            (w.police_presence, breakdown.police_presence),
            (w.community_reports, breakdown.community_reports),
        ]
        .into_iter()
        .map(|(weight, value)| weight * u32::from(value))
        .sum::<u32>();
        let rounded = (weighted + BASIS_POINTS / 2) / BASIS_POINTS;
        u8::try_from(rounded.min(100)).unwrap_or(100)
    }
}

impl Default for SafetyScorer {
    fn default() -> Self {
        Self {
            weights: WeightBasisPoints {
                time_of_day: 2000,
                historical_incidents: 3000,
                population_density: 1500,
                lighting: 1500,
                police_presence: 1000,
                community_reports: 1000,
            },
            clock: LocalClock::utc(),
            incident_window: Duration::days(factors::INCIDENT_WINDOW_DAYS),
            report_window: Duration::days(factors::REPORT_WINDOW_DAYS),
        }
    }
}

/// Sanitise a raw factor and round it to a whole percentage.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is clamped to 0..=100 before the cast"
)]
fn percent(raw: f64) -> u8 {
    SafetyScorer::sanitise(raw).round() as u8
}

impl AreaScorer for SafetyScorer {
    fn score(&self, location: Coordinate, now: DateTime<Utc>, area: &AreaData) -> SafetyScore {
        let breakdown = self.breakdown(now, area);
        let overall = self.overall(&breakdown);
        let level = SafetyLevel::from_overall(overall);
        let confidence = factors::confidence(area);
        trace!(
            "scored {} at ({}, {}): overall {overall}, confidence {confidence}",
            area.geocell,
            location.lat(),
            location.lng()
        );
        SafetyScore {
            overall,
            breakdown,
            confidence,
            level,
            color: level.color().to_owned(),
            geocell: area.geocell.clone(),
            calculated_at: now,
        }
    }
}
