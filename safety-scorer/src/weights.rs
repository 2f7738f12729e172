//! Factor weights and their basis-point form.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::ScorerError;

/// Basis points in a whole.
pub(crate) const BASIS_POINTS: u32 = 10_000;

/// Cap on a single scaled weight; six of them cannot overflow a `u32`.
const MAX_SCALED_WEIGHT: u32 = 500_000_000;

/// Relative weight of each factor in the overall score.
///
/// Weights must be finite, non-negative and sum to `1.0` once rounded to
/// basis points (`0.0001`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the hour-of-day factor.
    pub time_of_day: f64,
    /// Weight of the incident history factor.
    pub historical_incidents: f64,
    /// Weight of the population density factor.
    pub population_density: f64,
    /// Weight of the lighting factor.
    pub lighting: f64,
    /// Weight of the police presence factor.
    pub police_presence: f64,
    /// Weight of the community sentiment factor.
    pub community_reports: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            time_of_day: 0.20,
            historical_incidents: 0.30,
            population_density: 0.15,
            lighting: 0.15,
            police_presence: 0.10,
            community_reports: 0.10,
        }
    }
}

impl ScoreWeights {
    /// Validate the weights and convert them to basis points.
    ///
    /// # Errors
    /// Returns [`ScorerError`] when a weight is not finite, is negative, or
    /// when the weights do not sum to one.
    pub(crate) fn to_basis_points(self) -> Result<WeightBasisPoints, ScorerError> {
        let time_of_day = basis_points("time_of_day", self.time_of_day)?;
        let historical_incidents =
            basis_points("historical_incidents", self.historical_incidents)?;
        let population_density = basis_points("population_density", self.population_density)?;
        let lighting = basis_points("lighting", self.lighting)?;
        let police_presence = basis_points("police_presence", self.police_presence)?;
        let community_reports = basis_points("community_reports", self.community_reports)?;
        let total = time_of_day
            + historical_incidents
            + population_density
            + lighting
            + police_presence
            + community_reports;
        if total != BASIS_POINTS {
            return Err(ScorerError::WeightsDoNotSumToOne {
                basis_points: total,
            });
        }
        Ok(WeightBasisPoints {
            time_of_day,
            historical_incidents,
            population_density,
            lighting,
            police_presence,
            community_reports,
        })
    }

    /// Check the weights without keeping the converted form.
    ///
    /// # Errors
    /// See [`ScorerError`].
    pub fn validate(self) -> Result<Self, ScorerError> {
        self.to_basis_points().map(|_| self)
    }
}

/// Validated weights in basis points, summing to [`BASIS_POINTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WeightBasisPoints {
    pub(crate) time_of_day: u32,
    pub(crate) historical_incidents: u32,
    pub(crate) population_density: u32,
    pub(crate) lighting: u32,
    pub(crate) police_presence: u32,
    pub(crate) community_reports: u32,
}

#[expect(
    clippy::float_arithmetic,
    reason = "weights are scaled to basis points once at construction"
)]
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is finite, non-negative and bounded before the cast"
)]
fn basis_points(factor: &'static str, value: f64) -> Result<u32, ScorerError> {
    if !value.is_finite() {
        return Err(ScorerError::NonFiniteWeight { factor });
    }
    if value < 0.0 {
        return Err(ScorerError::NegativeWeight { factor, value });
    }
    let scaled = (value * f64::from(BASIS_POINTS))
        .round()
        .min(f64::from(MAX_SCALED_WEIGHT));
    Ok(scaled as u32)
}
