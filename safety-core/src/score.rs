//! Computed safety scores.

use std::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::GeocellId;

/// Coarse band derived from an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SafetyLevel {
    /// Below 20.
    VeryUnsafe,
    /// 20 to 39.
    Unsafe,
    /// 40 to 59.
    Moderate,
    /// 60 to 79.
    Safe,
    /// 80 and above.
    VerySafe,
}

impl SafetyLevel {
    /// Map an overall score onto its band.
    ///
    /// # Examples
    /// ```
    /// use safety_core::SafetyLevel;
    ///
    /// assert_eq!(SafetyLevel::from_overall(79), SafetyLevel::Safe);
    /// assert_eq!(SafetyLevel::from_overall(80), SafetyLevel::VerySafe);
    /// ```
    #[must_use]
    pub const fn from_overall(overall: u8) -> Self {
        match overall {
            80.. => Self::VerySafe,
            60..=79 => Self::Safe,
            40..=59 => Self::Moderate,
            20..=39 => Self::Unsafe,
            _ => Self::VeryUnsafe,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VerySafe => "Very Safe",
            Self::Safe => "Safe",
            Self::Moderate => "Moderate",
            Self::Unsafe => "Unsafe",
            Self::VeryUnsafe => "Very Unsafe",
        }
    }

    /// Hex colour used when rendering the band.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::VerySafe => "#22c55e",
            Self::Safe => "#84cc16",
            Self::Moderate => "#eab308",
            Self::Unsafe => "#f97316",
            Self::VeryUnsafe => "#ef4444",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The six rounded sub-scores behind an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoreBreakdown {
    /// Hour-of-day factor.
    pub time_of_day: u8,
    /// Recency-weighted incident factor.
    pub historical_incidents: u8,
    /// Population density factor.
    pub population_density: u8,
    /// Street lighting factor.
    pub lighting: u8,
    /// Police presence factor.
    pub police_presence: u8,
    /// Community sentiment factor.
    pub community_reports: u8,
}

/// Result of scoring a location at an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SafetyScore {
    /// Weighted overall score, `0..=100`.
    pub overall: u8,
    /// Individual factors.
    pub breakdown: ScoreBreakdown,
    /// How much real data backed the score, `0..=100`.
    pub confidence: u8,
    /// Band derived from `overall`.
    pub level: SafetyLevel,
    /// Colour of `level`.
    pub color: String,
    /// Cell the score applies to.
    pub geocell: GeocellId,
    /// When the score was computed.
    pub calculated_at: DateTime<Utc>,
}

impl SafetyScore {
    /// Return `true` when the score was computed without real data.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.confidence == 0
    }
}
