//! Weighted safety scoring for geocells.
//!
//! [`SafetyScorer`] implements [`AreaScorer`](safety_core::AreaScorer): it
//! turns an [`AreaData`](safety_core::AreaData) snapshot into a
//! [`SafetyScore`](safety_core::SafetyScore) using six explainable factors.
//!
//! - **Time of day** favours daytime hours.
//! - **Historical incidents** subtracts a recency-decayed penalty per
//!   incident, weighted by kind and verification.
//! - **Population density** favours busy, but not crowded, areas and
//!   distinguishes day from night.
//! - **Lighting** assumes daylight between 06:00 and 18:59 and otherwise uses
//!   street light coverage.
//! - **Police presence** blends station distance, patrol frequency and
//!   response time.
//! - **Community reports** averages recent sentiment with exponential decay.
//!
//! Each factor is clamped to `0..=100` and rounded before weighting. The
//! overall score is the weighted sum of the rounded factors, computed in
//! basis points so that it is exact.
//!
//! # Examples
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use safety_core::{AreaData, AreaScorer, Coordinate, GEOCELL_PRECISION, SafetyLevel, geocell};
//! use safety_scorer::SafetyScorer;
//!
//! let location = Coordinate::new(51.5, -0.12).expect("valid coordinate");
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap();
//! let mut area = AreaData::fallback(geocell::encode(location, GEOCELL_PRECISION), location, now);
//! area.provenance = safety_core::AreaProvenance::Store;
//!
//! let score = SafetyScorer::default().score(location, now, &area);
//! assert_eq!(score.overall, 89);
//! assert_eq!(score.level, SafetyLevel::VerySafe);
//! assert_eq!(score.confidence, 40);
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub mod factors;
mod scorer;
mod weights;

pub use error::ScorerError;
pub use scorer::SafetyScorer;
pub use weights::ScoreWeights;
