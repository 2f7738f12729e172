//! Aggregated inputs for one geocell.

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CommunityReport, Coordinate, GeocellId, IncidentRecord};

const DEFAULT_POPULATION_DENSITY: f64 = 1000.0;
const DEFAULT_STREET_LIGHT_COVERAGE: f64 = 60.0;
const DEFAULT_POLICE_STATION_DISTANCE_KM: f64 = 2.0;
const DEFAULT_POLICE_PATROLS_PER_WEEK: f64 = 5.0;
const DEFAULT_AVG_POLICE_RESPONSE_MINUTES: f64 = 10.0;

/// Slowly changing reference data for a geocell.
///
/// Every field is positive and finite once resolved; [`Default`] yields the
/// values substituted for missing data.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AreaStaticAttributes {
    /// Residents per square kilometre.
    pub population_density: f64,
    /// Share of streets with working lights, `0..=100`.
    pub street_light_coverage: f64,
    /// Distance to the nearest police station.
    pub police_station_distance_km: f64,
    /// Patrol visits per week.
    pub police_patrols_per_week: f64,
    /// Average police response time.
    pub avg_police_response_minutes: f64,
}

impl Default for AreaStaticAttributes {
    fn default() -> Self {
        Self {
            population_density: DEFAULT_POPULATION_DENSITY,
            street_light_coverage: DEFAULT_STREET_LIGHT_COVERAGE,
            police_station_distance_km: DEFAULT_POLICE_STATION_DISTANCE_KM,
            police_patrols_per_week: DEFAULT_POLICE_PATROLS_PER_WEEK,
            avg_police_response_minutes: DEFAULT_AVG_POLICE_RESPONSE_MINUTES,
        }
    }
}

/// Static attributes as persisted, with any field possibly absent.
///
/// Collaborators maintain these rows independently of the engine, so each
/// field is resolved against its default on its own.
///
/// # Examples
/// ```
/// use safety_core::StoredAreaAttributes;
///
/// let stored = StoredAreaAttributes {
///     street_light_coverage: Some(80.0),
///     police_patrols_per_week: Some(0.0),
///     ..StoredAreaAttributes::default()
/// };
/// let resolved = stored.resolve();
/// assert_eq!(resolved.street_light_coverage, 80.0);
/// assert_eq!(resolved.police_patrols_per_week, 5.0);
/// assert_eq!(resolved.population_density, 1000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct StoredAreaAttributes {
    /// Residents per square kilometre.
    pub population_density: Option<f64>,
    /// Share of streets with working lights.
    pub street_light_coverage: Option<f64>,
    /// Distance to the nearest police station.
    pub police_station_distance_km: Option<f64>,
    /// Patrol visits per week.
    pub police_patrols_per_week: Option<f64>,
    /// Average police response time.
    pub avg_police_response_minutes: Option<f64>,
    /// When the row was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredAreaAttributes {
    /// Substitute defaults for missing, non-finite or non-positive fields.
    #[must_use]
    pub fn resolve(&self) -> AreaStaticAttributes {
        let defaults = AreaStaticAttributes::default();
        AreaStaticAttributes {
            population_density: or_default(self.population_density, defaults.population_density),
            street_light_coverage: or_default(
                self.street_light_coverage,
                defaults.street_light_coverage,
            ),
            police_station_distance_km: or_default(
                self.police_station_distance_km,
                defaults.police_station_distance_km,
            ),
            police_patrols_per_week: or_default(
                self.police_patrols_per_week,
                defaults.police_patrols_per_week,
            ),
            avg_police_response_minutes: or_default(
                self.avg_police_response_minutes,
                defaults.avg_police_response_minutes,
            ),
        }
    }
}

impl From<AreaStaticAttributes> for StoredAreaAttributes {
    fn from(value: AreaStaticAttributes) -> Self {
        Self {
            population_density: Some(value.population_density),
            street_light_coverage: Some(value.street_light_coverage),
            police_station_distance_km: Some(value.police_station_distance_km),
            police_patrols_per_week: Some(value.police_patrols_per_week),
            avg_police_response_minutes: Some(value.avg_police_response_minutes),
            updated_at: None,
        }
    }
}

fn or_default(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

/// Where an [`AreaData`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum AreaProvenance {
    /// Read from the backing store.
    Store,
    /// Substituted after a store failure or timeout.
    Fallback,
}

/// Everything the scorer needs for one geocell at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaData {
    /// Cell the data was gathered for.
    pub geocell: GeocellId,
    /// Location the request was made for.
    pub location: Coordinate,
    /// Recent incidents, newest first.
    pub incidents: Vec<IncidentRecord>,
    /// Recent community reports, newest first.
    pub reports: Vec<CommunityReport>,
    /// Resolved static attributes.
    pub attributes: AreaStaticAttributes,
    /// When the static attributes were last written, or the gather time.
    pub last_updated: DateTime<Utc>,
    /// Whether the data is real or a fallback.
    pub provenance: AreaProvenance,
}

impl AreaData {
    /// Build data with default attributes and no records.
    ///
    /// Used when the store cannot be read; the scorer reports zero
    /// confidence for such input.
    #[must_use]
    pub fn fallback(geocell: GeocellId, location: Coordinate, now: DateTime<Utc>) -> Self {
        Self {
            geocell,
            location,
            incidents: Vec::new(),
            reports: Vec::new(),
            attributes: AreaStaticAttributes::default(),
            last_updated: now,
            provenance: AreaProvenance::Fallback,
        }
    }

    /// Return `true` when the data was substituted.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.provenance == AreaProvenance::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 1000.0)]
    #[case(Some(0.0), 1000.0)]
    #[case(Some(-5.0), 1000.0)]
    #[case(Some(f64::NAN), 1000.0)]
    #[case(Some(250.0), 250.0)]
    fn density_resolves_per_field(#[case] stored: Option<f64>, #[case] expected: f64) {
        let attributes = StoredAreaAttributes {
            population_density: stored,
            ..StoredAreaAttributes::default()
        };
        assert_eq!(attributes.resolve().population_density, expected);
    }

    #[rstest]
    fn empty_row_resolves_to_defaults() {
        assert_eq!(
            StoredAreaAttributes::default().resolve(),
            AreaStaticAttributes::default()
        );
    }

    #[rstest]
    fn fallback_is_flagged() {
        let location = Coordinate::new(0.0, 0.0).expect("valid coordinate");
        let cell = crate::geocell::encode(location, crate::GEOCELL_PRECISION);
        let data = AreaData::fallback(cell, location, Utc::now());
        assert!(data.is_fallback());
        assert!(data.incidents.is_empty());
        assert_eq!(data.attributes, AreaStaticAttributes::default());
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn partial_json_row_deserialises() {
        let stored: StoredAreaAttributes =
            serde_json::from_str(r#"{"street_light_coverage": 42.0}"#).expect("valid json");
        assert_eq!(stored.street_light_coverage, Some(42.0));
        assert_eq!(stored.resolve().avg_police_response_minutes, 10.0);
    }
}
