//! Validated WGS84 coordinates.

use geo::Coord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
///
/// Latitude lies in `[-90, 90]` and longitude in `[-180, 180]`. Values
/// outside those ranges, and non-finite values, are rejected by
/// [`Coordinate::new`].
///
/// # Examples
/// ```
/// use safety_core::Coordinate;
///
/// let point = Coordinate::new(51.5074, -0.1278).expect("valid coordinate");
/// assert_eq!(point.lat(), 51.5074);
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "RawCoordinate")
)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

/// Errors returned by [`Coordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// Latitude was non-finite or outside `[-90, 90]`.
    #[error("latitude {lat} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Rejected latitude.
        lat: f64,
    },
    /// Longitude was non-finite or outside `[-180, 180]`.
    #[error("longitude {lng} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// Rejected longitude.
        lng: f64,
    },
}

impl Coordinate {
    /// Validate and construct a coordinate.
    ///
    /// # Errors
    /// Returns [`CoordinateError`] when either component is out of range or
    /// not finite.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange { lat });
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange { lng });
        }
        Ok(Self { lat, lng })
    }

    /// Build a coordinate from values already forced into range.
    ///
    /// Used by the geocell indexer when stepping into neighbouring cells.
    pub(crate) fn clamped(lat: f64, lng: f64) -> Self {
        let wrapped = if lng > 180.0 {
            lng - 360.0
        } else if lng < -180.0 {
            lng + 360.0
        } else {
            lng
        };
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lng: wrapped.clamp(-180.0, 180.0),
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(value: Coordinate) -> Self {
        Coord {
            x: value.lng,
            y: value.lat,
        }
    }
}

impl TryFrom<Coord<f64>> for Coordinate {
    type Error = CoordinateError;

    fn try_from(value: Coord<f64>) -> Result<Self, Self::Error> {
        Self::new(value.y, value.x)
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(90.0, 180.0)]
    #[case(-90.0, -180.0)]
    #[case(0.0, 0.0)]
    fn accepts_boundaries(#[case] lat: f64, #[case] lng: f64) {
        assert!(Coordinate::new(lat, lng).is_ok());
    }

    #[rstest]
    #[case(90.000_1, 0.0)]
    #[case(-91.0, 0.0)]
    #[case(f64::NAN, 0.0)]
    #[case(f64::INFINITY, 0.0)]
    fn rejects_bad_latitude(#[case] lat: f64, #[case] lng: f64) {
        let err = Coordinate::new(lat, lng).expect_err("latitude should be rejected");
        assert!(matches!(err, CoordinateError::LatitudeOutOfRange { .. }));
    }

    #[rstest]
    #[case(0.0, 180.5)]
    #[case(0.0, -181.0)]
    #[case(0.0, f64::NAN)]
    fn rejects_bad_longitude(#[case] lat: f64, #[case] lng: f64) {
        let err = Coordinate::new(lat, lng).expect_err("longitude should be rejected");
        assert!(matches!(err, CoordinateError::LongitudeOutOfRange { .. }));
    }

    #[rstest]
    fn converts_to_geo_coord_with_lng_as_x() {
        let point = Coordinate::new(10.0, 20.0).expect("valid coordinate");
        let coord: Coord<f64> = point.into();
        assert_eq!(coord, Coord { x: 20.0, y: 10.0 });
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn deserialisation_validates_range() {
        let err = serde_json::from_str::<Coordinate>(r#"{"lat": 95.0, "lng": 0.0}"#);
        assert!(err.is_err());
        let ok: Coordinate =
            serde_json::from_str(r#"{"lat": 45.0, "lng": 7.5}"#).expect("valid coordinate json");
        assert_eq!(ok.lng(), 7.5);
    }
}
