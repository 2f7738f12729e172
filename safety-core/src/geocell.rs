//! Geohash-style spatial buckets.
//!
//! A geocell identifier is the base-32 geohash of a coordinate at a fixed
//! precision. The engine aggregates records and caches scores per cell, so
//! every component must derive identifiers through [`encode`] with
//! [`GEOCELL_PRECISION`].
//!
//! # Examples
//! ```
//! use safety_core::{Coordinate, GEOCELL_PRECISION, geocell};
//!
//! let point = Coordinate::new(57.64911, 10.40744).expect("valid coordinate");
//! let cell = geocell::encode(point, GEOCELL_PRECISION);
//! assert_eq!(cell.as_str(), "u4pruy");
//! assert_eq!(geocell::neighbors(&cell).len(), 8);
//! ```

use std::{fmt, str::FromStr};

use geo::{Coord, Rect};
use geohash::GeohashError;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// Precision used for every engine lookup (≈0.6 km × 1.2 km cells).
pub const GEOCELL_PRECISION: usize = 6;

/// Longest identifier accepted by [`encode`] and [`GeocellId::parse`].
pub const MAX_PRECISION: usize = 12;

/// Compass offsets in (latitude, longitude) cell units, clockwise from north.
const DIRECTIONS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (1.0, 1.0),
    (0.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

/// Identifier of a geohash bucket.
///
/// Instances come from [`encode`] or from [`GeocellId::parse`], which runs
/// the identifier through the geohash decoder, so decoding never fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct GeocellId(String);

/// Errors returned by [`GeocellId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocellParseError {
    /// The identifier was empty or longer than [`MAX_PRECISION`].
    #[error("geocell length {len} is outside 1..={max}")]
    InvalidLength {
        /// Length of the rejected identifier.
        len: usize,
        /// Longest supported identifier.
        max: usize,
    },
    /// The identifier contained a character outside the geohash alphabet.
    #[error("geocell contains invalid character {found:?}")]
    InvalidCharacter {
        /// Offending character.
        found: char,
    },
    /// The geohash decoder rejected the identifier for another reason.
    #[error("geocell rejected by decoder: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },
}

impl From<GeohashError> for GeocellParseError {
    fn from(value: GeohashError) -> Self {
        match value {
            GeohashError::InvalidHashCharacter(found) => Self::InvalidCharacter { found },
            other => Self::Decode {
                message: other.to_string(),
            },
        }
    }
}

impl GeocellId {
    /// Validate a textual geocell identifier.
    ///
    /// Upper-case input is normalised to lower case.
    ///
    /// # Errors
    /// Returns [`GeocellParseError`] for empty, over-long or non-geohash
    /// input.
    pub fn parse(raw: &str) -> Result<Self, GeocellParseError> {
        let normalised = raw.trim().to_ascii_lowercase();
        let len = normalised.chars().count();
        if len == 0 || len > MAX_PRECISION {
            return Err(GeocellParseError::InvalidLength {
                len,
                max: MAX_PRECISION,
            });
        }
        geohash::decode_bbox(&normalised)?;
        Ok(Self(normalised))
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters, which is the precision the cell was encoded at.
    #[must_use]
    pub fn precision(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for GeocellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GeocellId {
    type Err = GeocellParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GeocellId {
    type Error = GeocellParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GeocellId> for String {
    fn from(value: GeocellId) -> Self {
        value.0
    }
}

/// Encode a coordinate into a geocell at `precision` characters.
///
/// Precision is clamped to `1..=MAX_PRECISION`.
#[must_use]
pub fn encode(location: Coordinate, precision: usize) -> GeocellId {
    let precision = precision.clamp(1, MAX_PRECISION);
    // The codec only rejects out-of-range coordinates and lengths; both are
    // ruled out by `Coordinate` and the clamp above.
    geohash::encode(Coord::from(location), precision)
        .map_or_else(|_| GeocellId("0".repeat(precision)), GeocellId)
}

/// Return the bounding box of a cell (`x = longitude`, `y = latitude`).
#[must_use]
pub fn decode_bounds(cell: &GeocellId) -> Rect<f64> {
    geohash::decode_bbox(cell.as_str()).unwrap_or_else(|_| world())
}

fn world() -> Rect<f64> {
    Rect::new(
        Coord {
            x: -180.0,
            y: -90.0,
        },
        Coord { x: 180.0, y: 90.0 },
    )
}

/// Return the eight cells surrounding `cell`, clockwise from north.
///
/// Longitude wraps across the antimeridian. Latitude is clamped at the
/// poles, so a polar cell reports cells from its own row for the
/// directions that would leave the globe.
#[must_use]
pub fn neighbors(cell: &GeocellId) -> [GeocellId; 8] {
    let bounds = decode_bounds(cell);
    let centre = bounds.center();
    let height = bounds.height();
    let width = bounds.width();
    let precision = cell.precision();

    DIRECTIONS.map(|(d_lat, d_lng)| {
        let point = Coordinate::clamped(centre.y + d_lat * height, centre.x + d_lng * width);
        encode(point, precision)
    })
}

/// Return `cell` followed by its eight neighbours.
#[must_use]
pub fn neighborhood(cell: &GeocellId) -> [GeocellId; 9] {
    let [n, ne, e, se, s, sw, w, nw] = neighbors(cell);
    [cell.clone(), n, ne, e, se, s, sw, w, nw]
}
