//! Incident and community report records.
//!
//! Records are owned by the backing store. The engine reads them during
//! aggregation and writes new ones through the ingestion hooks. `New*`
//! variants carry everything except the store-assigned identifier.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// Errors raised when validating or parsing record fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Community ratings must lie in `1..=5`.
    #[error("rating {rating} is outside 1..=5")]
    RatingOutOfRange {
        /// Rejected rating.
        rating: u8,
    },
    /// Incident severity must be finite and non-negative.
    #[error("severity {severity} must be finite and non-negative")]
    InvalidSeverity {
        /// Rejected severity.
        severity: f64,
    },
    /// Reporter identifiers must not be blank.
    #[error("reporter id must not be empty")]
    MissingReporter,
    /// Text did not name a known incident kind.
    #[error("unknown incident kind {raw:?}")]
    UnknownIncidentKind {
        /// Unrecognised input.
        raw: String,
    },
    /// Text did not name a known report kind.
    #[error("unknown report kind {raw:?}")]
    UnknownReportKind {
        /// Unrecognised input.
        raw: String,
    },
}

/// Category of a reported incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum IncidentKind {
    /// Verbal or physical harassment.
    Harassment,
    /// Physical assault.
    Assault,
    /// Theft or robbery.
    Theft,
    /// Anything else.
    Other,
}

impl IncidentKind {
    /// Return the kind as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Harassment => "harassment",
            Self::Assault => "assault",
            Self::Theft => "theft",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "harassment" => Ok(Self::Harassment),
            "assault" => Ok(Self::Assault),
            "theft" => Ok(Self::Theft),
            "other" => Ok(Self::Other),
            _ => Err(RecordError::UnknownIncidentKind { raw: s.to_owned() }),
        }
    }
}

/// Sentiment carried by a community report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ReportKind {
    /// The reporter felt safe; higher ratings mean safer.
    Safe,
    /// The reporter felt unsafe; higher ratings mean less safe.
    Unsafe,
    /// An alert about an ongoing situation.
    Alert,
}

impl ReportKind {
    /// Return the kind as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "unsafe" => Ok(Self::Unsafe),
            "alert" => Ok(Self::Alert),
            _ => Err(RecordError::UnknownReportKind { raw: s.to_owned() }),
        }
    }
}

/// Community rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// Validate a rating.
    ///
    /// # Errors
    /// Returns [`RecordError::RatingOutOfRange`] outside `1..=5`.
    pub const fn new(rating: u8) -> Result<Self, RecordError> {
        if rating < Self::MIN || rating > Self::MAX {
            return Err(RecordError::RatingOutOfRange { rating });
        }
        Ok(Self(rating))
    }

    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

/// A persisted incident.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IncidentRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Incident category.
    pub kind: IncidentKind,
    /// When the incident happened.
    pub occurred_at: DateTime<Utc>,
    /// Where the incident happened.
    pub location: Coordinate,
    /// Reporter-supplied severity; informational only.
    pub severity: f64,
    /// Whether moderation confirmed the incident.
    pub verified: bool,
    /// Identifier of the submitting user.
    pub reporter_id: String,
    /// Optional free-text description.
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
}

/// An incident awaiting persistence.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use safety_core::{Coordinate, IncidentKind, NewIncident};
///
/// let location = Coordinate::new(40.7, -74.0).expect("valid coordinate");
/// let incident = NewIncident::new(IncidentKind::Theft, Utc::now(), location, "user-1")
///     .with_description("bag snatched");
/// assert!(incident.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewIncident {
    /// Incident category.
    pub kind: IncidentKind,
    /// When the incident happened.
    pub occurred_at: DateTime<Utc>,
    /// Where the incident happened.
    pub location: Coordinate,
    /// Reporter-supplied severity; informational only.
    #[cfg_attr(feature = "serde", serde(default))]
    pub severity: f64,
    /// Whether the incident arrives already verified.
    #[cfg_attr(feature = "serde", serde(default))]
    pub verified: bool,
    /// Identifier of the submitting user.
    pub reporter_id: String,
    /// Optional free-text description.
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
}

impl NewIncident {
    /// Construct an unverified incident with zero severity.
    pub fn new(
        kind: IncidentKind,
        occurred_at: DateTime<Utc>,
        location: Coordinate,
        reporter_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            occurred_at,
            location,
            severity: 0.0,
            verified: false,
            reporter_id: reporter_id.into(),
            description: None,
        }
    }

    /// Set the reporter-supplied severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    /// Mark the incident as verified.
    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check fields the type system cannot enforce.
    ///
    /// # Errors
    /// Returns [`RecordError`] for a non-finite or negative severity or a
    /// blank reporter.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !self.severity.is_finite() || self.severity < 0.0 {
            return Err(RecordError::InvalidSeverity {
                severity: self.severity,
            });
        }
        if self.reporter_id.trim().is_empty() {
            return Err(RecordError::MissingReporter);
        }
        Ok(())
    }

    /// Attach a store-assigned identifier.
    #[must_use]
    pub fn into_record(self, id: impl Into<String>) -> IncidentRecord {
        IncidentRecord {
            id: id.into(),
            kind: self.kind,
            occurred_at: self.occurred_at,
            location: self.location,
            severity: self.severity,
            verified: self.verified,
            reporter_id: self.reporter_id,
            description: self.description,
        }
    }
}

/// A persisted community report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommunityReport {
    /// Store-assigned identifier.
    pub id: String,
    /// Rating between 1 and 5.
    pub rating: Rating,
    /// When the observation was made.
    pub occurred_at: DateTime<Utc>,
    /// Report sentiment.
    pub kind: ReportKind,
    /// Optional free-text comment.
    #[cfg_attr(feature = "serde", serde(default))]
    pub comment: Option<String>,
    /// Identifier of the submitting user.
    pub reporter_id: String,
    /// Where the observation was made.
    pub location: Coordinate,
}

/// A community report awaiting persistence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewCommunityReport {
    /// Rating between 1 and 5.
    pub rating: Rating,
    /// When the observation was made.
    pub occurred_at: DateTime<Utc>,
    /// Report sentiment.
    pub kind: ReportKind,
    /// Optional free-text comment.
    #[cfg_attr(feature = "serde", serde(default))]
    pub comment: Option<String>,
    /// Identifier of the submitting user.
    pub reporter_id: String,
    /// Where the observation was made.
    pub location: Coordinate,
}

impl NewCommunityReport {
    /// Construct a report without a comment.
    pub fn new(
        kind: ReportKind,
        rating: Rating,
        occurred_at: DateTime<Utc>,
        location: Coordinate,
        reporter_id: impl Into<String>,
    ) -> Self {
        Self {
            rating,
            occurred_at,
            kind,
            comment: None,
            reporter_id: reporter_id.into(),
            location,
        }
    }

    /// Attach a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Check fields the type system cannot enforce.
    ///
    /// # Errors
    /// Returns [`RecordError::MissingReporter`] for a blank reporter.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.reporter_id.trim().is_empty() {
            return Err(RecordError::MissingReporter);
        }
        Ok(())
    }

    /// Attach a store-assigned identifier.
    #[must_use]
    pub fn into_record(self, id: impl Into<String>) -> CommunityReport {
        CommunityReport {
            id: id.into(),
            rating: self.rating,
            occurred_at: self.occurred_at,
            kind: self.kind,
            comment: self.comment,
            reporter_id: self.reporter_id,
            location: self.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn location() -> Coordinate {
        Coordinate::new(1.0, 2.0).expect("valid coordinate")
    }

    #[rstest]
    #[case(0)]
    #[case(6)]
    fn rating_rejects_out_of_range(#[case] value: u8) {
        assert_eq!(
            Rating::new(value),
            Err(RecordError::RatingOutOfRange { rating: value })
        );
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    fn rating_accepts_bounds(#[case] value: u8) {
        assert_eq!(Rating::new(value).map(Rating::get), Ok(value));
    }

    #[rstest]
    #[case("Assault", IncidentKind::Assault)]
    #[case(" theft ", IncidentKind::Theft)]
    fn parses_incident_kinds(#[case] raw: &str, #[case] expected: IncidentKind) {
        assert_eq!(raw.parse::<IncidentKind>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_report_kind() {
        assert!(matches!(
            "meh".parse::<ReportKind>(),
            Err(RecordError::UnknownReportKind { .. })
        ));
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn incident_rejects_bad_severity(location: Coordinate, #[case] severity: f64) {
        let incident = NewIncident::new(IncidentKind::Other, Utc::now(), location, "u")
            .with_severity(severity);
        assert!(matches!(
            incident.validate(),
            Err(RecordError::InvalidSeverity { .. })
        ));
    }

    #[rstest]
    fn report_requires_reporter(location: Coordinate) {
        let rating = Rating::new(3).expect("valid rating");
        let report = NewCommunityReport::new(ReportKind::Safe, rating, Utc::now(), location, " ");
        assert_eq!(report.validate(), Err(RecordError::MissingReporter));
    }

    #[rstest]
    fn into_record_keeps_fields(location: Coordinate) {
        let at = Utc::now();
        let record = NewIncident::new(IncidentKind::Assault, at, location, "user-7")
            .verified()
            .into_record("42");
        assert_eq!(record.id, "42");
        assert!(record.verified);
        assert_eq!(record.occurred_at, at);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn report_json_rejects_bad_rating() {
        let json = r#"{
            "rating": 9,
            "occurred_at": "2024-01-01T00:00:00Z",
            "kind": "safe",
            "reporter_id": "u",
            "location": {"lat": 0.0, "lng": 0.0}
        }"#;
        assert!(serde_json::from_str::<NewCommunityReport>(json).is_err());
    }
}
