//! Behaviour tests for record payloads as they cross the JSON boundary.

use rstest::rstest;
use safety_core::{
    Coordinate, IncidentKind, NewCommunityReport, NewIncident, Rating, RecordError, ReportKind,
};

#[rstest]
fn incident_defaults_optional_fields() {
    let incident: NewIncident = serde_json::from_str(
        r#"{"kind": "harassment", "occurred_at": "2024-03-01T22:15:00Z",
            "location": {"lat": 48.8566, "lng": 2.3522}, "reporter_id": "user-7"}"#,
    )
    .expect("valid incident payload");
    assert_eq!(incident.kind, IncidentKind::Harassment);
    assert!(!incident.verified);
    assert_eq!(incident.severity, 0.0);
    assert_eq!(incident.description, None);
    assert!(incident.validate().is_ok());
}

#[rstest]
#[case::latitude(r#"{"lat": -91.0, "lng": 0.0}"#)]
#[case::longitude(r#"{"lat": 0.0, "lng": 180.5}"#)]
fn out_of_range_locations_fail_to_parse(#[case] location: &str) {
    let payload = format!(
        r#"{{"kind": "theft", "occurred_at": "2024-03-01T22:15:00Z",
             "location": {location}, "reporter_id": "user-7"}}"#
    );
    assert!(serde_json::from_str::<NewIncident>(&payload).is_err());
}

#[rstest]
#[case(0)]
#[case(6)]
fn report_ratings_are_checked_while_parsing(#[case] rating: u8) {
    let payload = format!(
        r#"{{"kind": "safe", "rating": {rating}, "occurred_at": "2024-03-01T22:15:00Z",
             "location": {{"lat": 1.0, "lng": 1.0}}, "reporter_id": "user-7"}}"#
    );
    assert!(serde_json::from_str::<NewCommunityReport>(&payload).is_err());
}

#[rstest]
fn stored_report_serialises_plain_values() {
    let location = Coordinate::new(35.6762, 139.6503).expect("valid coordinate");
    let rating = Rating::new(4).expect("valid rating");
    let occurred_at = "2024-03-01T22:15:00Z".parse().expect("valid instant");
    let record = NewCommunityReport::new(ReportKind::Alert, rating, occurred_at, location, "u-1")
        .with_comment("broken street light")
        .into_record("12");
    let json = serde_json::to_value(&record).expect("serialise report");
    assert_eq!(json["id"], "12");
    assert_eq!(json["kind"], "alert");
    assert_eq!(json["rating"], 4);
    assert_eq!(json["comment"], "broken street light");
    assert_eq!(json["location"]["lat"], 35.6762);
}

#[rstest]
#[case::blank_reporter(NewIncident::new(IncidentKind::Other, chrono::Utc::now(), here(), "  "), RecordError::MissingReporter)]
#[case::negative_severity(
    NewIncident::new(IncidentKind::Assault, chrono::Utc::now(), here(), "u-1").with_severity(-2.0),
    RecordError::InvalidSeverity { severity: -2.0 }
)]
fn incidents_are_validated_before_storage(
    #[case] incident: NewIncident,
    #[case] expected: RecordError,
) {
    assert_eq!(incident.validate(), Err(expected));
}

fn here() -> Coordinate {
    Coordinate::new(-1.2921, 36.8219).expect("valid coordinate")
}
