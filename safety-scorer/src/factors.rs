//! Individual scoring factors.
//!
//! Every function returns a raw value on the `0..=100` scale. Hours are local
//! hours of day in `0..24`. Ages are measured from `now`; records dated in the
//! future count as age zero.

#![forbid(unsafe_code)]
#![expect(
    clippy::float_arithmetic,
    reason = "scoring factors are defined as floating point formulas"
)]

use chrono::{DateTime, Duration, Utc};
use safety_core::{
    AreaData, AreaStaticAttributes, CommunityReport, IncidentKind, IncidentRecord, ReportKind,
};

/// Default incident look-back, in days.
pub const INCIDENT_WINDOW_DAYS: i64 = 180;
/// Default community report look-back, in days.
pub const REPORT_WINDOW_DAYS: i64 = 30;

const INCIDENT_DECAY_SECONDS: f64 = 30.0 * 24.0 * 3600.0;
const REPORT_DECAY_SECONDS: f64 = 7.0 * 24.0 * 3600.0;
const INCIDENT_PENALTY_SCALE: f64 = 10.0;
const VERIFIED_MULTIPLIER: f64 = 1.5;
const NEUTRAL_COMMUNITY_SCORE: f64 = 70.0;
const MAX_CONFIDENCE: u8 = 100;

fn is_daytime(hour: u8) -> bool {
    (8..18).contains(&hour)
}

/// Score the hour of day.
#[must_use]
pub fn time_of_day(hour: u8) -> f64 {
    match hour {
        8..=17 => 85.0,
        5..=7 => 60.0,
        18..=20 => 55.0,
        _ => 30.0,
    }
}

/// Relative severity of an incident kind.
#[must_use]
pub const fn severity_weight(kind: IncidentKind) -> f64 {
    match kind {
        IncidentKind::Harassment => 1.0,
        IncidentKind::Other => 1.5,
        IncidentKind::Theft => 2.0,
        IncidentKind::Assault => 3.0,
    }
}

fn age_seconds(at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - at).num_seconds().max(0);
    f64::from(i32::try_from(seconds).unwrap_or(i32::MAX))
}

/// Earliest instant inside a look-back `window` ending at `now`.
fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Decay applied to an event of the given age.
fn decay(at: DateTime<Utc>, now: DateTime<Utc>, scale_seconds: f64) -> f64 {
    (-age_seconds(at, now) / scale_seconds).exp()
}

/// Score incident history.
///
/// Each incident inside `window` (180 days by default) subtracts
/// `severity × exp(−age / 30 days) × (1.5 if verified) × 10` from 100.
/// The result never drops below zero.
#[must_use]
pub fn historical_incidents(
    incidents: &[IncidentRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> f64 {
    let cutoff = window_start(now, window);
    let penalty: f64 = incidents
        .iter()
        .filter(|incident| incident.occurred_at >= cutoff)
        .map(|incident| {
            let verified = if incident.verified {
                VERIFIED_MULTIPLIER
            } else {
                1.0
            };
            severity_weight(incident.kind)
                * decay(incident.occurred_at, now, INCIDENT_DECAY_SECONDS)
                * verified
        })
        .sum();
    (100.0 - penalty * INCIDENT_PENALTY_SCALE).max(0.0)
}

/// Score population density, with separate day and night bands.
#[must_use]
pub fn population_density(density: f64, hour: u8) -> f64 {
    let (day, night) = if (1000.0..=5000.0).contains(&density) {
        (90.0, 70.0)
    } else if (500.0..1000.0).contains(&density) {
        (80.0, 60.0)
    } else if density > 5000.0 && density < 10_000.0 {
        (85.0, 65.0)
    } else if density < 500.0 {
        (60.0, 30.0)
    } else {
        (75.0, 55.0)
    };
    if is_daytime(hour) { day } else { night }
}

/// Score lighting: daylight between 06:00 and 18:59, street lights otherwise.
#[must_use]
pub fn lighting(street_light_coverage: f64, hour: u8) -> f64 {
    if (6..=18).contains(&hour) {
        95.0
    } else {
        street_light_coverage
    }
}

/// Score police presence from station distance, patrols and response time.
#[must_use]
pub fn police_presence(attributes: &AreaStaticAttributes) -> f64 {
    let distance = match attributes.police_station_distance_km {
        d if d <= 1.0 => 100.0,
        d if d <= 2.0 => 85.0,
        d if d <= 5.0 => 70.0,
        _ => 50.0,
    };
    let patrols = (attributes.police_patrols_per_week * 10.0).min(100.0);
    let response = match attributes.avg_police_response_minutes {
        r if r <= 5.0 => 100.0,
        r if r <= 10.0 => 85.0,
        r if r <= 20.0 => 70.0,
        _ => 40.0,
    };
    // Tenths keep the 0.4/0.3/0.3 blend exact for whole inputs.
    (distance * 4.0 + patrols * 3.0 + response * 3.0) / 10.0
}

fn normalised_rating(report: &CommunityReport) -> f64 {
    let rating = f64::from(report.rating.get()) * 20.0;
    match report.kind {
        ReportKind::Safe => rating,
        ReportKind::Unsafe => 100.0 - rating,
        ReportKind::Alert => 20.0,
    }
}

/// Score community sentiment.
///
/// Reports younger than `window` (30 days by default) are averaged with
/// weight `exp(−age / 7 days)`. With no such reports the score is a
/// neutral 70.
#[must_use]
pub fn community_reports(
    reports: &[CommunityReport],
    now: DateTime<Utc>,
    window: Duration,
) -> f64 {
    let cutoff = window_start(now, window);
    let (weighted, total) = reports
        .iter()
        .filter(|report| report.occurred_at > cutoff)
        .fold((0.0, 0.0), |(weighted, total), report| {
            let weight = decay(report.occurred_at, now, REPORT_DECAY_SECONDS);
            (weighted + normalised_rating(report) * weight, total + weight)
        });
    if total > 0.0 {
        weighted / total
    } else {
        NEUTRAL_COMMUNITY_SCORE
    }
}

/// Estimate how much real data backs a score.
///
/// This is an additive point scale, not a probability. Fallback data always
/// yields zero.
#[must_use]
pub fn confidence(area: &AreaData) -> u8 {
    if area.is_fallback() {
        return 0;
    }
    let incidents = match area.incidents.len() {
        n if n >= 10 => 30,
        n if n >= 5 => 20,
        n if n >= 1 => 10,
        _ => 0,
    };
    let reports = match area.reports.len() {
        n if n >= 20 => 30,
        n if n >= 10 => 20,
        n if n >= 5 => 10,
        _ => 0,
    };
    let attributes = &area.attributes;
    let response = if attributes.avg_police_response_minutes > 0.0 {
        20
    } else {
        0
    };
    let lights = if attributes.street_light_coverage > 0.0 {
        10
    } else {
        0
    };
    let density = if attributes.population_density > 0.0 {
        10
    } else {
        0
    };
    (incidents + reports + response + lights + density).min(MAX_CONFIDENCE)
}
