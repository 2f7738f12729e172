//! Incident, community report and static attribute persistence.
#![forbid(unsafe_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use safety_core::{
    AreaRecordSink, AreaRecordSource, CommunityReport, Coordinate, GeocellId, IncidentRecord,
    NewCommunityReport, NewIncident, Rating, StoreError, StoredAreaAttributes,
};

use super::{SqliteSafetyStore, from_millis, sql_error, to_millis, to_sql_limit};

const SELECT_INCIDENTS_SQL: &str = "SELECT id, kind, occurred_at, lat, lng, severity, verified, \
     reporter_id, description FROM incidents \
     WHERE geocell = ?1 AND occurred_at >= ?2 ORDER BY occurred_at DESC LIMIT ?3";
const SELECT_REPORTS_SQL: &str = "SELECT id, rating, occurred_at, kind, comment, reporter_id, \
     lat, lng FROM community_reports \
     WHERE geocell = ?1 AND occurred_at >= ?2 ORDER BY occurred_at DESC LIMIT ?3";
const SELECT_AREA_SQL: &str = "SELECT population_density, street_light_coverage, \
     police_station_distance_km, police_patrols_per_week, avg_police_response_minutes, \
     updated_at FROM area_static WHERE geocell = ?1";

fn corrupt(entity: &'static str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        entity,
        reason: reason.to_string(),
    }
}

fn location(entity: &'static str, lat: f64, lng: f64) -> Result<Coordinate, StoreError> {
    Coordinate::new(lat, lng).map_err(|err| corrupt(entity, err))
}

struct IncidentRow {
    id: i64,
    kind: String,
    occurred_at: i64,
    lat: f64,
    lng: f64,
    severity: f64,
    verified: bool,
    reporter_id: String,
    description: Option<String>,
}

impl IncidentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            occurred_at: row.get(2)?,
            lat: row.get(3)?,
            lng: row.get(4)?,
            severity: row.get(5)?,
            verified: row.get(6)?,
            reporter_id: row.get(7)?,
            description: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<IncidentRecord, StoreError> {
        Ok(IncidentRecord {
            id: self.id.to_string(),
            kind: self.kind.parse().map_err(|err| corrupt("incident", err))?,
            occurred_at: from_millis("incident", self.occurred_at)?,
            location: location("incident", self.lat, self.lng)?,
            severity: self.severity,
            verified: self.verified,
            reporter_id: self.reporter_id,
            description: self.description,
        })
    }
}

struct ReportRow {
    id: i64,
    rating: i64,
    occurred_at: i64,
    kind: String,
    comment: Option<String>,
    reporter_id: String,
    lat: f64,
    lng: f64,
}

impl ReportRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            rating: row.get(1)?,
            occurred_at: row.get(2)?,
            kind: row.get(3)?,
            comment: row.get(4)?,
            reporter_id: row.get(5)?,
            lat: row.get(6)?,
            lng: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<CommunityReport, StoreError> {
        let rating = u8::try_from(self.rating)
            .map_err(|err| corrupt("community report", err))
            .and_then(|value| Rating::new(value).map_err(|err| corrupt("community report", err)))?;
        Ok(CommunityReport {
            id: self.id.to_string(),
            rating,
            occurred_at: from_millis("community report", self.occurred_at)?,
            kind: self
                .kind
                .parse()
                .map_err(|err| corrupt("community report", err))?,
            comment: self.comment,
            reporter_id: self.reporter_id,
            location: location("community report", self.lat, self.lng)?,
        })
    }
}

#[async_trait]
impl AreaRecordSource for SqliteSafetyStore {
    async fn recent_incidents(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<IncidentRecord>, StoreError> {
        let cell = geocell.to_string();
        self.run("recent_incidents", move |connection| {
            let mut statement = connection
                .prepare_cached(SELECT_INCIDENTS_SQL)
                .map_err(sql_error("prepare incident query"))?;
            let rows = statement
                .query_map(
                    params![cell, to_millis(since), to_sql_limit(limit)],
                    IncidentRow::read,
                )
                .map_err(sql_error("query incidents"))?;
            rows.map(|row| row.map_err(sql_error("read incident row"))?.into_record())
                .collect()
        })
        .await
    }

    async fn recent_reports(
        &self,
        geocell: &GeocellId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CommunityReport>, StoreError> {
        let cell = geocell.to_string();
        self.run("recent_reports", move |connection| {
            let mut statement = connection
                .prepare_cached(SELECT_REPORTS_SQL)
                .map_err(sql_error("prepare report query"))?;
            let rows = statement
                .query_map(
                    params![cell, to_millis(since), to_sql_limit(limit)],
                    ReportRow::read,
                )
                .map_err(sql_error("query community reports"))?;
            rows.map(|row| row.map_err(sql_error("read report row"))?.into_record())
                .collect()
        })
        .await
    }

    async fn area_attributes(
        &self,
        geocell: &GeocellId,
    ) -> Result<Option<StoredAreaAttributes>, StoreError> {
        let cell = geocell.to_string();
        self.run("area_attributes", move |connection| {
            let row = connection
                .query_row(SELECT_AREA_SQL, [cell], |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                })
                .optional()
                .map_err(sql_error("query area attributes"))?;
            let Some((density, lights, distance, patrols, response, updated_at)) = row else {
                return Ok(None);
            };
            Ok(Some(StoredAreaAttributes {
                population_density: density,
                street_light_coverage: lights,
                police_station_distance_km: distance,
                police_patrols_per_week: patrols,
                avg_police_response_minutes: response,
                updated_at: updated_at
                    .map(|millis| from_millis("area attributes", millis))
                    .transpose()?,
            }))
        })
        .await
    }
}

#[async_trait]
impl AreaRecordSink for SqliteSafetyStore {
    async fn insert_incident(
        &self,
        geocell: &GeocellId,
        incident: NewIncident,
    ) -> Result<IncidentRecord, StoreError> {
        let cell = geocell.to_string();
        self.run("insert_incident", move |connection| {
            connection
                .execute(
                    "INSERT INTO incidents (geocell, kind, occurred_at, lat, lng, severity, \
                     verified, reporter_id, description) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        cell,
                        incident.kind.as_str(),
                        to_millis(incident.occurred_at),
                        incident.location.lat(),
                        incident.location.lng(),
                        incident.severity,
                        incident.verified,
                        incident.reporter_id,
                        incident.description,
                    ],
                )
                .map_err(sql_error("insert incident"))?;
            let id = connection.last_insert_rowid();
            Ok(incident.into_record(id.to_string()))
        })
        .await
    }

    async fn insert_report(
        &self,
        geocell: &GeocellId,
        report: NewCommunityReport,
    ) -> Result<CommunityReport, StoreError> {
        let cell = geocell.to_string();
        self.run("insert_report", move |connection| {
            connection
                .execute(
                    "INSERT INTO community_reports (geocell, rating, occurred_at, kind, comment, \
                     reporter_id, lat, lng) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        cell,
                        report.rating.get(),
                        to_millis(report.occurred_at),
                        report.kind.as_str(),
                        report.comment,
                        report.reporter_id,
                        report.location.lat(),
                        report.location.lng(),
                    ],
                )
                .map_err(sql_error("insert community report"))?;
            let id = connection.last_insert_rowid();
            Ok(report.into_record(id.to_string()))
        })
        .await
    }

    async fn set_incident_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<GeocellId>, StoreError> {
        let Ok(row_id) = id.parse::<i64>() else {
            return Ok(None);
        };
        self.run("set_incident_verified", move |connection| {
            let cell: Option<String> = connection
                .query_row(
                    "UPDATE incidents SET verified = ?2 WHERE id = ?1 RETURNING geocell",
                    params![row_id, verified],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error("update incident verification"))?;
            cell.map(|raw| GeocellId::parse(&raw).map_err(|err| corrupt("incident", err)))
                .transpose()
        })
        .await
    }

    async fn upsert_area_attributes(
        &self,
        geocell: &GeocellId,
        attributes: StoredAreaAttributes,
    ) -> Result<(), StoreError> {
        let cell = geocell.to_string();
        self.run("upsert_area_attributes", move |connection| {
            connection
                .execute(
                    "INSERT INTO area_static (geocell, population_density, \
                     street_light_coverage, police_station_distance_km, \
                     police_patrols_per_week, avg_police_response_minutes, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(geocell) DO UPDATE SET \
                     population_density = excluded.population_density, \
                     street_light_coverage = excluded.street_light_coverage, \
                     police_station_distance_km = excluded.police_station_distance_km, \
                     police_patrols_per_week = excluded.police_patrols_per_week, \
                     avg_police_response_minutes = excluded.avg_police_response_minutes, \
                     updated_at = excluded.updated_at",
                    params![
                        cell,
                        attributes.population_density,
                        attributes.street_light_coverage,
                        attributes.police_station_distance_km,
                        attributes.police_patrols_per_week,
                        attributes.avg_police_response_minutes,
                        attributes.updated_at.map(to_millis),
                    ],
                )
                .map(|_| ())
                .map_err(sql_error("upsert area attributes"))
        })
        .await
    }
}
