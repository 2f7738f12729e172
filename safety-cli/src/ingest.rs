//! Ingest command implementation for the safety CLI.
//!
//! The input file holds a JSON array of tagged records:
//!
//! ```json
//! [
//!   {"type": "incident", "kind": "theft", "occurred_at": "2024-10-01T21:00:00Z",
//!    "location": {"lat": 51.5, "lng": -0.12}, "reporter_id": "user-1"},
//!   {"type": "report", "kind": "safe", "rating": 4, "occurred_at": "2024-10-01T20:00:00Z",
//!    "location": {"lat": 51.5, "lng": -0.12}, "reporter_id": "user-2"},
//!   {"type": "verify", "id": "1", "verified": true},
//!   {"type": "area", "location": {"lat": 51.5, "lng": -0.12},
//!    "attributes": {"street_light_coverage": 40.0}}
//! ]
//! ```
//!
//! Records are applied in order; the first failure aborts the run.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use safety_core::{
    CommunityReport, Coordinate, GeocellId, IncidentRecord, NewCommunityReport, NewIncident,
    StoredAreaAttributes,
};
use safety_service::ScoreEngine;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_INGEST_FILE, ARG_UTC_OFFSET, CliError, ENV_INGEST_DATABASE, ENV_INGEST_FILE,
    open_engine, runtime, write_json,
};

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply a JSON array of incidents, community reports, \
                 verification changes and area attribute updates to the \
                 database. Every write invalidates the cached scores of the \
                 affected geocell.",
    about = "Store safety records"
)]
#[ortho_config(prefix = "SAFETY")]
pub(crate) struct IngestArgs {
    /// Path to a JSON file containing the records.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) file: Option<Utf8PathBuf>,
    /// SQLite database holding records, cache and history.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Offset of the local clock from UTC.
    #[arg(long = ARG_UTC_OFFSET, value_name = "minutes", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) utc_offset_minutes: Option<i32>,
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestConfig {
    pub(crate) file: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) utc_offset_minutes: i32,
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let file = args.file.ok_or(CliError::MissingArgument {
            field: ARG_INGEST_FILE,
            env: ENV_INGEST_FILE,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_INGEST_DATABASE,
        })?;
        Ok(Self {
            file,
            database,
            utc_offset_minutes: args.utc_offset_minutes.unwrap_or_default(),
        })
    }
}

/// One entry of an ingest file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum IngestRecord {
    Incident(NewIncident),
    Report(NewCommunityReport),
    Verify {
        id: String,
        verified: bool,
    },
    Area {
        location: Coordinate,
        #[serde(default)]
        attributes: StoredAreaAttributes,
    },
}

/// What applying one [`IngestRecord`] produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum IngestOutcome {
    Incident {
        geocell: GeocellId,
        record: IncidentRecord,
    },
    Report {
        geocell: GeocellId,
        record: CommunityReport,
    },
    Verify {
        id: String,
        geocell: Option<GeocellId>,
    },
    Area {
        geocell: GeocellId,
    },
}

pub(super) fn run_ingest(args: IngestArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = IngestConfig::try_from(merged)?;
    run_ingest_with(&config, writer)
}

pub(super) fn run_ingest_with(
    config: &IngestConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let records = load_records(&config.file)?;
    let engine = open_engine(&config.database, config.utc_offset_minutes)?;
    let runtime = runtime()?;
    let outcomes = runtime.block_on(apply_all(&engine, records))?;
    info!("applied {} records from {}", outcomes.len(), config.file);
    write_json(writer, &outcomes)
}

pub(crate) fn load_records(path: &Utf8Path) -> Result<Vec<IngestRecord>, CliError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        CliError::OpenIngestFile {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseIngestFile {
        path: path.to_path_buf(),
        source,
    })
}

async fn apply_all(
    engine: &ScoreEngine,
    records: Vec<IngestRecord>,
) -> Result<Vec<IngestOutcome>, CliError> {
    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        outcomes.push(apply(engine, record).await?);
    }
    Ok(outcomes)
}

async fn apply(engine: &ScoreEngine, record: IngestRecord) -> Result<IngestOutcome, CliError> {
    let outcome = match record {
        IngestRecord::Incident(incident) => {
            let geocell = engine.geocell_for(incident.location);
            let record = engine.record_incident(incident).await?;
            IngestOutcome::Incident { geocell, record }
        }
        IngestRecord::Report(report) => {
            let geocell = engine.geocell_for(report.location);
            let record = engine.record_report(report).await?;
            IngestOutcome::Report { geocell, record }
        }
        IngestRecord::Verify { id, verified } => {
            let geocell = engine.set_incident_verified(&id, verified).await?;
            IngestOutcome::Verify { id, geocell }
        }
        IngestRecord::Area {
            location,
            attributes,
        } => {
            let geocell = engine.set_area_attributes(location, attributes).await?;
            IngestOutcome::Area { geocell }
        }
    };
    Ok(outcome)
}
