//! Score command implementation for the safety CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::Parser;
use log::debug;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use safety_core::SafetyScore;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_AT, ARG_DATABASE, ARG_LAT, ARG_LNG, ARG_UTC_OFFSET, CliError, ENV_SCORE_DATABASE,
    ENV_SCORE_LAT, ENV_SCORE_LNG, open_engine, runtime, write_json,
};

/// CLI arguments for the `score` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Compute the safety score of a coordinate. Scores are served \
                 from the database cache when a fresh entry exists for the \
                 coordinate's geocell and local hour; otherwise the area's \
                 incidents, reports and attributes are loaded and scored.",
    about = "Score a location"
)]
#[ortho_config(prefix = "SAFETY")]
pub(crate) struct ScoreArgs {
    /// SQLite database holding records, cache and history.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Latitude in decimal degrees.
    #[arg(long = ARG_LAT, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude in decimal degrees.
    #[arg(long = ARG_LNG, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lng: Option<f64>,
    /// RFC 3339 instant to score at; defaults to now.
    #[arg(long = ARG_AT, value_name = "timestamp")]
    #[serde(default)]
    pub(crate) at: Option<String>,
    /// Offset of the local clock from UTC.
    #[arg(long = ARG_UTC_OFFSET, value_name = "minutes", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) utc_offset_minutes: Option<i32>,
}

/// Resolved `score` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) lat: f64,
    pub(crate) lng: f64,
    pub(crate) at: Option<DateTime<Utc>>,
    pub(crate) utc_offset_minutes: i32,
}

impl TryFrom<ScoreArgs> for ScoreConfig {
    type Error = CliError;

    fn try_from(args: ScoreArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SCORE_DATABASE,
        })?;
        let lat = args.lat.ok_or(CliError::MissingArgument {
            field: ARG_LAT,
            env: ENV_SCORE_LAT,
        })?;
        let lng = args.lng.ok_or(CliError::MissingArgument {
            field: ARG_LNG,
            env: ENV_SCORE_LNG,
        })?;
        let at = args.at.as_deref().map(parse_instant).transpose()?;
        Ok(Self {
            database,
            lat,
            lng,
            at,
            utc_offset_minutes: args.utc_offset_minutes.unwrap_or_default(),
        })
    }
}

pub(crate) fn parse_instant(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|source| CliError::InvalidTimestamp {
            value: value.to_owned(),
            source,
        })
}

pub(super) fn run_score(args: ScoreArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ScoreConfig::try_from(merged)?;
    run_score_with(&config, writer)
}

pub(super) fn run_score_with(config: &ScoreConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let score = execute_score(config)?;
    write_json(writer, &score)
}

fn execute_score(config: &ScoreConfig) -> Result<SafetyScore, CliError> {
    let engine = open_engine(&config.database, config.utc_offset_minutes)?;
    let now = config.at.unwrap_or_else(Utc::now);
    debug!("scoring ({}, {}) at {now}", config.lat, config.lng);
    let runtime = runtime()?;
    Ok(runtime.block_on(engine.score_at(config.lat, config.lng, now))?)
}
