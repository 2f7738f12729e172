//! History command implementation for the safety CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use safety_core::GeocellId;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_DATE, ARG_GEOCELL, ARG_UNTIL, CliError, ENV_HISTORY_DATABASE,
    ENV_HISTORY_DATE, ENV_HISTORY_GEOCELL, open_engine, runtime, write_json,
};

/// CLI arguments for the `history` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the hourly score history recorded for a geocell. \
                 With --until, every bucket between the two dates is printed \
                 oldest first; otherwise the single bucket (or null).",
    about = "Show score history for a geocell"
)]
#[ortho_config(prefix = "SAFETY")]
pub(crate) struct HistoryArgs {
    /// SQLite database holding records, cache and history.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Geohash of the cell.
    #[arg(long = ARG_GEOCELL, value_name = "geohash")]
    #[serde(default)]
    pub(crate) geocell: Option<String>,
    /// Local calendar date (`YYYY-MM-DD`).
    #[arg(long = ARG_DATE, value_name = "date")]
    #[serde(default)]
    pub(crate) date: Option<String>,
    /// Last date of an inclusive range.
    #[arg(long = ARG_UNTIL, value_name = "date")]
    #[serde(default)]
    pub(crate) until: Option<String>,
}

/// Resolved `history` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) geocell: GeocellId,
    pub(crate) date: NaiveDate,
    pub(crate) until: Option<NaiveDate>,
}

impl TryFrom<HistoryArgs> for HistoryConfig {
    type Error = CliError;

    fn try_from(args: HistoryArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_HISTORY_DATABASE,
        })?;
        let raw_cell = args.geocell.ok_or(CliError::MissingArgument {
            field: ARG_GEOCELL,
            env: ENV_HISTORY_GEOCELL,
        })?;
        let geocell = raw_cell
            .parse::<GeocellId>()
            .map_err(|source| CliError::InvalidGeocell {
                value: raw_cell.clone(),
                source,
            })?;
        let raw_date = args.date.ok_or(CliError::MissingArgument {
            field: ARG_DATE,
            env: ENV_HISTORY_DATE,
        })?;
        let date = parse_date(ARG_DATE, &raw_date)?;
        let until = args
            .until
            .as_deref()
            .map(|value| parse_date(ARG_UNTIL, value))
            .transpose()?;
        Ok(Self {
            database,
            geocell,
            date,
            until,
        })
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| CliError::InvalidDate {
        field,
        value: value.to_owned(),
        source,
    })
}

pub(super) fn run_history(args: HistoryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = HistoryConfig::try_from(merged)?;
    run_history_with(&config, writer)
}

pub(super) fn run_history_with(
    config: &HistoryConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    // Stored buckets are keyed by date only, so the clock offset is irrelevant.
    let engine = open_engine(&config.database, 0)?;
    let runtime = runtime()?;
    if let Some(until) = config.until {
        let buckets =
            runtime.block_on(engine.history_range(&config.geocell, config.date, until))?;
        write_json(writer, &buckets)
    } else {
        let bucket = runtime.block_on(engine.history(&config.geocell, config.date))?;
        write_json(writer, &bucket)
    }
}
