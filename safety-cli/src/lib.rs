//! Command-line interface for the safety scoring engine.
//!
//! Every command opens (or creates) a SQLite database, builds a
//! [`ScoreEngine`] over it and prints JSON to stdout. History writes run
//! inline because the process exits right after scoring.
#![forbid(unsafe_code)]

use std::{io::Write, sync::Arc};

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use safety_data::SqliteSafetyStore;
use safety_service::{EngineConfig, HistoryMode, ScoreEngine};
use serde::Serialize;

mod error;
mod history;
mod ingest;
mod score;

pub use error::CliError;

const ARG_DATABASE: &str = "database";
const ARG_LAT: &str = "lat";
const ARG_LNG: &str = "lng";
const ARG_AT: &str = "at";
const ARG_GEOCELL: &str = "geocell";
const ARG_DATE: &str = "date";
const ARG_UNTIL: &str = "until";
const ARG_UTC_OFFSET: &str = "utc-offset-minutes";
const ARG_INGEST_FILE: &str = "file";
const ENV_SCORE_DATABASE: &str = "SAFETY_CMDS_SCORE_DATABASE";
const ENV_SCORE_LAT: &str = "SAFETY_CMDS_SCORE_LAT";
const ENV_SCORE_LNG: &str = "SAFETY_CMDS_SCORE_LNG";
const ENV_HISTORY_DATABASE: &str = "SAFETY_CMDS_HISTORY_DATABASE";
const ENV_HISTORY_GEOCELL: &str = "SAFETY_CMDS_HISTORY_GEOCELL";
const ENV_HISTORY_DATE: &str = "SAFETY_CMDS_HISTORY_DATE";
const ENV_INGEST_DATABASE: &str = "SAFETY_CMDS_INGEST_DATABASE";
const ENV_INGEST_FILE: &str = "SAFETY_CMDS_INGEST_FILE";

/// Run the safety CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration, the database or the
/// engine fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Score(args) => score::run_score(args, &mut stdout),
        Command::History(args) => history::run_history(args, &mut stdout),
        Command::Ingest(args) => ingest::run_ingest(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "safety",
    about = "Score locations and manage safety records in a SQLite database",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute (or serve from cache) the safety score of a location.
    Score(score::ScoreArgs),
    /// Show the recorded score history of a geocell.
    History(history::HistoryArgs),
    /// Store an incident, community report, verification or area update.
    Ingest(ingest::IngestArgs),
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

fn open_engine(database: &Utf8Path, utc_offset_minutes: i32) -> Result<ScoreEngine, CliError> {
    let store = SqliteSafetyStore::open(database).map_err(|source| CliError::OpenDatabase {
        path: database.to_path_buf(),
        source,
    })?;
    let config = EngineConfig {
        utc_offset_minutes,
        history_mode: HistoryMode::Inline,
        ..EngineConfig::default()
    };
    Ok(ScoreEngine::with_store(Arc::new(store), config)?)
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
