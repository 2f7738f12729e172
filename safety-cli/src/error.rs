//! Error types emitted by the safety CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use safety_core::GeocellParseError;
use safety_data::SqliteStoreError;
use safety_service::EngineError;
use thiserror::Error;

/// Errors emitted by the safety CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// `--at` was not an RFC 3339 timestamp.
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A date flag was not `YYYY-MM-DD`.
    #[error("invalid {field} date {value:?}: {source}")]
    InvalidDate {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// `--geocell` was not a geohash.
    #[error("invalid geocell {value:?}: {source}")]
    InvalidGeocell {
        value: String,
        #[source]
        source: GeocellParseError,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open database {path:?}: {source}")]
    OpenDatabase {
        path: Utf8PathBuf,
        #[source]
        source: SqliteStoreError,
    },
    /// Starting the async runtime failed.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The engine rejected the request or its store failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Opening the ingest file failed.
    #[error("failed to open ingest file {path:?}: {source}")]
    OpenIngestFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The ingest file was not a valid record document.
    #[error("failed to parse ingest file {path:?}: {source}")]
    ParseIngestFile {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
