//! SQLite backend for every store trait.
//!
//! A single connection guarded by a mutex serves all operations. Calls run
//! on Tokio's blocking pool so the async executor never waits on disk I/O.
//! Scores and history buckets are stored as JSON documents; records and
//! static attributes use typed columns so collaborators can write them with
//! plain SQL.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use safety_core::StoreError;
use thiserror::Error;

use crate::fs::ensure_parent_dir;

mod cache;
mod history;
mod records;
mod schema;

pub use schema::SCHEMA_VERSION;

/// Errors raised while opening a [`SqliteSafetyStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Creating the parent directory for the database failed.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Database path whose parent could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Requested database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A schema migration step failed.
    #[error("failed to apply schema step {step}")]
    Migration {
        /// Description of the failed step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database was created by an incompatible version.
    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version recorded in the database.
        found: i64,
        /// Version this build understands.
        expected: i64,
    },
}

/// SQLite-backed implementation of the record, cache and history stores.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Debug, Clone)]
pub struct SqliteSafetyStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSafetyStore {
    /// Open (creating if needed) a database on disk and apply the schema.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] when the directory cannot be created, the
    /// database cannot be opened or the schema cannot be applied.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(path).map_err(|source| SqliteStoreError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] when the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory().map_err(|source| SqliteStoreError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, SqliteStoreError> {
        schema::initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run `work` against the connection on the blocking pool.
    async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| StoreError::Poisoned { operation })?;
            work(&mut guard)
        })
        .await
        .map_err(|source| StoreError::backend(operation, source))?
    }
}

fn sql_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::backend(operation, source)
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(entity: &'static str, millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        entity,
        reason: format!("timestamp {millis} is out of range"),
    })
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests;
