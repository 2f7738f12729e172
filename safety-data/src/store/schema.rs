#![forbid(unsafe_code)]

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::SqliteStoreError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the tables, indexes and version marker if they are missing.
///
/// Existing databases must already carry [`SCHEMA_VERSION`]; mismatches are
/// rejected so migrations can be applied explicitly.
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SqliteStoreError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_record_tables(&transaction)?;
    create_engine_tables(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SqliteStoreError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_record_tables(transaction: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    run_migration_step(
        transaction,
        "create incidents",
        "CREATE TABLE IF NOT EXISTS incidents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            geocell TEXT NOT NULL,
            kind TEXT NOT NULL,
            occurred_at INTEGER NOT NULL,
            lat REAL NOT NULL,
            lng REAL NOT NULL,
            severity REAL NOT NULL DEFAULT 0,
            verified INTEGER NOT NULL DEFAULT 0,
            reporter_id TEXT NOT NULL,
            description TEXT
        )",
    )?;
    run_migration_step(
        transaction,
        "index incidents",
        "CREATE INDEX IF NOT EXISTS idx_incidents_geocell_time
            ON incidents(geocell, occurred_at DESC)",
    )?;
    run_migration_step(
        transaction,
        "create community_reports",
        "CREATE TABLE IF NOT EXISTS community_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            geocell TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            occurred_at INTEGER NOT NULL,
            kind TEXT NOT NULL,
            comment TEXT,
            reporter_id TEXT NOT NULL,
            lat REAL NOT NULL,
            lng REAL NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "index community_reports",
        "CREATE INDEX IF NOT EXISTS idx_community_reports_geocell_time
            ON community_reports(geocell, occurred_at DESC)",
    )?;
    run_migration_step(
        transaction,
        "create area_static",
        "CREATE TABLE IF NOT EXISTS area_static (
            geocell TEXT PRIMARY KEY,
            population_density REAL,
            street_light_coverage REAL,
            police_station_distance_km REAL,
            police_patrols_per_week REAL,
            avg_police_response_minutes REAL,
            updated_at INTEGER
        ) WITHOUT ROWID",
    )
}

fn create_engine_tables(transaction: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    run_migration_step(
        transaction,
        "create score_cache",
        "CREATE TABLE IF NOT EXISTS score_cache (
            geocell TEXT NOT NULL,
            hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
            score TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            epoch INTEGER NOT NULL,
            PRIMARY KEY (geocell, hour)
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create cache_epochs",
        "CREATE TABLE IF NOT EXISTS cache_epochs (
            geocell TEXT PRIMARY KEY,
            epoch INTEGER NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create score_history",
        "CREATE TABLE IF NOT EXISTS score_history (
            geocell TEXT NOT NULL,
            day TEXT NOT NULL,
            bucket TEXT NOT NULL,
            PRIMARY KEY (geocell, day)
        ) WITHOUT ROWID",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    run_migration_step(
        transaction,
        "create safety_schema_version",
        "CREATE TABLE IF NOT EXISTS safety_schema_version (version INTEGER NOT NULL)",
    )?;
    let found: Option<i64> = transaction
        .query_row("SELECT version FROM safety_schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|source| SqliteStoreError::Migration {
            step: "read schema version",
            source,
        })?;
    match found {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(SqliteStoreError::UnsupportedVersion {
            found: version,
            expected: SCHEMA_VERSION,
        }),
        None => transaction
            .execute(
                "INSERT INTO safety_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SqliteStoreError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SqliteStoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SqliteStoreError::Migration { step, source })
}
