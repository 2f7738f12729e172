//! Data access for the safety scoring engine.
//!
//! Responsibilities:
//! - Aggregate the records behind a geocell into an
//!   [`AreaData`](safety_core::AreaData) snapshot ([`AreaDataRepository`]).
//! - Provide the embedded SQLite backend implementing every store trait
//!   ([`SqliteSafetyStore`]).
//!
//! Boundaries:
//! - Do not encode scoring rules (live in `safety-scorer`).
//! - Keep blocking I/O off async executors; SQLite calls run on
//!   `spawn_blocking`.
//!
//! Invariants:
//! - Thread-safe by default where feasible.
//! - No global mutable state.

#![forbid(unsafe_code)]

mod fs;
pub mod repository;
pub mod store;

pub use repository::{AreaDataRepository, RepositoryConfig, RepositoryError};
pub use store::{SqliteSafetyStore, SqliteStoreError};
