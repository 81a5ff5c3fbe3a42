#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database connection, schema, and queries for red zones and incidents.
//!
//! Uses `switchy_database` so the same raw SQL runs against `PostgreSQL`
//! in production and `SQLite` for local runs and tests. The schema sticks
//! to types both backends understand: timestamps are fixed-width RFC 3339
//! text, booleans are integers, and image references are a JSON array in a
//! text column.

pub mod db;
pub mod queries;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use switchy_database::Database;

pub use store::DatabaseZoneStore;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Connection could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS red_zones (
        id              TEXT PRIMARY KEY,
        seq             BIGINT NOT NULL,
        name            TEXT NOT NULL,
        latitude        DOUBLE PRECISION NOT NULL,
        longitude       DOUBLE PRECISION NOT NULL,
        incident_count  BIGINT NOT NULL DEFAULT 0,
        risk_level      TEXT NOT NULL DEFAULT 'low',
        last_incident   TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_red_zones_seq ON red_zones (seq)",
    "CREATE TABLE IF NOT EXISTS incidents (
        id           TEXT PRIMARY KEY,
        seq          BIGINT NOT NULL,
        user_id      TEXT NOT NULL,
        title        TEXT,
        description  TEXT NOT NULL DEFAULT '',
        severity     TEXT NOT NULL DEFAULT 'Low',
        latitude     DOUBLE PRECISION NOT NULL,
        longitude    DOUBLE PRECISION NOT NULL,
        image_urls   TEXT NOT NULL DEFAULT '[]',
        anonymous    BIGINT NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL,
        red_zone_id  TEXT NOT NULL REFERENCES red_zones (id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_incidents_user ON incidents (user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_zone ON incidents (red_zone_id)",
];

/// Creates the `red_zones` and `incidents` tables and their indexes if they
/// don't already exist.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    for statement in SCHEMA {
        db.exec_raw(statement).await?;
    }
    log::info!("Database schema is up to date");
    Ok(())
}
