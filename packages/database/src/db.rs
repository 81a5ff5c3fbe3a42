//! Database connection utilities.

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::{Credentials, init_sqlite_rusqlite};

use crate::DbError;

/// `SQLite` file used when `DATABASE_URL` is not set.
pub const DEFAULT_SQLITE_PATH: &str = "data/red_zone.db";

/// Creates a new database connection from the `DATABASE_URL` environment
/// variable.
///
/// `postgres://` and `postgresql://` URLs connect to `PostgreSQL`;
/// `sqlite://<path>` opens (or creates) a `SQLite` file. With no
/// `DATABASE_URL` the `SQLite` file at [`DEFAULT_SQLITE_PATH`] is used.
///
/// # Errors
///
/// Returns [`DbError`] if the URL scheme is unsupported or the connection
/// fails.
pub async fn connect_from_env() -> Result<Box<dyn Database>, DbError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => connect(url.trim()).await,
        _ => open_sqlite(Path::new(DEFAULT_SQLITE_PATH)),
    }
}

/// Connects to the database identified by `url`.
///
/// # Errors
///
/// Returns [`DbError`] if the URL scheme is unsupported or the connection
/// fails.
pub async fn connect(url: &str) -> Result<Box<dyn Database>, DbError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return connect_postgres(url).await;
    }

    if let Some(path) = url.strip_prefix("sqlite://") {
        return open_sqlite(Path::new(path));
    }

    Err(DbError::Connection {
        message: format!("Unsupported DATABASE_URL scheme: {url}"),
    })
}

async fn connect_postgres(url: &str) -> Result<Box<dyn Database>, DbError> {
    // Strip query parameters (e.g., ?sslmode=require) that the Credentials
    // parser doesn't understand.
    let url_base = url.split('?').next().unwrap_or(url);

    let creds = Credentials::from_url(url_base).map_err(|e| DbError::Connection {
        message: e.to_string(),
    })?;
    let db = switchy_database_connection::init_postgres_raw_native_tls(creds)
        .await
        .map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?;

    db.exec_raw("SET statement_timeout = '30s'").await?;

    log::info!("Connected to PostgreSQL");
    Ok(db)
}

/// Opens (or creates) a `SQLite` database file, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`DbError`] if the directory or database cannot be created.
pub fn open_sqlite(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Connection {
            message: format!("Failed to create {}: {e}", parent.display()),
        })?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection {
        message: e.to_string(),
    })?;

    log::info!("Opened SQLite database at {}", path.display());
    Ok(db)
}
