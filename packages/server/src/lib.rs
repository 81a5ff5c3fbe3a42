#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the red zone application.
//!
//! Serves the zone list for the map, the taxonomy for the submission form,
//! a user's own reports, and report submission. Authentication happens in
//! front of this server; the authenticated user id arrives in the
//! [`USER_ID_HEADER`] request header.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use red_zone_database::{DatabaseZoneStore, db, ensure_schema};
use red_zone_reconciler::{Clock, SystemClock};
use switchy_database::Database;

/// Header carrying the id of the authenticated user.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Shared application state.
pub struct AppState {
    /// Database connection for direct queries.
    pub db: Arc<dyn Database>,
    /// Zone and incident storage used by the reconciler.
    pub store: DatabaseZoneStore,
    /// Time source stamped on new incidents.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Builds the state around an open connection using the wall clock.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            store: DatabaseZoneStore::new(db.clone()),
            db,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Listener settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`, default `127.0.0.1`).
    pub bind_addr: String,
    /// Port to bind (`PORT`, default `8080`).
    pub port: u16,
}

impl ServerConfig {
    /// Reads `BIND_ADDR` and `PORT`, falling back to defaults for missing
    /// or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("BIND_ADDR").ok(),
            std::env::var("PORT").ok(),
        )
    }

    fn from_vars(bind_addr: Option<String>, port: Option<String>) -> Self {
        Self {
            bind_addr: bind_addr
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: port.and_then(|p| p.trim().parse().ok()).unwrap_or(8080),
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error));
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/categories", web::get().to(handlers::categories))
            .route("/red_zones", web::get().to(handlers::red_zones))
            .route("/red_zones/{id}", web::get().to(handlers::red_zone))
            .route("/incidents", web::get().to(handlers::my_incidents))
            .route("/incidents", web::post().to(handlers::submit_incident)),
    );
}

/// Starts the red zone API server.
///
/// Connects to the database named by `DATABASE_URL`, creates the schema if
/// needed, and serves until shut down. The caller provides the async
/// runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Error` if the database cannot be opened or
/// prepared, or if the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(std::io::Error::other)?;

    log::info!("Ensuring schema...");
    ensure_schema(db_conn.as_ref())
        .await
        .map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState::new(Arc::from(db_conn)));
    let config = ServerConfig::from_env();

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
