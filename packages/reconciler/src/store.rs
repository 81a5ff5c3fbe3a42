//! Collaborators the reconciler reads from and writes to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use red_zone_zone_models::{IncidentReport, Zone};
use thiserror::Error;

/// Failure reported by a [`ZoneStore`] implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    /// What went wrong, in the store's own words.
    pub message: String,
}

impl StoreError {
    /// Wraps any displayable error.
    #[must_use]
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Record storage for zones and incidents.
///
/// `upsert_zone` is a plain overwrite of the whole record. Two submissions
/// that read the same zone concurrently can therefore lose one increment.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Returns every zone, in the order they were created.
    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError>;

    /// Creates or overwrites a zone by id and returns the stored record.
    async fn upsert_zone(&self, zone: &Zone) -> Result<Zone, StoreError>;

    /// Appends an incident and returns the stored record.
    async fn insert_incident(&self, incident: &IncidentReport)
    -> Result<IncidentReport, StoreError>;

    /// Returns a user's own incidents, newest first.
    async fn list_incidents_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<IncidentReport>, StoreError>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
