//! [`ZoneStore`] backed by a `switchy_database` connection.

use std::sync::Arc;

use async_trait::async_trait;
use red_zone_reconciler::{StoreError, ZoneStore};
use red_zone_zone_models::{IncidentReport, Zone};
use switchy_database::Database;

use crate::queries;

/// Zone and incident storage on a shared database connection.
#[derive(Clone)]
pub struct DatabaseZoneStore {
    db: Arc<dyn Database>,
}

impl DatabaseZoneStore {
    /// Wraps an open connection. The schema must already exist.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ZoneStore for DatabaseZoneStore {
    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        queries::list_zones(self.db.as_ref())
            .await
            .map_err(StoreError::new)
    }

    async fn upsert_zone(&self, zone: &Zone) -> Result<Zone, StoreError> {
        queries::upsert_zone(self.db.as_ref(), zone)
            .await
            .map_err(StoreError::new)?;
        Ok(zone.clone())
    }

    async fn insert_incident(
        &self,
        incident: &IncidentReport,
    ) -> Result<IncidentReport, StoreError> {
        queries::insert_incident(self.db.as_ref(), incident)
            .await
            .map_err(StoreError::new)?;
        Ok(incident.clone())
    }

    async fn list_incidents_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<IncidentReport>, StoreError> {
        queries::list_incidents_for_user(self.db.as_ref(), user_id)
            .await
            .map_err(StoreError::new)
    }
}
