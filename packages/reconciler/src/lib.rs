#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reconciles submitted incident reports into red zones.
//!
//! A new report is matched against the existing zones by haversine
//! distance. The first zone (in the order supplied) whose center lies
//! strictly within 1 km of the report absorbs it: its incident count goes
//! up by one and its risk tier is re-derived. When no zone is close enough
//! a new single-incident zone is created at the report's coordinates.
//!
//! Matching is first-match-under-threshold in scan order, not nearest
//! match. A closer zone appearing later in the list is ignored.
//!
//! [`reconcile`] does no I/O and produces the write set; [`submit_report`]
//! drives it against a [`ZoneStore`]. The zone write and the incident
//! write are not atomic and a failed incident insert is not compensated.

pub mod distance;
pub mod store;

use chrono::{DateTime, Utc};
use red_zone_zone_models::{IncidentReport, NewIncident, Zone};
use thiserror::Error;

pub use distance::{Coordinates, ZONE_RADIUS_METERS, haversine_meters};
pub use store::{Clock, StoreError, SystemClock, ZoneStore};

/// Errors from reconciling or submitting a report.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Latitude or longitude is not a finite number.
    #[error("Invalid coordinate value: {value:?}")]
    InvalidCoordinates {
        /// The rejected input.
        value: String,
    },

    /// An explicitly selected zone is not among the known zones.
    #[error("Zone not found: {id}")]
    ZoneNotFound {
        /// The requested zone id.
        id: String,
    },

    /// No authenticated user was supplied.
    #[error("Submitting a report requires an authenticated user")]
    Unauthenticated,

    /// Reading or writing the store failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Write set produced for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The matched zone after its update, or the newly created zone.
    pub resolved_zone: Zone,
    /// Whether `resolved_zone` did not exist before.
    pub zone_created: bool,
    /// The incident record, referencing `resolved_zone`.
    pub incident: IncidentReport,
}

/// Returns the first zone in `zones` whose center is within the zone
/// radius of `point`.
#[must_use]
pub fn find_first_zone_within<'a>(point: Coordinates, zones: &'a [Zone]) -> Option<&'a Zone> {
    zones.iter().find(|zone| {
        distance::within_zone_radius(point, Coordinates::new(zone.latitude, zone.longitude))
    })
}

/// Resolves `report` against `candidate_zones` and builds the zone and
/// incident records to persist.
///
/// If `report.red_zone_id` is set (and not blank) that zone is used
/// without a distance search.
///
/// # Errors
///
/// * [`ReconcileError::InvalidCoordinates`] if the report coordinates are
///   not finite numbers
/// * [`ReconcileError::ZoneNotFound`] if the explicit zone id is not in
///   `candidate_zones`
pub fn reconcile(
    report: &NewIncident,
    candidate_zones: &[Zone],
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Reconciliation, ReconcileError> {
    let point = Coordinates::parse(&report.latitude, &report.longitude)?;

    let explicit_zone_id = report
        .red_zone_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let matched = match explicit_zone_id {
        Some(id) => Some(
            candidate_zones
                .iter()
                .find(|zone| zone.id == id)
                .ok_or_else(|| ReconcileError::ZoneNotFound { id: id.to_string() })?,
        ),
        None => find_first_zone_within(point, candidate_zones),
    };

    let (resolved_zone, zone_created) = if let Some(zone) = matched {
        let mut zone = zone.clone();
        zone.record_incident(now);
        log::debug!(
            "Report matched zone {} ({} incidents, {} risk)",
            zone.id,
            zone.incident_count,
            zone.risk_level
        );
        (zone, false)
    } else {
        let name = report.title.map_or_else(
            || {
                format!(
                    "Zone at ({}, {})",
                    report.latitude.trim(),
                    report.longitude.trim()
                )
            },
            |title| title.to_string(),
        );
        let zone = Zone::first_incident(
            uuid::Uuid::new_v4().to_string(),
            name,
            point.latitude,
            point.longitude,
            now,
        );
        log::debug!("No zone within range, creating {} ({})", zone.id, zone.name);
        (zone, true)
    };

    let incident = IncidentReport {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: report.title,
        description: report.description.clone(),
        severity: report.severity.unwrap_or_default(),
        latitude: point.latitude,
        longitude: point.longitude,
        image_urls: report.image_urls.clone(),
        anonymous: report.anonymous,
        created_at: now,
        red_zone_id: resolved_zone.id.clone(),
    };

    Ok(Reconciliation {
        resolved_zone,
        zone_created,
        incident,
    })
}

/// Submits a report on behalf of `user_id`.
///
/// Loads all zones, reconciles the report, writes the zone, then inserts
/// the incident. Nothing is retried. If the incident insert fails after
/// the zone write succeeded the zone keeps its incremented count.
///
/// # Errors
///
/// * [`ReconcileError::Unauthenticated`] if `user_id` is missing or blank
/// * any error from [`reconcile`]
/// * [`ReconcileError::StoreUnavailable`] if a store operation fails
pub async fn submit_report(
    store: &dyn ZoneStore,
    clock: &dyn Clock,
    user_id: Option<&str>,
    report: &NewIncident,
) -> Result<Reconciliation, ReconcileError> {
    let user_id = user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ReconcileError::Unauthenticated)?;

    Coordinates::parse(&report.latitude, &report.longitude)?;

    let zones = store.list_zones().await?;
    let reconciliation = reconcile(report, &zones, user_id, clock.now())?;

    let resolved_zone = store.upsert_zone(&reconciliation.resolved_zone).await?;

    let incident = match store.insert_incident(&reconciliation.incident).await {
        Ok(incident) => incident,
        Err(e) => {
            log::warn!(
                "Zone {} was written but incident insert failed: {e}",
                resolved_zone.id
            );
            return Err(e.into());
        }
    };

    if reconciliation.zone_created {
        log::info!(
            "Created zone {} for incident {} by {user_id}",
            resolved_zone.id,
            incident.id
        );
    } else {
        log::info!(
            "Incident {} counted in zone {} ({} incidents, {} risk)",
            incident.id,
            resolved_zone.id,
            resolved_zone.incident_count,
            resolved_zone.risk_level
        );
    }

    Ok(Reconciliation {
        resolved_zone,
        zone_created: reconciliation.zone_created,
        incident,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use red_zone_zone_models::{IncidentCategory, IncidentSeverity, RiskLevel};

    use super::*;

    const PUNE_LAT: f64 = 18.5304;
    const PUNE_LON: f64 = 73.8567;

    // ~111.195 m per 0.001 degree of latitude
    const METERS_PER_DEGREE_LAT: f64 = 111_194.93;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        zones: Mutex<Vec<Zone>>,
        incidents: Mutex<Vec<IncidentReport>>,
        fail_list: bool,
        fail_insert: bool,
    }

    #[async_trait]
    impl ZoneStore for MemoryStore {
        async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
            if self.fail_list {
                return Err(StoreError::new("connection refused"));
            }
            Ok(self.zones.lock().unwrap().clone())
        }

        async fn upsert_zone(&self, zone: &Zone) -> Result<Zone, StoreError> {
            let mut zones = self.zones.lock().unwrap();
            if let Some(existing) = zones.iter_mut().find(|z| z.id == zone.id) {
                *existing = zone.clone();
            } else {
                zones.push(zone.clone());
            }
            Ok(zone.clone())
        }

        async fn insert_incident(
            &self,
            incident: &IncidentReport,
        ) -> Result<IncidentReport, StoreError> {
            if self.fail_insert {
                return Err(StoreError::new("insert rejected"));
            }
            self.incidents.lock().unwrap().push(incident.clone());
            Ok(incident.clone())
        }

        async fn list_incidents_for_user(
            &self,
            user_id: &str,
        ) -> Result<Vec<IncidentReport>, StoreError> {
            let mut found: Vec<_> = self
                .incidents
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.user_id == user_id)
                .cloned()
                .collect();
            found.reverse();
            Ok(found)
        }
    }

    fn zone(id: &str, latitude: f64, longitude: f64, incident_count: u32) -> Zone {
        Zone {
            id: id.to_string(),
            name: id.to_string(),
            latitude,
            longitude,
            incident_count,
            risk_level: red_zone_zone_models::classify(incident_count),
            last_incident: None,
        }
    }

    fn report_at(latitude: f64, longitude: f64) -> NewIncident {
        NewIncident {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            title: Some(IncidentCategory::Theft),
            description: "Phone snatched near the bus stop".to_string(),
            ..NewIncident::default()
        }
    }

    #[test]
    fn exact_coordinates_match_existing_zone() {
        let zones = vec![zone("a", PUNE_LAT, PUNE_LON, 3)];
        let now = Utc::now();
        let result = reconcile(&report_at(PUNE_LAT, PUNE_LON), &zones, "u1", now).unwrap();

        assert!(!result.zone_created);
        assert_eq!(result.resolved_zone.id, "a");
        assert_eq!(result.resolved_zone.incident_count, 4);
        assert_eq!(result.resolved_zone.last_incident, Some(now));
        assert_eq!(result.incident.red_zone_id, "a");
    }

    #[test]
    fn far_report_creates_low_risk_zone() {
        let zones = vec![zone("a", PUNE_LAT + 0.05, PUNE_LON, 30)];
        let result =
            reconcile(&report_at(PUNE_LAT, PUNE_LON), &zones, "u1", Utc::now()).unwrap();

        assert!(result.zone_created);
        assert_eq!(result.resolved_zone.incident_count, 1);
        assert_eq!(result.resolved_zone.risk_level, RiskLevel::Low);
        assert_eq!(result.resolved_zone.name, "Theft");
        assert!((result.resolved_zone.latitude - PUNE_LAT).abs() < f64::EPSILON);
        assert_eq!(result.incident.red_zone_id, result.resolved_zone.id);
    }

    // Scan order wins over proximity: the closer zone B is listed second.
    #[test]
    fn first_match_in_scan_order_not_nearest() {
        let a = zone("a", PUNE_LAT + 600.0 / METERS_PER_DEGREE_LAT, PUNE_LON, 0);
        let b = zone("b", PUNE_LAT - 200.0 / METERS_PER_DEGREE_LAT, PUNE_LON, 0);
        let point = Coordinates::new(PUNE_LAT, PUNE_LON);
        let to_a = haversine_meters(point, Coordinates::new(a.latitude, a.longitude));
        let to_b = haversine_meters(point, Coordinates::new(b.latitude, b.longitude));
        assert!((to_a - 600.0).abs() < 1.0, "{to_a}");
        assert!((to_b - 200.0).abs() < 1.0, "{to_b}");

        let result =
            reconcile(&report_at(PUNE_LAT, PUNE_LON), &[a, b], "u1", Utc::now()).unwrap();
        assert_eq!(result.resolved_zone.id, "a");
    }

    #[test]
    fn untitled_zone_named_after_coordinates() {
        let report = NewIncident {
            latitude: "18.5304".to_string(),
            longitude: " 73.8567".to_string(),
            ..NewIncident::default()
        };
        let result = reconcile(&report, &[], "u1", Utc::now()).unwrap();
        assert_eq!(result.resolved_zone.name, "Zone at (18.5304, 73.8567)");
        assert_eq!(result.incident.severity, IncidentSeverity::Low);
        assert_eq!(result.incident.title, None);
    }

    #[test]
    fn explicit_zone_skips_distance_search() {
        let near = zone("near", PUNE_LAT, PUNE_LON, 0);
        let far = zone("far", PUNE_LAT + 1.0, PUNE_LON, 20);
        let mut report = report_at(PUNE_LAT, PUNE_LON);
        report.red_zone_id = Some("far".to_string());

        let result = reconcile(&report, &[near, far], "u1", Utc::now()).unwrap();
        assert_eq!(result.resolved_zone.id, "far");
        assert_eq!(result.resolved_zone.incident_count, 21);
        assert_eq!(result.resolved_zone.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn blank_explicit_zone_falls_back_to_search() {
        let mut report = report_at(PUNE_LAT, PUNE_LON);
        report.red_zone_id = Some("  ".to_string());
        let result =
            reconcile(&report, &[zone("a", PUNE_LAT, PUNE_LON, 0)], "u1", Utc::now()).unwrap();
        assert_eq!(result.resolved_zone.id, "a");
    }

    #[test]
    fn unknown_explicit_zone_is_rejected() {
        let mut report = report_at(PUNE_LAT, PUNE_LON);
        report.red_zone_id = Some("missing".to_string());
        let err = reconcile(&report, &[zone("a", PUNE_LAT, PUNE_LON, 0)], "u1", Utc::now())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ZoneNotFound { ref id } if id == "missing"));
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let report = NewIncident {
            latitude: "north-ish".to_string(),
            longitude: "73.8567".to_string(),
            ..NewIncident::default()
        };
        let err = reconcile(&report, &[], "u1", Utc::now()).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidCoordinates { .. }));
    }

    #[test]
    fn stale_tier_is_corrected_on_match() {
        let mut stale = zone("a", PUNE_LAT, PUNE_LON, 45);
        stale.risk_level = RiskLevel::Low;
        let result =
            reconcile(&report_at(PUNE_LAT, PUNE_LON), &[stale], "u1", Utc::now()).unwrap();
        assert_eq!(result.resolved_zone.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn submit_requires_user() {
        let store = MemoryStore::default();
        let report = report_at(PUNE_LAT, PUNE_LON);

        for user in [None, Some(""), Some("   ")] {
            let err = submit_report(&store, &SystemClock, user, &report)
                .await
                .unwrap_err();
            assert!(matches!(err, ReconcileError::Unauthenticated));
        }
        assert!(store.zones.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_checks_coordinates_before_reading_store() {
        let store = MemoryStore {
            fail_list: true,
            ..MemoryStore::default()
        };
        let report = NewIncident {
            latitude: "inf".to_string(),
            longitude: "0".to_string(),
            ..NewIncident::default()
        };
        let err = submit_report(&store, &SystemClock, Some("u1"), &report)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidCoordinates { .. }));
    }

    #[tokio::test]
    async fn submit_surfaces_store_failure() {
        let store = MemoryStore {
            fail_list: true,
            ..MemoryStore::default()
        };
        let err = submit_report(
            &store,
            &SystemClock,
            Some("u1"),
            &report_at(PUNE_LAT, PUNE_LON),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_incident_insert_keeps_zone_write() {
        let store = MemoryStore {
            fail_insert: true,
            ..MemoryStore::default()
        };
        let err = submit_report(
            &store,
            &SystemClock,
            Some("u1"),
            &report_at(PUNE_LAT, PUNE_LON),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
        let zones = store.zones.lock().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].incident_count, 1);
        assert!(store.incidents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_reports_escalate_zone() {
        let store = MemoryStore::default();
        let clock = FixedClock(Utc::now());

        let first = submit_report(&store, &clock, Some("u1"), &report_at(18.5304, 73.8567))
            .await
            .unwrap();
        assert!(first.zone_created);
        assert_eq!(first.resolved_zone.incident_count, 1);
        assert_eq!(first.resolved_zone.risk_level, RiskLevel::Low);

        let second = submit_report(&store, &clock, Some("u2"), &report_at(18.5306, 73.8569))
            .await
            .unwrap();
        assert!(!second.zone_created);
        assert_eq!(second.resolved_zone.id, first.resolved_zone.id);
        assert_eq!(second.resolved_zone.incident_count, 2);
        assert_eq!(second.resolved_zone.risk_level, RiskLevel::Low);

        let mut last = second;
        for n in 3..=41u32 {
            last = submit_report(&store, &clock, Some("u1"), &report_at(18.5306, 73.8569))
                .await
                .unwrap();
            assert_eq!(last.resolved_zone.incident_count, n);
            let expected = match n {
                0..=20 => RiskLevel::Low,
                21..=40 => RiskLevel::Medium,
                _ => RiskLevel::High,
            };
            assert_eq!(last.resolved_zone.risk_level, expected, "after {n} reports");
        }
        assert_eq!(last.resolved_zone.risk_level, RiskLevel::High);
        assert_eq!(store.zones.lock().unwrap().len(), 1);
        assert_eq!(store.incidents.lock().unwrap().len(), 41);

        let mine = store.list_incidents_for_user("u2").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].red_zone_id, first.resolved_zone.id);
    }
}
