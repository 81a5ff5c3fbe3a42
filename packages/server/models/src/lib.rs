#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the red zone server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain types in `red_zone_zone_models` so the API contract can
//! evolve independently.

use chrono::{DateTime, Utc};
use red_zone_zone_models::{
    IncidentCategory, IncidentReport, IncidentSeverity, NewIncident, RiskLevel, Zone,
};
use serde::{Deserialize, Deserializer, Serialize, de::IntoDeserializer as _};

/// A red zone as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiZone {
    /// Zone id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude of the zone center.
    pub latitude: f64,
    /// Longitude of the zone center.
    pub longitude: f64,
    /// Running incident count.
    pub incident_count: u32,
    /// Risk tier, always derived from `incident_count`.
    pub risk_level: RiskLevel,
    /// Marker color for the tier.
    pub color: String,
    /// Map circle radius for the tier, in meters.
    pub radius_meters: u32,
    /// Most recent incident (ISO 8601).
    pub last_incident: Option<DateTime<Utc>>,
}

impl From<Zone> for ApiZone {
    fn from(zone: Zone) -> Self {
        let zone = zone.normalized();
        Self {
            color: zone.risk_level.color().to_string(),
            radius_meters: zone.risk_level.map_radius_meters(),
            id: zone.id,
            name: zone.name,
            latitude: zone.latitude,
            longitude: zone.longitude,
            incident_count: zone.incident_count,
            risk_level: zone.risk_level,
            last_incident: zone.last_incident,
        }
    }
}

/// A zone with the number of incident records that reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiZoneDetail {
    /// The zone itself.
    #[serde(flatten)]
    pub zone: ApiZone,
    /// Incident rows referencing this zone. May trail `incidentCount`.
    pub report_count: u64,
}

/// An incident report as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Incident id.
    pub id: String,
    /// Category chosen on the form.
    pub title: Option<IncidentCategory>,
    /// Free-text description.
    pub description: String,
    /// Reporter-assigned severity.
    pub severity: IncidentSeverity,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Uploaded image references.
    pub image_urls: Vec<String>,
    /// Whether the reporter asked to stay anonymous.
    pub anonymous: bool,
    /// Submission time (ISO 8601).
    pub created_at: DateTime<Utc>,
    /// Zone the incident was counted in.
    pub red_zone_id: String,
}

impl From<IncidentReport> for ApiIncident {
    fn from(incident: IncidentReport) -> Self {
        Self {
            id: incident.id,
            title: incident.title,
            description: incident.description,
            severity: incident.severity,
            latitude: incident.latitude,
            longitude: incident.longitude,
            image_urls: incident.image_urls,
            anonymous: incident.anonymous,
            created_at: incident.created_at,
            red_zone_id: incident.red_zone_id,
        }
    }
}

/// A coordinate as sent by a client: either a JSON number or the text
/// typed into the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateInput {
    /// Numeric value.
    Number(f64),
    /// Unparsed text.
    Text(String),
}

impl CoordinateInput {
    fn into_text(self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text,
        }
    }
}

/// Reads an optional enum where the form sends `""` for "not chosen".
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    T::deserialize(text.into_deserializer()).map(Some)
}

/// Body of `POST /api/incidents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIncidentRequest {
    /// Latitude of the incident. Missing or `null` is rejected as an
    /// invalid coordinate.
    #[serde(default)]
    pub latitude: Option<CoordinateInput>,
    /// Longitude of the incident.
    #[serde(default)]
    pub longitude: Option<CoordinateInput>,
    /// Category. Blank means none was picked.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub title: Option<IncidentCategory>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Severity, defaulting to `Low` when missing or blank.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub severity: Option<IncidentSeverity>,
    /// Zone picked from the zone list instead of the nearest-zone search.
    #[serde(default)]
    pub red_zone_id: Option<String>,
    /// Already-uploaded image references.
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Hide the reporter when displaying this incident.
    #[serde(default)]
    pub anonymous: bool,
}

impl From<SubmitIncidentRequest> for NewIncident {
    fn from(req: SubmitIncidentRequest) -> Self {
        Self {
            latitude: req
                .latitude
                .map(CoordinateInput::into_text)
                .unwrap_or_default(),
            longitude: req
                .longitude
                .map(CoordinateInput::into_text)
                .unwrap_or_default(),
            title: req.title,
            description: req.description,
            severity: req.severity,
            red_zone_id: req.red_zone_id,
            image_urls: req.image_urls,
            anonymous: req.anonymous,
        }
    }
}

/// Response to a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubmission {
    /// The zone after the report was counted.
    pub zone: ApiZone,
    /// Whether the zone was created by this report.
    pub zone_created: bool,
    /// The stored incident.
    pub incident: ApiIncident,
}

/// One risk tier in the legend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRiskTier {
    /// Tier.
    pub level: RiskLevel,
    /// Marker color.
    pub color: String,
    /// Map circle radius in meters.
    pub radius_meters: u32,
}

/// Values offered by the submission form and the map legend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategories {
    /// Incident categories, in form order.
    pub categories: Vec<IncidentCategory>,
    /// Severities, in form order.
    pub severities: Vec<IncidentSeverity>,
    /// Risk tiers, lowest first.
    pub risk_levels: Vec<ApiRiskTier>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}
