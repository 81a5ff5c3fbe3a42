#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Red zone and incident report types.
//!
//! This crate defines the data shared by every layer of the red-zone
//! system: the [`Zone`] record and its derived [`RiskLevel`], the incident
//! taxonomy offered by the submission form, and the [`IncidentReport`]
//! record produced when a submission is reconciled into a zone.
//!
//! The zone classifier ([`classify`]) lives here because both the read path
//! (rendering the zone list) and the write path (reconciling a new report)
//! must agree on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Incident counts strictly above this are [`RiskLevel::Medium`] or worse.
pub const MEDIUM_RISK_THRESHOLD: u32 = 20;

/// Incident counts strictly above this are [`RiskLevel::High`].
pub const HIGH_RISK_THRESHOLD: u32 = 40;

/// Risk tier of a zone, derived from its incident count.
///
/// Ordered `Low < Medium < High`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    /// 20 incidents or fewer.
    #[default]
    Low,
    /// 21 to 40 incidents.
    Medium,
    /// More than 40 incidents.
    High,
}

impl RiskLevel {
    /// Classifies an incident count into a risk tier.
    #[must_use]
    pub const fn from_incident_count(incident_count: u32) -> Self {
        if incident_count > HIGH_RISK_THRESHOLD {
            Self::High
        } else if incident_count > MEDIUM_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Map marker color for this tier.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::High => "red",
            Self::Medium => "orange",
            Self::Low => "green",
        }
    }

    /// Radius in meters of the circle drawn around the zone center on the
    /// map.
    #[must_use]
    pub const fn map_radius_meters(self) -> u32 {
        match self {
            Self::High => 400,
            Self::Medium => 300,
            Self::Low => 200,
        }
    }

    /// Returns all variants of this enum, lowest risk first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High]
    }
}

/// Maps an incident count to its risk tier.
///
/// `> 40` is high, `21..=40` is medium, everything else is low.
#[must_use]
pub const fn classify(incident_count: u32) -> RiskLevel {
    RiskLevel::from_incident_count(incident_count)
}

/// Error returned when a raw value cannot be used as an incident count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidIncidentCountError {
    /// The rejected value.
    pub value: i64,
}

impl std::fmt::Display for InvalidIncidentCountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid incident count {}: expected 0-{}",
            self.value,
            u32::MAX
        )
    }
}

impl std::error::Error for InvalidIncidentCountError {}

/// Converts a signed count (as stored in a database column) into an
/// incident count.
///
/// # Errors
///
/// Returns [`InvalidIncidentCountError`] if the value is negative or does
/// not fit in a `u32`.
pub fn incident_count_from_i64(value: i64) -> Result<u32, InvalidIncidentCountError> {
    u32::try_from(value).map_err(|_| InvalidIncidentCountError { value })
}

/// Category offered by the incident submission form.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IncidentCategory {
    /// Theft or robbery.
    Theft,
    /// Physical or verbal abuse.
    Abuse,
    /// Traffic or other accident.
    Accident,
    /// Damage to property.
    Vandalism,
    /// Harassment or stalking.
    Harassment,
    /// Anything else.
    Other,
}

impl IncidentCategory {
    /// Returns all variants of this enum, in form order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Theft,
            Self::Abuse,
            Self::Accident,
            Self::Vandalism,
            Self::Harassment,
            Self::Other,
        ]
    }
}

/// Severity a reporter assigns to an incident.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IncidentSeverity {
    /// Minor incident. Used when the reporter leaves severity blank.
    #[default]
    Low,
    /// Moderate incident.
    Medium,
    /// Serious incident.
    High,
}

impl IncidentSeverity {
    /// Returns all variants of this enum, in form order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High]
    }
}

/// A red zone: a 1 km risk area centered on the first report that fell
/// outside every other zone.
///
/// `risk_level` is derived from `incident_count` and must always equal
/// [`classify`] of it. Use [`Zone::normalized`] to restore the invariant on
/// records loaded from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Opaque unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude of the zone center (degrees).
    pub latitude: f64,
    /// Longitude of the zone center (degrees).
    pub longitude: f64,
    /// Running count of reports reconciled into this zone.
    pub incident_count: u32,
    /// Risk tier derived from `incident_count`.
    pub risk_level: RiskLevel,
    /// When the most recent report was reconciled into this zone.
    pub last_incident: Option<DateTime<Utc>>,
}

impl Zone {
    /// Creates a zone holding its first incident.
    #[must_use]
    pub fn first_incident(
        id: String,
        name: String,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            latitude,
            longitude,
            incident_count: 1,
            risk_level: classify(1),
            last_incident: Some(at),
        }
    }

    /// Counts one more incident in this zone at time `at`.
    pub fn record_incident(&mut self, at: DateTime<Utc>) {
        self.incident_count = self.incident_count.saturating_add(1);
        self.risk_level = classify(self.incident_count);
        self.last_incident = Some(at);
    }

    /// Whether the stored tier agrees with the incident count.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        matches!(
            (self.risk_level, classify(self.incident_count)),
            (RiskLevel::Low, RiskLevel::Low)
                | (RiskLevel::Medium, RiskLevel::Medium)
                | (RiskLevel::High, RiskLevel::High)
        )
    }

    /// Returns this zone with `risk_level` re-derived from the count.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.risk_level = classify(self.incident_count);
        self
    }
}

/// A reported incident, as persisted after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Opaque unique id.
    pub id: String,
    /// Submitting user. Kept even for anonymous reports.
    pub user_id: String,
    /// Category chosen on the form, if any.
    pub title: Option<IncidentCategory>,
    /// Free-text description.
    pub description: String,
    /// Reporter-assigned severity.
    pub severity: IncidentSeverity,
    /// Latitude of the incident (degrees).
    pub latitude: f64,
    /// Longitude of the incident (degrees).
    pub longitude: f64,
    /// References to uploaded images.
    pub image_urls: Vec<String>,
    /// Hide the reporter when displaying this incident.
    pub anonymous: bool,
    /// When the report was submitted.
    pub created_at: DateTime<Utc>,
    /// Zone this report was reconciled into.
    pub red_zone_id: String,
}

/// A report as submitted, before its coordinates are validated and it is
/// reconciled into a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIncident {
    /// Latitude exactly as entered.
    pub latitude: String,
    /// Longitude exactly as entered.
    pub longitude: String,
    /// Category chosen on the form.
    pub title: Option<IncidentCategory>,
    /// Free-text description.
    pub description: String,
    /// Severity, `None` meaning [`IncidentSeverity::Low`].
    pub severity: Option<IncidentSeverity>,
    /// Zone picked manually from the zone list, bypassing the distance
    /// search.
    pub red_zone_id: Option<String>,
    /// References to already-uploaded images.
    pub image_urls: Vec<String>,
    /// Hide the reporter when displaying this incident.
    pub anonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_with_count(incident_count: u32, risk_level: RiskLevel) -> Zone {
        Zone {
            id: "z1".to_string(),
            name: "Shivajinagar".to_string(),
            latitude: 18.5304,
            longitude: 73.8567,
            incident_count,
            risk_level,
            last_incident: None,
        }
    }

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(0), RiskLevel::Low);
        assert_eq!(classify(20), RiskLevel::Low);
        assert_eq!(classify(21), RiskLevel::Medium);
        assert_eq!(classify(40), RiskLevel::Medium);
        assert_eq!(classify(41), RiskLevel::High);
        assert_eq!(classify(u32::MAX), RiskLevel::High);
    }

    #[test]
    fn classify_is_monotonic() {
        let mut previous = classify(0);
        for n in 1..=200 {
            let current = classify(n);
            assert!(current >= previous, "classify({n}) dropped below {previous}");
            previous = current;
        }
    }

    #[test]
    fn classify_is_pure() {
        for n in [0, 20, 21, 40, 41, 1000] {
            assert_eq!(classify(n), classify(n));
        }
    }

    #[test]
    fn incident_count_rejects_negative() {
        assert_eq!(incident_count_from_i64(0), Ok(0));
        assert_eq!(incident_count_from_i64(41), Ok(41));
        assert_eq!(
            incident_count_from_i64(-1),
            Err(InvalidIncidentCountError { value: -1 })
        );
        assert!(incident_count_from_i64(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn risk_level_strings_are_lowercase() {
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert_eq!(
            serde_json::to_string(&RiskLevel::Low).unwrap(),
            "\"low\""
        );
    }

    #[test]
    fn taxonomy_strings_match_form_values() {
        assert_eq!(IncidentCategory::Harassment.to_string(), "Harassment");
        assert_eq!(
            "Vandalism".parse::<IncidentCategory>().unwrap(),
            IncidentCategory::Vandalism
        );
        assert_eq!(IncidentSeverity::default(), IncidentSeverity::Low);
        assert_eq!(
            serde_json::to_string(&IncidentSeverity::High).unwrap(),
            "\"High\""
        );
    }

    #[test]
    fn record_incident_reclassifies() {
        let at = Utc::now();
        let mut zone = zone_with_count(20, RiskLevel::Low);
        zone.record_incident(at);
        assert_eq!(zone.incident_count, 21);
        assert_eq!(zone.risk_level, RiskLevel::Medium);
        assert_eq!(zone.last_incident, Some(at));
    }

    #[test]
    fn normalized_fixes_stale_tier() {
        let zone = zone_with_count(45, RiskLevel::Low);
        assert!(!zone.is_consistent());
        let zone = zone.normalized();
        assert!(zone.is_consistent());
        assert_eq!(zone.risk_level, RiskLevel::High);
    }

    #[test]
    fn first_incident_zone_is_low() {
        let zone = Zone::first_incident(
            "z2".to_string(),
            "Theft".to_string(),
            1.0,
            2.0,
            Utc::now(),
        );
        assert_eq!(zone.incident_count, 1);
        assert_eq!(zone.risk_level, RiskLevel::Low);
        assert!(zone.is_consistent());
    }
}
