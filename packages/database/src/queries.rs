//! Query functions for zones and incidents.
//!
//! All statements are raw SQL through `query_raw_params()` /
//! `exec_raw_params()` with `$n` placeholders, which both backends accept.

use chrono::{DateTime, SecondsFormat, Utc};
use moosicbox_json_utils::database::ToValue as _;
use red_zone_zone_models::{
    IncidentCategory, IncidentReport, IncidentSeverity, RiskLevel, Zone, incident_count_from_i64,
};
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

const ZONE_COLUMNS: &str =
    "id, name, latitude, longitude, incident_count, risk_level, last_incident";

const INCIDENT_COLUMNS: &str = "id, user_id, title, description, severity, latitude, longitude,
     image_urls, anonymous, created_at, red_zone_id";

/// Formats a timestamp as fixed-width RFC 3339 so text ordering matches
/// time ordering.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Conversion {
            message: format!("Invalid {column} timestamp {value:?}: {e}"),
        })
}

fn read_error<E: std::fmt::Display>(name: &str) -> impl FnOnce(E) -> DbError + '_ {
    move |e| DbError::Conversion {
        message: format!("Failed to read column {name}: {e}"),
    }
}

fn zone_from_row(row: &Row) -> Result<Zone, DbError> {
    let id: String = row.to_value("id").map_err(read_error("id"))?;
    let incident_count: i64 = row
        .to_value("incident_count")
        .map_err(read_error("incident_count"))?;
    let incident_count = incident_count_from_i64(incident_count).map_err(|e| {
        DbError::Conversion {
            message: format!("Zone {id}: {e}"),
        }
    })?;

    let stored_risk: String = row.to_value("risk_level").map_err(read_error("risk_level"))?;
    let risk_level = stored_risk.parse::<RiskLevel>().unwrap_or_default();

    let last_incident: Option<String> = row
        .to_value("last_incident")
        .map_err(read_error("last_incident"))?;
    let last_incident = last_incident
        .as_deref()
        .map(|value| parse_timestamp("last_incident", value))
        .transpose()?;

    let zone = Zone {
        id,
        name: row.to_value("name").map_err(read_error("name"))?,
        latitude: row.to_value("latitude").map_err(read_error("latitude"))?,
        longitude: row.to_value("longitude").map_err(read_error("longitude"))?,
        incident_count,
        risk_level,
        last_incident,
    };

    if !zone.is_consistent() {
        log::debug!(
            "Zone {} stored as {stored_risk:?} with {} incidents, re-deriving tier",
            zone.id,
            zone.incident_count
        );
    }

    Ok(zone.normalized())
}

fn incident_from_row(row: &Row) -> Result<IncidentReport, DbError> {
    let id: String = row.to_value("id").map_err(read_error("id"))?;

    let title: Option<String> = row.to_value("title").map_err(read_error("title"))?;
    let title = title
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<IncidentCategory>().map_err(|_| DbError::Conversion {
                message: format!("Incident {id}: unknown title {t:?}"),
            })
        })
        .transpose()?;

    let severity: String = row.to_value("severity").map_err(read_error("severity"))?;
    let severity = severity
        .parse::<IncidentSeverity>()
        .map_err(|_| DbError::Conversion {
            message: format!("Incident {id}: unknown severity {severity:?}"),
        })?;

    let image_urls: String = row.to_value("image_urls").map_err(read_error("image_urls"))?;
    let image_urls: Vec<String> =
        serde_json::from_str(&image_urls).map_err(|e| DbError::Conversion {
            message: format!("Incident {id}: invalid image_urls: {e}"),
        })?;

    let anonymous: i64 = row.to_value("anonymous").map_err(read_error("anonymous"))?;
    let created_at: String = row.to_value("created_at").map_err(read_error("created_at"))?;

    Ok(IncidentReport {
        user_id: row.to_value("user_id").map_err(read_error("user_id"))?,
        title,
        description: row.to_value("description").map_err(read_error("description"))?,
        severity,
        latitude: row.to_value("latitude").map_err(read_error("latitude"))?,
        longitude: row.to_value("longitude").map_err(read_error("longitude"))?,
        image_urls,
        anonymous: anonymous != 0,
        created_at: parse_timestamp("created_at", &created_at)?,
        red_zone_id: row.to_value("red_zone_id").map_err(read_error("red_zone_id"))?,
        id,
    })
}

/// Returns all zones in creation order.
///
/// Each zone's risk tier is re-derived from its incident count.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn list_zones(db: &dyn Database) -> Result<Vec<Zone>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {ZONE_COLUMNS} FROM red_zones ORDER BY seq"),
            &[],
        )
        .await?;

    rows.iter().map(zone_from_row).collect()
}

/// Looks up a single zone by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row cannot be converted.
pub async fn get_zone(db: &dyn Database, id: &str) -> Result<Option<Zone>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {ZONE_COLUMNS} FROM red_zones WHERE id = $1"),
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    rows.first().map(zone_from_row).transpose()
}

/// Creates a zone or overwrites every mutable column of an existing one.
///
/// The write is a plain overwrite of the values passed in, not an
/// increment. New zones are appended to the end of the scan order.
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails.
pub async fn upsert_zone(db: &dyn Database, zone: &Zone) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO red_zones (
            id, seq, name, latitude, longitude,
            incident_count, risk_level, last_incident
        ) VALUES (
            $1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM red_zones), $2, $3, $4,
            $5, $6, $7
        )
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            incident_count = excluded.incident_count,
            risk_level = excluded.risk_level,
            last_incident = excluded.last_incident",
        &[
            DatabaseValue::String(zone.id.clone()),
            DatabaseValue::String(zone.name.clone()),
            DatabaseValue::Real64(zone.latitude),
            DatabaseValue::Real64(zone.longitude),
            DatabaseValue::Int64(i64::from(zone.incident_count)),
            DatabaseValue::String(zone.risk_level.to_string()),
            zone.last_incident.map_or(DatabaseValue::Null, |at| {
                DatabaseValue::String(format_timestamp(at))
            }),
        ],
    )
    .await?;

    Ok(())
}

/// Appends an incident record.
///
/// # Errors
///
/// Returns [`DbError`] if serialization or the insert fails (for example
/// when the referenced zone does not exist on a backend enforcing foreign
/// keys).
pub async fn insert_incident(db: &dyn Database, incident: &IncidentReport) -> Result<(), DbError> {
    let image_urls = serde_json::to_string(&incident.image_urls).map_err(|e| {
        DbError::Conversion {
            message: format!("Failed to encode image_urls: {e}"),
        }
    })?;

    db.exec_raw_params(
        "INSERT INTO incidents (
            id, seq, user_id, title, description, severity,
            latitude, longitude, image_urls, anonymous, created_at, red_zone_id
        ) VALUES (
            $1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM incidents), $2, $3, $4, $5,
            $6, $7, $8, $9, $10, $11
        )",
        &[
            DatabaseValue::String(incident.id.clone()),
            DatabaseValue::String(incident.user_id.clone()),
            incident
                .title
                .map_or(DatabaseValue::Null, |t| DatabaseValue::String(t.to_string())),
            DatabaseValue::String(incident.description.clone()),
            DatabaseValue::String(incident.severity.to_string()),
            DatabaseValue::Real64(incident.latitude),
            DatabaseValue::Real64(incident.longitude),
            DatabaseValue::String(image_urls),
            DatabaseValue::Int64(i64::from(incident.anonymous)),
            DatabaseValue::String(format_timestamp(incident.created_at)),
            DatabaseValue::String(incident.red_zone_id.clone()),
        ],
    )
    .await?;

    Ok(())
}

/// Returns a user's incidents, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn list_incidents_for_user(
    db: &dyn Database,
    user_id: &str,
) -> Result<Vec<IncidentReport>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {INCIDENT_COLUMNS} FROM incidents
                 WHERE user_id = $1
                 ORDER BY created_at DESC, seq DESC"
            ),
            &[DatabaseValue::String(user_id.to_string())],
        )
        .await?;

    rows.iter().map(incident_from_row).collect()
}

/// Number of incident rows referencing a zone.
///
/// Can differ from the zone's `incident_count`, which is maintained by
/// overwrite rather than aggregation.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn count_incidents_for_zone(db: &dyn Database, zone_id: &str) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS cnt FROM incidents WHERE red_zone_id = $1",
            &[DatabaseValue::String(zone_id.to_string())],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(0);
    };
    let count: i64 = row.to_value("cnt").map_err(read_error("cnt"))?;
    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: format!("Invalid incident count {count}: {e}"),
    })
}
