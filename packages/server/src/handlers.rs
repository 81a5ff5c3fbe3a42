//! HTTP handler functions for the red zone API.

use actix_web::{
    HttpRequest, HttpResponse,
    error::{InternalError, JsonPayloadError},
    web,
};
use red_zone_database::queries;
use red_zone_reconciler::{ReconcileError, ZoneStore as _, submit_report};
use red_zone_server_models::{
    ApiCategories, ApiError, ApiHealth, ApiIncident, ApiRiskTier, ApiSubmission, ApiZone,
    ApiZoneDetail, SubmitIncidentRequest,
};
use red_zone_zone_models::{IncidentCategory, IncidentSeverity, NewIncident, RiskLevel};

use crate::{AppState, USER_ID_HEADER};

fn error_body(message: impl Into<String>) -> ApiError {
    ApiError {
        error: message.into(),
    }
}

/// Reads the authenticated user id from the request, ignoring blank
/// values.
fn user_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Turns an unreadable JSON body into a 400 with the usual error body.
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected request body: {err}");
    let response = HttpResponse::BadRequest().json(error_body(err.to_string()));
    InternalError::from_response(err, response).into()
}

fn reconcile_error_response(e: &ReconcileError) -> HttpResponse {
    let body = error_body(e.to_string());
    match e {
        ReconcileError::InvalidCoordinates { .. } => HttpResponse::BadRequest().json(body),
        ReconcileError::ZoneNotFound { .. } => HttpResponse::NotFound().json(body),
        ReconcileError::Unauthenticated => HttpResponse::Unauthorized().json(body),
        ReconcileError::StoreUnavailable(_) => HttpResponse::ServiceUnavailable().json(body),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/categories`
///
/// Returns the incident categories and severities offered by the
/// submission form, plus the risk tier legend.
pub async fn categories() -> HttpResponse {
    HttpResponse::Ok().json(ApiCategories {
        categories: IncidentCategory::all().to_vec(),
        severities: IncidentSeverity::all().to_vec(),
        risk_levels: RiskLevel::all()
            .iter()
            .map(|level| ApiRiskTier {
                level: *level,
                color: level.color().to_string(),
                radius_meters: level.map_radius_meters(),
            })
            .collect(),
    })
}

/// `GET /api/red_zones`
///
/// Lists every zone with its risk tier re-derived from the incident count.
pub async fn red_zones(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_zones().await {
        Ok(zones) => {
            let zones: Vec<ApiZone> = zones.into_iter().map(ApiZone::from).collect();
            HttpResponse::Ok().json(zones)
        }
        Err(e) => {
            log::error!("Failed to list zones: {e}");
            HttpResponse::ServiceUnavailable().json(error_body("Failed to list zones"))
        }
    }
}

/// `GET /api/red_zones/{id}`
pub async fn red_zone(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();

    let zone = match queries::get_zone(state.db.as_ref(), &id).await {
        Ok(Some(zone)) => zone,
        Ok(None) => {
            return HttpResponse::NotFound().json(error_body(format!("Zone not found: {id}")));
        }
        Err(e) => {
            log::error!("Failed to load zone {id}: {e}");
            return HttpResponse::ServiceUnavailable().json(error_body("Failed to load zone"));
        }
    };

    match queries::count_incidents_for_zone(state.db.as_ref(), &id).await {
        Ok(report_count) => HttpResponse::Ok().json(ApiZoneDetail {
            zone: ApiZone::from(zone),
            report_count,
        }),
        Err(e) => {
            log::error!("Failed to count incidents for zone {id}: {e}");
            HttpResponse::ServiceUnavailable().json(error_body("Failed to load zone"))
        }
    }
}

/// `GET /api/incidents`
///
/// Lists the caller's own reports, newest first.
pub async fn my_incidents(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let Some(user_id) = user_id(&req) else {
        return reconcile_error_response(&ReconcileError::Unauthenticated);
    };

    match state.store.list_incidents_for_user(&user_id).await {
        Ok(incidents) => {
            let incidents: Vec<ApiIncident> =
                incidents.into_iter().map(ApiIncident::from).collect();
            HttpResponse::Ok().json(incidents)
        }
        Err(e) => {
            log::error!("Failed to list incidents for {user_id}: {e}");
            HttpResponse::ServiceUnavailable().json(error_body("Failed to list incidents"))
        }
    }
}

/// `POST /api/incidents`
///
/// Reconciles the submitted report into a zone and stores both.
pub async fn submit_incident(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SubmitIncidentRequest>,
) -> HttpResponse {
    let user_id = user_id(&req);
    let report = NewIncident::from(body.into_inner());

    match submit_report(
        &state.store,
        state.clock.as_ref(),
        user_id.as_deref(),
        &report,
    )
    .await
    {
        Ok(result) => HttpResponse::Created().json(ApiSubmission {
            zone: ApiZone::from(result.resolved_zone),
            zone_created: result.zone_created,
            incident: ApiIncident::from(result.incident),
        }),
        Err(e) => {
            if matches!(e, ReconcileError::StoreUnavailable(_)) {
                log::error!("Failed to submit report: {e}");
            } else {
                log::debug!("Rejected report: {e}");
            }
            reconcile_error_response(&e)
        }
    }
}
