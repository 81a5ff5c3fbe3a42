//! Great-circle distance between report coordinates and zone centers.

use crate::ReconcileError;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A report matches a zone when it lies strictly closer than this to the
/// zone center.
pub const ZONE_RADIUS_METERS: f64 = 1_000.0;

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a point from already-validated degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses latitude and longitude as entered on the submission form.
    ///
    /// Surrounding whitespace is ignored. Range is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidCoordinates`] if either value is not
    /// a finite number.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, ReconcileError> {
        Ok(Self::new(parse_degrees(latitude)?, parse_degrees(longitude)?))
    }
}

fn parse_degrees(value: &str) -> Result<f64, ReconcileError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReconcileError::InvalidCoordinates {
            value: value.to_string(),
        })
}

fn to_radians(degrees: f64) -> f64 {
    (degrees * std::f64::consts::PI) / 180.0
}

/// Haversine surface distance in meters.
///
/// Evaluated in this exact order so results are reproducible:
/// `a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)`,
/// `c = 2·atan2(√a, √(1−a))`, `d = R·c`.
#[must_use]
pub fn haversine_meters(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = to_radians(to.latitude - from.latitude);
    let d_lon = to_radians(to.longitude - from.longitude);
    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + to_radians(from.latitude).cos()
            * to_radians(to.latitude).cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Whether `point` lies inside the zone radius around `center`.
///
/// Non-finite coordinates never match.
#[must_use]
pub fn within_zone_radius(point: Coordinates, center: Coordinates) -> bool {
    haversine_meters(point, center) < ZONE_RADIUS_METERS
}
