//! Distance helpers for map consumers: alert radius checks, shelter
//! distances and walking times.

use crate::error::{AppError, ValidationErrors};

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.0;

/// Average walking speed, about 5 km/h.
pub const DEFAULT_WALK_SPEED_M_S: f64 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

/// Walking time in whole seconds.
pub fn eta_walk_seconds(distance_km: f64, speed_m_s: f64) -> Result<u64, AppError> {
    if distance_km < 0.0 {
        return Err(AppError::GeoError("Distance cannot be negative".to_string()));
    }
    if speed_m_s <= 0.0 {
        return Err(AppError::GeoError("Speed must be positive".to_string()));
    }
    Ok((distance_km * 1000.0 / speed_m_s).round() as u64)
}

/// Approximate box around a point, for cheap prefiltering.
pub fn bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE_LAT;
    let lon_delta = radius_km / (KM_PER_DEGREE_LAT * lat.to_radians().cos());
    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    if !(-90.0..=90.0).contains(&lat) {
        errors.add("lat", "Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&lon) {
        errors.add("lon", "Longitude must be between -180 and 180");
    }
    errors.into_result()
}
