use serde::Serialize;

use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Minutes per kilometre. Assumes a flat 12 km/h; illustrative, not calibrated.
const MINUTES_PER_KM: f64 = 5.0;

pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().atan2((1.0 - haversine).sqrt());

    EARTH_RADIUS_KM * central_angle
}

pub fn eta_minutes(distance_km: f64) -> i64 {
    (distance_km * MINUTES_PER_KM).round() as i64
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ProgressEstimate {
    pub distance_km: f64,
    pub eta_minutes: i64,
}

impl ProgressEstimate {
    pub fn between(from: &GeoPoint, to: &GeoPoint) -> Self {
        let distance_km = distance_km(from, to);
        Self {
            distance_km,
            eta_minutes: eta_minutes(distance_km),
        }
    }

    pub fn distance_label(&self) -> String {
        format!("{:.2} km", self.distance_km)
    }

    pub fn eta_label(&self) -> String {
        format!("{} min", self.eta_minutes)
    }
}
