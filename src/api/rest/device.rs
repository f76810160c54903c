use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::location::DeviceLocationSample;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/device/location", post(push_location))
        .route("/device/permissions", put(update_permissions))
}

#[derive(Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct PermissionsUpdate {
    pub location: Option<bool>,
    pub camera: Option<bool>,
}

async fn push_location(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LocationFix>,
) -> Result<StatusCode, AppError> {
    if !(-90.0..=90.0).contains(&payload.latitude) {
        return Err(AppError::BadRequest("latitude out of range".to_string()));
    }
    if !(-180.0..=180.0).contains(&payload.longitude) {
        return Err(AppError::BadRequest("longitude out of range".to_string()));
    }

    state.location_feed.push_fix(DeviceLocationSample {
        latitude: payload.latitude,
        longitude: payload.longitude,
        timestamp: payload.timestamp.unwrap_or_else(Utc::now),
    });
    Ok(StatusCode::ACCEPTED)
}

async fn update_permissions(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PermissionsUpdate>,
) -> StatusCode {
    if let Some(granted) = payload.location {
        state.location_feed.set_permission(granted);
    }
    if let Some(granted) = payload.camera {
        state.camera.set_permission(granted);
    }
    StatusCode::NO_CONTENT
}
