use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::driver::{DriverProfile, HistoryEntry};
use crate::models::notification::NotificationFeed;
use crate::models::rating::RatingSummary;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history", get(history))
        .route("/notifications", get(notifications))
        .route("/notifications/:id/read", put(mark_read))
        .route("/ratings", get(ratings))
        .route("/profile", get(profile))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub total: usize,
    pub deliveries: Vec<HistoryEntry>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub full_name: String,
    #[serde(flatten)]
    pub profile: DriverProfile,
}

async fn history(State(state): State<Arc<AppState>>) -> Result<Json<HistoryResponse>, AppError> {
    let ctx = state.context().await?;
    let deliveries: Vec<HistoryEntry> = state
        .deps
        .backend
        .delivery_history(&ctx)
        .await?
        .iter()
        .map(HistoryEntry::from)
        .collect();

    Ok(Json(HistoryResponse {
        total: deliveries.len(),
        deliveries,
    }))
}

async fn notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NotificationFeed>, AppError> {
    let ctx = state.context().await?;
    let notifications = state.deps.backend.notifications(&ctx).await?;
    let unread = state.deps.backend.unread_notifications(&ctx).await?;

    Ok(Json(NotificationFeed {
        notifications,
        unread,
    }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let ctx = state.context().await?;
    state.deps.backend.mark_notification_read(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ratings(State(state): State<Arc<AppState>>) -> Result<Json<RatingSummary>, AppError> {
    let ctx = state.context().await?;
    let profile = state.deps.backend.rating_profile(&ctx).await?;
    Ok(Json(RatingSummary::from(profile)))
}

async fn profile(State(state): State<Arc<AppState>>) -> Result<Json<ProfileResponse>, AppError> {
    let ctx = state.context().await?;
    let profile = state.deps.backend.driver_profile(&ctx).await?;

    Ok(Json(ProfileResponse {
        full_name: profile.full_name(),
        profile,
    }))
}
