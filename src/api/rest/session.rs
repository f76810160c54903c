use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session/login", post(login))
        .route("/session/logout", post(logout))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub driver_id: i64,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let ctx = state
        .deps
        .backend
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            warn!(error = %err, "login failed");
            AppError::from(err)
        })?;

    info!(driver_id = ctx.driver_id, "driver signed in");
    let driver_id = ctx.driver_id;
    *state.credentials.write().await = Some(ctx);

    Ok(Json(LoginResponse { driver_id }))
}

async fn logout(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if let Some(mut session) = state.session.lock().await.take() {
        session.progress.teardown();
    }
    if let Err(err) = state.scanner.cancel() {
        warn!(error = %err, "scan still in flight at sign out");
    }
    state.sync_subscription_gauge();
    *state.credentials.write().await = None;

    info!("driver signed out");
    Json(serde_json::json!({ "status": "signed_out" }))
}
