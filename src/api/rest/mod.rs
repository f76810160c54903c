pub mod delivery;
pub mod device;
pub mod driver;
pub mod proof;
pub mod scan;
pub mod session;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(session::router())
        .merge(delivery::router())
        .merge(scan::router())
        .merge(proof::router())
        .merge(device::router())
        .merge(driver::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    signed_in: bool,
    delivery_loaded: bool,
    location_subscriptions: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let signed_in = state.credentials.read().await.is_some();
    let delivery_loaded = state.session.lock().await.is_some();

    Json(HealthResponse {
        status: "ok",
        signed_in,
        delivery_loaded,
        location_subscriptions: state.location_feed.active_subscriptions(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
