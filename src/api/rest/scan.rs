use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::rest::delivery::spawn_sample_pump;
use crate::engine::progress::{ProgressSnapshot, ProgressState};
use crate::engine::scan::{ScanState, ScanSubmission};
use crate::error::AppError;
use crate::models::scan::{ScanOutcome, ScanSource};
use crate::state::{AppState, ProgressEvent};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan", post(submit_scan))
        .route("/scan/retry", post(retry_scan))
        .route("/scan/cancel", post(cancel_scan))
}

#[derive(Deserialize)]
pub struct ScanPayload {
    pub code: String,
    #[serde(default = "default_source")]
    pub source: ScanSource,
}

fn default_source() -> ScanSource {
    ScanSource::Camera
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub submission: ScanSubmission,
    pub scan: ScanState,
    pub progress: Option<ProgressSnapshot>,
}

async fn submit_scan(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScanPayload>,
) -> Result<Json<ScanResponse>, AppError> {
    let ctx = state.context().await?;
    let delivery_id = {
        let session = state.session.lock().await;
        session
            .as_ref()
            .and_then(|s| s.progress.delivery())
            .map(|d| d.id)
            .ok_or_else(|| AppError::Conflict("no delivery loaded to scan against".to_string()))?
    };

    let submission = state
        .scanner
        .submit_scan(
            &ctx,
            state.deps.backend.as_ref(),
            delivery_id,
            &payload.code,
            payload.source,
        )
        .await;

    let label = match &submission {
        Ok(ScanSubmission::Ignored) => "ignored",
        Ok(ScanSubmission::Resolved(ScanOutcome::Matched)) => "matched",
        Ok(ScanSubmission::Resolved(_)) => "rejected",
        Err(_) => "error",
    };
    state.metrics.scans_total.with_label_values(&[label]).inc();
    let submission = submission?;

    let scan = state.scanner.state();
    if submission != ScanSubmission::Ignored {
        state.publish(ProgressEvent::Scan(scan.clone()));
    }

    let mut session = state.session.lock().await;
    let progress = match session.as_mut() {
        Some(session) => {
            if submission == ScanSubmission::Resolved(ScanOutcome::Matched) {
                let was_waiting = *session.progress.state() == ProgressState::AwaitingStart;
                match session.progress.mark_package_verified(delivery_id).await {
                    Ok(()) if was_waiting => {
                        if let Some(samples) = session.progress.sample_watch() {
                            spawn_sample_pump(state.clone(), samples);
                        }
                        state.sync_subscription_gauge();
                    }
                    Ok(()) => {}
                    Err(err) => {
                        warn!(delivery_id, error = %err, "matched scan did not advance delivery")
                    }
                }
                state.publish(ProgressEvent::Snapshot(session.progress.snapshot()));
            }
            Some(session.progress.snapshot())
        }
        None => None,
    };

    Ok(Json(ScanResponse {
        submission,
        scan,
        progress,
    }))
}

async fn retry_scan(State(state): State<Arc<AppState>>) -> Result<Json<ScanState>, AppError> {
    state.scanner.retry()?;
    Ok(Json(state.scanner.state()))
}

async fn cancel_scan(State(state): State<Arc<AppState>>) -> Result<Json<ScanState>, AppError> {
    state.scanner.cancel()?;
    Ok(Json(state.scanner.state()))
}
