use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Serialize;
use tracing::warn;

use crate::engine::progress::ProgressSnapshot;
use crate::engine::proof::{ProofAssembler, ProofStatus};
use crate::error::AppError;
use crate::models::proof::CapturedPhoto;
use crate::state::{AppState, DeliverySession, ProgressEvent};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/proof", get(get_proof))
        .route("/proof/photo", put(set_photo))
        .route("/proof/location", post(capture_location))
        .route("/proof/submit", post(submit_proof))
        .route("/proof/reset", post(reset_proof))
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub proof: ProofStatus,
    pub progress: ProgressSnapshot,
}

fn assembler(session: &mut Option<DeliverySession>) -> Result<&mut ProofAssembler, AppError> {
    session
        .as_mut()
        .and_then(|s| s.proof.as_mut())
        .ok_or_else(|| AppError::Conflict("no delivery loaded for proof".to_string()))
}

async fn get_proof(State(state): State<Arc<AppState>>) -> Result<Json<ProofStatus>, AppError> {
    let mut session = state.session.lock().await;
    Ok(Json(assembler(&mut session)?.status()))
}

async fn set_photo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProofStatus>, AppError> {
    state.camera.ensure_access()?;
    if body.is_empty() {
        return Err(AppError::BadRequest("photo body is empty".to_string()));
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.starts_with("image/"))
        .unwrap_or("image/jpeg")
        .to_string();

    let mut session = state.session.lock().await;
    let proof = assembler(&mut session)?;
    proof.set_photo(CapturedPhoto::new(body.to_vec(), content_type));
    Ok(Json(proof.status()))
}

async fn capture_location(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProofStatus>, AppError> {
    let mut session = state.session.lock().await;
    if assembler(&mut session)?.has_location() {
        return Err(AppError::Conflict(
            "delivery location already captured".to_string(),
        ));
    }

    let fix = state.deps.location.current_fix().await.map_err(|err| {
        warn!(error = %err, "could not capture delivery location");
        AppError::from(err)
    })?;

    let proof = assembler(&mut session)?;
    proof.capture_location(fix)?;
    Ok(Json(proof.status()))
}

async fn submit_proof(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmitResponse>, AppError> {
    let ctx = state.context().await?;
    let mut guard = state.session.lock().await;
    let session = guard
        .as_mut()
        .ok_or_else(|| AppError::Conflict("no delivery loaded for proof".to_string()))?;
    let proof = session
        .proof
        .as_ref()
        .ok_or_else(|| AppError::Conflict("no delivery loaded for proof".to_string()))?;

    let result = session.progress.complete(&ctx, proof).await;
    let label = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .proof_submissions_total
        .with_label_values(&[label])
        .inc();
    result?;

    let snapshot = session.progress.snapshot();
    state.publish(ProgressEvent::Snapshot(snapshot.clone()));

    Ok(Json(SubmitResponse {
        proof: proof.status(),
        progress: snapshot,
    }))
}

async fn reset_proof(State(state): State<Arc<AppState>>) -> Result<Json<ProofStatus>, AppError> {
    let mut session = state.session.lock().await;
    let proof = assembler(&mut session)?;
    proof.reset();
    Ok(Json(proof.status()))
}
