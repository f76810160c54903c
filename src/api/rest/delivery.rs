use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::progress::{
    DeliveryProgress, FailureReason, ProgressSnapshot, ProgressState,
};
use crate::engine::proof::ProofAssembler;
use crate::error::AppError;
use crate::models::location::DeviceLocationSample;
use crate::state::{AppState, DeliverySession, ProgressEvent};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery", get(get_delivery))
        .route("/delivery/load", post(load_delivery))
        .route("/delivery/start", post(start_trip))
        .route("/delivery/arrive", post(confirm_arrival))
        .route("/delivery/teardown", post(teardown))
}

async fn load_delivery(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let ctx = state.context().await?;
    let mut session = state.session.lock().await;

    // Refused while a verification is in flight.
    state.scanner.cancel()?;
    if let Some(mut previous) = session.take() {
        previous.progress.teardown();
    }

    let mut progress = DeliveryProgress::new(state.deps.clone());
    let outcome = progress.load(&ctx).await?.clone();

    let (label, result) = match &outcome {
        ProgressState::Failed(FailureReason::NoDeliveryAssigned) => {
            ("empty", Err(AppError::NoDeliveryAssigned))
        }
        ProgressState::Failed(FailureReason::NetworkError(msg)) => {
            ("error", Err(AppError::Network(msg.clone())))
        }
        _ => ("loaded", Ok(())),
    };
    state
        .metrics
        .deliveries_loaded_total
        .with_label_values(&[label])
        .inc();

    let proof = progress.delivery().map(|d| ProofAssembler::new(d.id));
    let snapshot = progress.snapshot();
    *session = Some(DeliverySession { progress, proof });
    drop(session);

    state.publish(ProgressEvent::Snapshot(snapshot.clone()));
    result.map(|()| Json(snapshot))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let mut session = state.session.lock().await;
    let session = session
        .as_mut()
        .ok_or_else(|| AppError::NotFound("no delivery loaded".to_string()))?;

    session.progress.refresh();
    Ok(Json(session.progress.snapshot()))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let mut session = state.session.lock().await;
    let session = session
        .as_mut()
        .ok_or_else(|| AppError::NotFound("no delivery loaded".to_string()))?;

    session.progress.start_trip().await?;
    if let Some(samples) = session.progress.sample_watch() {
        spawn_sample_pump(state.clone(), samples);
    }
    state.sync_subscription_gauge();

    let snapshot = session.progress.snapshot();
    state.publish(ProgressEvent::Snapshot(snapshot.clone()));
    Ok(Json(snapshot))
}

async fn confirm_arrival(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let mut session = state.session.lock().await;
    let session = session
        .as_mut()
        .ok_or_else(|| AppError::NotFound("no delivery loaded".to_string()))?;

    session.progress.confirm_arrival()?;
    state.sync_subscription_gauge();

    let snapshot = session.progress.snapshot();
    state.publish(ProgressEvent::Snapshot(snapshot.clone()));
    Ok(Json(snapshot))
}

async fn teardown(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let released = match state.session.lock().await.take() {
        Some(mut session) => {
            session.progress.teardown();
            true
        }
        None => false,
    };
    if let Err(err) = state.scanner.cancel() {
        warn!(error = %err, "scan still in flight at teardown");
    }
    state.sync_subscription_gauge();

    info!(released, "delivery screen torn down");
    Json(serde_json::json!({ "released": released }))
}

/// Feeds subscription samples into the session until the subscription ends.
///
/// Cancelling the subscription closes the channel, which ends this task.
pub(crate) fn spawn_sample_pump(
    state: Arc<AppState>,
    mut samples: watch::Receiver<Option<DeviceLocationSample>>,
) {
    tokio::spawn(async move {
        while samples.changed().await.is_ok() {
            let latest = *samples.borrow_and_update();
            let Some(sample) = latest else {
                continue;
            };

            let estimate = {
                let mut session = state.session.lock().await;
                session
                    .as_mut()
                    .and_then(|s| s.progress.apply_sample(sample))
            };

            if let Some(estimate) = estimate {
                state.metrics.location_samples_total.inc();
                state.publish(ProgressEvent::Estimate {
                    sample,
                    estimate,
                    distance_label: estimate.distance_label(),
                    eta_label: estimate.eta_label(),
                });
            }
        }
        debug!("sample pump finished");
    });
}
