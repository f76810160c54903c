use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::backend::{BackendError, DeliveryBackend, HttpBackend, RequestContext};
use crate::config::Config;
use crate::device::{SamplingPolicy, ShellCamera, ShellLocationFeed};
use crate::engine::progress::{DeliveryProgress, FlowDeps, ProgressSnapshot};
use crate::engine::proof::ProofAssembler;
use crate::engine::scan::{ScanState, ScanVerifier};
use crate::error::AppError;
use crate::geo::ProgressEstimate;
use crate::geocoding::{Geocoder, OpenCageGeocoder};
use crate::models::location::{DeviceLocationSample, GeoPoint};
use crate::observability::metrics::Metrics;

/// The delivery currently on screen.
pub struct DeliverySession {
    pub progress: DeliveryProgress,
    pub proof: Option<ProofAssembler>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Snapshot(ProgressSnapshot),
    Estimate {
        sample: DeviceLocationSample,
        estimate: ProgressEstimate,
        distance_label: String,
        eta_label: String,
    },
    Scan(ScanState),
}

pub struct AppState {
    pub deps: FlowDeps,
    pub location_feed: Arc<ShellLocationFeed>,
    pub camera: ShellCamera,
    pub credentials: RwLock<Option<RequestContext>>,
    pub session: Mutex<Option<DeliverySession>>,
    pub scanner: ScanVerifier,
    pub events_tx: broadcast::Sender<ProgressEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn DeliveryBackend>,
        geocoder: Arc<dyn Geocoder>,
        location_feed: Arc<ShellLocationFeed>,
        sampling: SamplingPolicy,
        fallback_destination: GeoPoint,
        event_buffer_size: usize,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            deps: FlowDeps {
                backend,
                geocoder,
                location: location_feed.clone(),
                sampling,
                fallback_destination,
            },
            location_feed,
            camera: ShellCamera::new(),
            credentials: RwLock::new(None),
            session: Mutex::new(None),
            scanner: ScanVerifier::new(),
            events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let backend = HttpBackend::new(&config.backend_url, config.request_timeout)
            .map_err(|err: BackendError| AppError::Internal(format!("backend client: {err}")))?;
        let geocoder = OpenCageGeocoder::new(
            &config.geocoder_url,
            config.opencage_api_key.clone(),
            config.request_timeout,
        )
        .map_err(|err| AppError::Internal(format!("geocoder client: {err}")))?;
        let sampling = SamplingPolicy {
            min_interval: config.location_interval,
            min_distance_m: config.location_distance_m,
        };

        Ok(Self::new(
            Arc::new(backend),
            Arc::new(geocoder),
            Arc::new(ShellLocationFeed::new()),
            sampling,
            config.fallback_destination,
            config.event_buffer_size,
        ))
    }

    pub async fn context(&self) -> Result<RequestContext, AppError> {
        self.credentials
            .read()
            .await
            .clone()
            .ok_or(AppError::Unauthorized)
    }

    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn sync_subscription_gauge(&self) {
        self.metrics
            .location_subscriptions_active
            .set(self.location_feed.active_subscriptions() as i64);
    }
}
