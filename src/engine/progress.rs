use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::{DeliveryBackend, RequestContext};
use crate::device::{LocationService, LocationSubscription, SamplingPolicy};
use crate::engine::proof::ProofAssembler;
use crate::error::AppError;
use crate::geo::ProgressEstimate;
use crate::geocoding::{resolve_destination, Destination, Geocoder};
use crate::models::delivery::ActiveDelivery;
use crate::models::location::{DeviceLocationSample, GeoPoint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    NoDeliveryAssigned,
    NetworkError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason")]
pub enum ProgressState {
    Loading,
    AwaitingStart,
    Tracking,
    ArrivedPendingProof,
    Completed,
    Failed(FailureReason),
}

/// Collaborators shared by every delivery flow.
#[derive(Clone)]
pub struct FlowDeps {
    pub backend: Arc<dyn DeliveryBackend>,
    pub geocoder: Arc<dyn Geocoder>,
    pub location: Arc<dyn LocationService>,
    pub sampling: SamplingPolicy,
    pub fallback_destination: GeoPoint,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub state: ProgressState,
    pub delivery: Option<ActiveDelivery>,
    pub destination: Option<Destination>,
    pub last_sample: Option<DeviceLocationSample>,
    pub estimate: Option<ProgressEstimate>,
    pub distance_label: Option<String>,
    pub eta_label: Option<String>,
    pub package_verified: bool,
    pub tracking_active: bool,
}

/// Drives one assigned delivery from load to completion.
pub struct DeliveryProgress {
    deps: FlowDeps,
    state: ProgressState,
    delivery: Option<ActiveDelivery>,
    destination: Option<Destination>,
    last_sample: Option<DeviceLocationSample>,
    estimate: Option<ProgressEstimate>,
    package_verified: bool,
    subscription: Option<LocationSubscription>,
}

impl DeliveryProgress {
    pub fn new(deps: FlowDeps) -> Self {
        Self {
            deps,
            state: ProgressState::Loading,
            delivery: None,
            destination: None,
            last_sample: None,
            estimate: None,
            package_verified: false,
            subscription: None,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn delivery(&self) -> Option<&ActiveDelivery> {
        self.delivery.as_ref()
    }

    pub fn estimate(&self) -> Option<ProgressEstimate> {
        self.estimate
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    fn expect_state(&self, expected: ProgressState, action: &str) -> Result<(), AppError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "cannot {action} while {:?}",
                self.state
            )))
        }
    }

    /// Fetches the first assigned delivery and resolves its destination.
    ///
    /// Failures land in [`ProgressState::Failed`] rather than an `Err`; the
    /// only error is calling this outside `Loading`.
    pub async fn load(&mut self, ctx: &RequestContext) -> Result<&ProgressState, AppError> {
        self.expect_state(ProgressState::Loading, "load a delivery")?;

        let deliveries = match self.deps.backend.assigned_deliveries(ctx).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                warn!(driver_id = ctx.driver_id, error = %err, "failed to load assigned deliveries");
                self.state = ProgressState::Failed(FailureReason::NetworkError(err.to_string()));
                return Ok(&self.state);
            }
        };

        let Some(first) = deliveries.first() else {
            info!(driver_id = ctx.driver_id, "no delivery assigned");
            self.state = ProgressState::Failed(FailureReason::NoDeliveryAssigned);
            return Ok(&self.state);
        };

        let delivery = ActiveDelivery::from(first);
        let destination = resolve_destination(
            self.deps.geocoder.as_ref(),
            &delivery.destination_address,
            self.deps.fallback_destination,
        )
        .await;

        info!(
            delivery_id = delivery.id,
            package_id = %delivery.package_id,
            source = ?destination.source,
            "delivery loaded"
        );
        self.delivery = Some(delivery);
        self.destination = Some(destination);
        self.state = ProgressState::AwaitingStart;

        match self.deps.location.current_fix().await {
            Ok(sample) => self.record_sample(sample),
            Err(err) => warn!(error = %err, "no initial location fix"),
        }

        Ok(&self.state)
    }

    /// Begins continuous location sampling.
    pub async fn start_trip(&mut self) -> Result<(), AppError> {
        self.expect_state(ProgressState::AwaitingStart, "start the trip")?;

        let subscription = self.deps.location.subscribe(self.deps.sampling).await?;
        if let Some(sample) = subscription.latest() {
            self.record_sample(sample);
        }
        self.subscription = Some(subscription);
        self.state = ProgressState::Tracking;

        info!(delivery_id = self.delivery_id(), "trip started");
        Ok(())
    }

    /// Watch handle on the live location feed, while tracking.
    pub fn sample_watch(&self) -> Option<watch::Receiver<Option<DeviceLocationSample>>> {
        self.subscription.as_ref().map(LocationSubscription::watch)
    }

    /// Recomputes the estimate from a new sample. Ignored unless tracking.
    pub fn apply_sample(&mut self, sample: DeviceLocationSample) -> Option<ProgressEstimate> {
        if self.state != ProgressState::Tracking {
            return None;
        }
        self.record_sample(sample);
        self.estimate
    }

    /// Pulls the latest sample from the subscription, if it is newer.
    pub fn refresh(&mut self) -> Option<ProgressEstimate> {
        let latest = self.subscription.as_ref().and_then(LocationSubscription::latest);
        match latest {
            Some(sample) if Some(sample) != self.last_sample => self.apply_sample(sample),
            _ => self.estimate,
        }
    }

    fn record_sample(&mut self, sample: DeviceLocationSample) {
        self.last_sample = Some(sample);
        if let Some(destination) = &self.destination {
            self.estimate = Some(ProgressEstimate::between(&sample.point(), &destination.point));
        }
    }

    /// A matched scan for `delivery_id`; in `AwaitingStart` it also starts the trip.
    ///
    /// A verdict for any other delivery is refused and changes nothing.
    pub async fn mark_package_verified(&mut self, delivery_id: i64) -> Result<(), AppError> {
        if self.delivery_id() != Some(delivery_id) {
            return Err(AppError::Conflict(format!(
                "scan was for delivery {delivery_id}, not the one on screen"
            )));
        }
        match self.state {
            ProgressState::AwaitingStart => {
                self.package_verified = true;
                self.start_trip().await
            }
            ProgressState::Tracking | ProgressState::ArrivedPendingProof => {
                self.package_verified = true;
                Ok(())
            }
            _ => Err(AppError::Conflict(format!(
                "cannot verify a package while {:?}",
                self.state
            ))),
        }
    }

    /// Explicit arrival confirmation; stops location sampling.
    pub fn confirm_arrival(&mut self) -> Result<(), AppError> {
        self.expect_state(ProgressState::Tracking, "confirm arrival")?;
        self.release_subscription();
        self.state = ProgressState::ArrivedPendingProof;

        info!(delivery_id = self.delivery_id(), "arrival confirmed");
        Ok(())
    }

    /// Submits the proof and completes the delivery.
    pub async fn complete(
        &mut self,
        ctx: &RequestContext,
        proof: &ProofAssembler,
    ) -> Result<(), AppError> {
        self.expect_state(ProgressState::ArrivedPendingProof, "submit proof")?;
        if Some(proof.delivery_id()) != self.delivery_id() {
            return Err(AppError::BadRequest(
                "proof belongs to another delivery".to_string(),
            ));
        }

        proof.submit(ctx, self.deps.backend.as_ref()).await?;
        self.state = ProgressState::Completed;

        info!(delivery_id = proof.delivery_id(), "delivery completed");
        Ok(())
    }

    /// Leaving the screen. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.release_subscription();
    }

    fn release_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.subscription.is_some()
    }

    fn delivery_id(&self) -> Option<i64> {
        self.delivery.as_ref().map(|d| d.id)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state.clone(),
            delivery: self.delivery.clone(),
            destination: self.destination,
            last_sample: self.last_sample,
            estimate: self.estimate,
            distance_label: self.estimate.map(|e| e.distance_label()),
            eta_label: self.estimate.map(|e| e.eta_label()),
            package_verified: self.package_verified,
            tracking_active: self.is_tracking(),
        }
    }
}
