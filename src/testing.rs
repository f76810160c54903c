//! In-memory stand-ins for the backend, geocoder and location service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{watch, Notify};

use crate::backend::{BackendError, DeliveryBackend, RequestContext};
use crate::device::{
    Capability, DeviceError, LocationService, LocationSubscription, SamplingPolicy,
};
use crate::geocoding::{GeocodeError, Geocoder};
use crate::models::delivery::{Client, Delivery, DeliveryStatus};
use crate::models::driver::DriverProfile;
use crate::models::location::{DeviceLocationSample, GeoPoint};
use crate::models::notification::Notification;
use crate::models::proof::ProofOfDelivery;
use crate::models::rating::RatingProfile;

pub fn ctx() -> RequestContext {
    RequestContext::new(42, "test-token")
}

pub fn delivery(id: i64, barcode: &str) -> Delivery {
    Delivery {
        id,
        barcode: Some(barcode.to_string()),
        address: Some("1 place Vendome, Paris".to_string()),
        status: Some(DeliveryStatus::Assigned),
        client: Some(Client {
            first_name: Some("Claire".to_string()),
            last_name: Some("Martin".to_string()),
            address: None,
            phone: Some("0601020304".to_string()),
        }),
        delivered_at: None,
    }
}

fn unavailable() -> BackendError {
    BackendError::Api {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub deliveries: Mutex<Vec<Delivery>>,
    pub fail_deliveries: AtomicBool,
    pub fail_scan: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_status: AtomicBool,
    pub scan_calls: AtomicUsize,
    pub uploads: Mutex<Vec<i64>>,
    pub status_updates: Mutex<Vec<(i64, DeliveryStatus)>>,
    scan_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn with_deliveries(deliveries: Vec<Delivery>) -> Self {
        Self {
            deliveries: Mutex::new(deliveries),
            ..Self::default()
        }
    }

    /// Holds every scan verification until the returned handle is notified.
    pub fn gate_scans(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.scan_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl DeliveryBackend for FakeBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<RequestContext, BackendError> {
        Ok(ctx())
    }

    async fn assigned_deliveries(
        &self,
        _ctx: &RequestContext,
    ) -> Result<Vec<Delivery>, BackendError> {
        if self.fail_deliveries.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.deliveries.lock().unwrap().clone())
    }

    async fn verify_scan(
        &self,
        _ctx: &RequestContext,
        delivery_id: i64,
        scanned_code: &str,
    ) -> Result<bool, BackendError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.scan_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let deliveries = self.deliveries.lock().unwrap();
        Ok(deliveries
            .iter()
            .find(|d| d.id == delivery_id)
            .and_then(|d| d.barcode.as_deref())
            == Some(scanned_code))
    }

    async fn upload_proof(
        &self,
        _ctx: &RequestContext,
        proof: &ProofOfDelivery,
    ) -> Result<(), BackendError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.uploads.lock().unwrap().push(proof.delivery_id);
        Ok(())
    }

    async fn update_status(
        &self,
        _ctx: &RequestContext,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), BackendError> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.status_updates.lock().unwrap().push((delivery_id, status));
        Ok(())
    }

    async fn delivery_history(&self, _ctx: &RequestContext) -> Result<Vec<Delivery>, BackendError> {
        Ok(Vec::new())
    }

    async fn notifications(&self, _ctx: &RequestContext) -> Result<Vec<Notification>, BackendError> {
        Ok(Vec::new())
    }

    async fn unread_notifications(&self, _ctx: &RequestContext) -> Result<u64, BackendError> {
        Ok(0)
    }

    async fn mark_notification_read(
        &self,
        _ctx: &RequestContext,
        _notification_id: i64,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn rating_profile(&self, _ctx: &RequestContext) -> Result<RatingProfile, BackendError> {
        Ok(RatingProfile {
            average: None,
            total: None,
            evaluations: Vec::new(),
        })
    }

    async fn driver_profile(&self, _ctx: &RequestContext) -> Result<DriverProfile, BackendError> {
        Ok(DriverProfile {
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            vehicle_plate: None,
            vehicle_type: None,
            rating: None,
        })
    }
}

pub enum FakeGeocoder {
    Found(GeoPoint),
    Empty,
    Failing,
}

impl FakeGeocoder {
    pub fn found(lat: f64, lng: f64) -> Self {
        FakeGeocoder::Found(GeoPoint { lat, lng })
    }

    pub fn empty() -> Self {
        FakeGeocoder::Empty
    }

    pub fn failing() -> Self {
        FakeGeocoder::Failing
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        match self {
            FakeGeocoder::Found(point) => Ok(Some(*point)),
            FakeGeocoder::Empty => Ok(None),
            FakeGeocoder::Failing => Err(GeocodeError::Status(500)),
        }
    }
}

/// Location service whose subscriptions are driven by the test through
/// [`FakeLocation::emit`], counting every subscribe and cancel.
pub struct FakeLocation {
    pub fix: Mutex<Option<DeviceLocationSample>>,
    pub denied: AtomicBool,
    pub subscribes: AtomicUsize,
    pub cancels: Arc<AtomicUsize>,
    sender: Mutex<Option<watch::Sender<Option<DeviceLocationSample>>>>,
}

impl FakeLocation {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            fix: Mutex::new(Some(DeviceLocationSample::now(lat, lng))),
            denied: AtomicBool::new(false),
            subscribes: AtomicUsize::new(0),
            cancels: Arc::new(AtomicUsize::new(0)),
            sender: Mutex::new(None),
        }
    }

    pub fn emit(&self, sample: DeviceLocationSample) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            sender.send_replace(Some(sample));
        }
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationService for FakeLocation {
    async fn current_fix(&self) -> Result<DeviceLocationSample, DeviceError> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied(Capability::Location));
        }
        (*self.fix.lock().unwrap())
            .ok_or_else(|| DeviceError::Unavailable("no fix".to_string()))
    }

    async fn subscribe(
        &self,
        _policy: SamplingPolicy,
    ) -> Result<LocationSubscription, DeviceError> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied(Capability::Location));
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = watch::channel(None);
        *self.sender.lock().unwrap() = Some(tx);

        let cancels = self.cancels.clone();
        Ok(LocationSubscription::new(rx, move || {
            cancels.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
