//! The delivery backend, as seen by the driver client.
//!
//! Every call takes an explicit [`RequestContext`]; nothing here reads
//! credentials from ambient storage.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::DriverProfile;
use crate::models::notification::Notification;
use crate::models::proof::ProofOfDelivery;
use crate::models::rating::RatingProfile;

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Credentials for the signed-in driver, passed to every backend call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestContext {
    pub driver_id: i64,
    pub token: Option<String>,
}

impl RequestContext {
    pub fn new(driver_id: i64, token: impl Into<String>) -> Self {
        Self {
            driver_id,
            token: Some(token.into()),
        }
    }
}

#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<RequestContext, BackendError>;

    async fn assigned_deliveries(&self, ctx: &RequestContext)
        -> Result<Vec<Delivery>, BackendError>;

    /// Returns whether the scanned code matches the delivery's parcel.
    async fn verify_scan(
        &self,
        ctx: &RequestContext,
        delivery_id: i64,
        scanned_code: &str,
    ) -> Result<bool, BackendError>;

    async fn upload_proof(
        &self,
        ctx: &RequestContext,
        proof: &ProofOfDelivery,
    ) -> Result<(), BackendError>;

    async fn update_status(
        &self,
        ctx: &RequestContext,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), BackendError>;

    async fn delivery_history(&self, ctx: &RequestContext) -> Result<Vec<Delivery>, BackendError>;

    async fn notifications(&self, ctx: &RequestContext) -> Result<Vec<Notification>, BackendError>;

    async fn unread_notifications(&self, ctx: &RequestContext) -> Result<u64, BackendError>;

    async fn mark_notification_read(
        &self,
        ctx: &RequestContext,
        notification_id: i64,
    ) -> Result<(), BackendError>;

    async fn rating_profile(&self, ctx: &RequestContext) -> Result<RatingProfile, BackendError>;

    async fn driver_profile(&self, ctx: &RequestContext) -> Result<DriverProfile, BackendError>;
}
