use serde::Serialize;
use tracing::{error, info};

use crate::backend::{DeliveryBackend, RequestContext};
use crate::error::AppError;
use crate::models::delivery::DeliveryStatus;
use crate::models::location::DeviceLocationSample;
use crate::models::proof::{CapturedPhoto, PhotoSummary, ProofOfDelivery};

/// Collects the photo and location evidence for one delivery.
#[derive(Debug)]
pub struct ProofAssembler {
    delivery_id: i64,
    photo: Option<CapturedPhoto>,
    location: Option<DeviceLocationSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProofStatus {
    pub delivery_id: i64,
    pub photo: Option<PhotoSummary>,
    pub location: Option<DeviceLocationSample>,
    pub can_submit: bool,
}

impl ProofAssembler {
    pub fn new(delivery_id: i64) -> Self {
        Self {
            delivery_id,
            photo: None,
            location: None,
        }
    }

    pub fn delivery_id(&self) -> i64 {
        self.delivery_id
    }

    /// Retakes simply replace the previous photo.
    pub fn set_photo(&mut self, photo: CapturedPhoto) {
        if let Some(previous) = &self.photo {
            info!(delivery_id = self.delivery_id, previous = %previous.id, "photo retaken");
        }
        self.photo = Some(photo);
    }

    /// Location is captured once per proof; only [`reset`](Self::reset) clears it.
    pub fn capture_location(&mut self, sample: DeviceLocationSample) -> Result<(), AppError> {
        if self.location.is_some() {
            return Err(AppError::Conflict(
                "delivery location already captured".to_string(),
            ));
        }
        self.location = Some(sample);
        Ok(())
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn can_submit(&self) -> bool {
        self.photo.is_some() && self.location.is_some()
    }

    pub fn bundle(&self) -> Result<ProofOfDelivery, AppError> {
        let photo = self
            .photo
            .clone()
            .ok_or_else(|| AppError::BadRequest("delivery photo is required".to_string()))?;
        let location = self
            .location
            .ok_or_else(|| AppError::BadRequest("delivery location is required".to_string()))?;

        Ok(ProofOfDelivery {
            delivery_id: self.delivery_id,
            photo,
            location,
        })
    }

    /// Uploads the evidence, then marks the delivery delivered.
    ///
    /// The two requests are not atomic: if the status update fails after the
    /// upload succeeded, the backend keeps the proof and the status is
    /// unchanged. A resubmission sends both again.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        backend: &dyn DeliveryBackend,
    ) -> Result<(), AppError> {
        let proof = self.bundle()?;

        backend.upload_proof(ctx, &proof).await.map_err(|err| {
            error!(delivery_id = self.delivery_id, error = %err, "proof upload failed");
            AppError::from(err)
        })?;
        info!(delivery_id = self.delivery_id, "proof uploaded");

        backend
            .update_status(ctx, self.delivery_id, DeliveryStatus::Delivered)
            .await
            .map_err(|err| {
                error!(
                    delivery_id = self.delivery_id,
                    error = %err,
                    "status update failed after proof upload"
                );
                AppError::from(err)
            })?;
        info!(delivery_id = self.delivery_id, "delivery marked delivered");

        Ok(())
    }

    pub fn reset(&mut self) {
        self.photo = None;
        self.location = None;
    }

    pub fn status(&self) -> ProofStatus {
        ProofStatus {
            delivery_id: self.delivery_id,
            photo: self.photo.as_ref().map(PhotoSummary::from),
            location: self.location,
            can_submit: self.can_submit(),
        }
    }
}
