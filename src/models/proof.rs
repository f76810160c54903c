use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::location::DeviceLocationSample;

/// A still image handed over by the camera.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedPhoto {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes,
            content_type: content_type.into(),
            captured_at: Utc::now(),
        }
    }
}

/// A complete evidence bundle. Only built when both parts are present.
#[derive(Debug, Clone)]
pub struct ProofOfDelivery {
    pub delivery_id: i64,
    pub photo: CapturedPhoto,
    pub location: DeviceLocationSample,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoSummary {
    pub id: Uuid,
    pub size_bytes: usize,
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
}

impl From<&CapturedPhoto> for PhotoSummary {
    fn from(photo: &CapturedPhoto) -> Self {
        Self {
            id: photo.id,
            size_bytes: photo.bytes.len(),
            content_type: photo.content_type.clone(),
            captured_at: photo.captured_at,
        }
    }
}
