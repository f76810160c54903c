//! Forward geocoding of delivery addresses.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::location::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service answered but found nothing.
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSource {
    Geocoded,
    Fallback,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Destination {
    pub point: GeoPoint,
    pub source: DestinationSource,
}

pub async fn resolve_destination(
    geocoder: &dyn Geocoder,
    address: &str,
    fallback: GeoPoint,
) -> Destination {
    match geocoder.geocode(address).await {
        Ok(Some(point)) => Destination {
            point,
            source: DestinationSource::Geocoded,
        },
        Ok(None) => {
            info!(address, "no geocoding result; using fallback destination");
            Destination {
                point: fallback,
                source: DestinationSource::Fallback,
            }
        }
        Err(err) => {
            warn!(address, error = %err, "geocoding failed; using fallback destination");
            Destination {
                point: fallback,
                source: DestinationSource::Fallback,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    geometry: GeoPoint,
}

/// OpenCage forward geocoder. Without an API key every lookup yields `None`.
pub struct OpenCageGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenCageGeocoder {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }
        let Some(key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/geocode/v1/json", self.base_url))
            .query(&[
                ("q", address),
                ("key", key),
                ("limit", "1"),
                ("language", "fr"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let body: OpenCageResponse = response.json().await?;
        Ok(body.results.into_iter().next().map(|r| r.geometry))
    }
}
