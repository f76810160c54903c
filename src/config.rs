use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::location::GeoPoint;

/// Destination used when an address cannot be geocoded.
pub const DEFAULT_FALLBACK_DESTINATION: GeoPoint = GeoPoint {
    lat: 48.866667,
    lng: 2.333333,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub backend_url: String,
    pub geocoder_url: String,
    pub opencage_api_key: Option<String>,
    pub fallback_destination: GeoPoint,
    pub request_timeout: Duration,
    pub location_interval: Duration,
    pub location_distance_m: f64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8787)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_or_default("LOG_JSON", false)?,
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://api.opencagedata.com".to_string()),
            opencage_api_key: env::var("OPENCAGE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            fallback_destination: GeoPoint {
                lat: parse_or_default("FALLBACK_LAT", DEFAULT_FALLBACK_DESTINATION.lat)?,
                lng: parse_or_default("FALLBACK_LNG", DEFAULT_FALLBACK_DESTINATION.lng)?,
            },
            request_timeout: Duration::from_secs(parse_or_default("REQUEST_TIMEOUT_SECS", 15)?),
            location_interval: Duration::from_millis(parse_or_default(
                "LOCATION_INTERVAL_MS",
                3000,
            )?),
            location_distance_m: parse_or_default("LOCATION_DISTANCE_M", 5.0)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
