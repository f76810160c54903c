//! Device capabilities consumed by the delivery flow.
//!
//! The flow only ever sees the latest location fix: subscriptions publish
//! through a `watch` channel, so a newer sample replaces an unread older one.

pub mod shell;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::geo::distance_km;
use crate::models::location::DeviceLocationSample;

pub use shell::{ShellCamera, ShellLocationFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Location,
    Camera,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Location => write!(f, "location"),
            Capability::Camera => write!(f, "camera"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeviceError {
    #[error("{0} permission denied")]
    PermissionDenied(Capability),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Throttle applied to continuous location updates: a fix is forwarded once
/// either the interval has elapsed or the device has moved far enough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPolicy {
    pub min_interval: Duration,
    pub min_distance_m: f64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(3),
            min_distance_m: 5.0,
        }
    }
}

impl SamplingPolicy {
    pub fn should_emit(
        &self,
        last: Option<&DeviceLocationSample>,
        next: &DeviceLocationSample,
    ) -> bool {
        let Some(last) = last else {
            return true;
        };

        let elapsed = next
            .timestamp
            .signed_duration_since(last.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.min_interval {
            return true;
        }

        distance_km(&last.point(), &next.point()) * 1000.0 >= self.min_distance_m
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// A live location subscription.
///
/// Cancellation runs exactly once: on the first explicit [`cancel`] or, failing
/// that, when the subscription is dropped.
///
/// [`cancel`]: LocationSubscription::cancel
pub struct LocationSubscription {
    samples: watch::Receiver<Option<DeviceLocationSample>>,
    cancel: Option<CancelFn>,
}

impl LocationSubscription {
    pub fn new(
        samples: watch::Receiver<Option<DeviceLocationSample>>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            samples,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn latest(&self) -> Option<DeviceLocationSample> {
        *self.samples.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Option<DeviceLocationSample>> {
        self.samples.clone()
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for LocationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationSubscription")
            .field("latest", &self.latest())
            .field("active", &self.is_active())
            .finish()
    }
}

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn current_fix(&self) -> Result<DeviceLocationSample, DeviceError>;

    async fn subscribe(&self, policy: SamplingPolicy)
        -> Result<LocationSubscription, DeviceError>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::watch;

    use super::{LocationSubscription, SamplingPolicy};
    use crate::models::location::DeviceLocationSample;

    fn sample_at(lat: f64, lng: f64, offset_ms: i64) -> DeviceLocationSample {
        DeviceLocationSample {
            latitude: lat,
            longitude: lng,
            timestamp: Utc::now() + chrono::Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn first_sample_is_always_emitted() {
        let policy = SamplingPolicy::default();
        assert!(policy.should_emit(None, &sample_at(48.0, 2.0, 0)));
    }

    #[test]
    fn close_and_recent_sample_is_throttled() {
        let policy = SamplingPolicy::default();
        let last = sample_at(48.0, 2.0, 0);
        let next = DeviceLocationSample {
            timestamp: last.timestamp + chrono::Duration::milliseconds(500),
            ..last
        };
        assert!(!policy.should_emit(Some(&last), &next));
    }

    #[test]
    fn elapsed_interval_or_movement_releases_sample() {
        let policy = SamplingPolicy {
            min_interval: Duration::from_secs(3),
            min_distance_m: 5.0,
        };
        let last = sample_at(48.0, 2.0, 0);

        let later = DeviceLocationSample {
            timestamp: last.timestamp + chrono::Duration::seconds(3),
            ..last
        };
        assert!(policy.should_emit(Some(&last), &later));

        // ~11 m north, half a second later
        let moved = DeviceLocationSample {
            latitude: last.latitude + 0.0001,
            timestamp: last.timestamp + chrono::Duration::milliseconds(500),
            ..last
        };
        assert!(policy.should_emit(Some(&last), &moved));
    }

    #[test]
    fn subscription_cancels_exactly_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = watch::channel(None);

        let counter = cancels.clone();
        let mut subscription = LocationSubscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();
        subscription.cancel();
        assert!(!subscription.is_active());
        drop(subscription);

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_cancels() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = watch::channel(None);

        let counter = cancels.clone();
        let subscription = LocationSubscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }
}
