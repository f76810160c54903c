//! Location service fed by the platform UI shell.
//!
//! The shell owns the real platform APIs. It pushes raw fixes and permission
//! changes in here, and each subscription runs as its own task that applies the
//! sampling policy before publishing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::device::{Capability, DeviceError, LocationService, LocationSubscription, SamplingPolicy};
use crate::models::location::DeviceLocationSample;

pub struct ShellLocationFeed {
    raw_tx: watch::Sender<Option<DeviceLocationSample>>,
    permission_granted: AtomicBool,
    active_subscriptions: Arc<AtomicUsize>,
}

impl ShellLocationFeed {
    pub fn new() -> Self {
        let (raw_tx, _raw_rx) = watch::channel(None);
        Self {
            raw_tx,
            permission_granted: AtomicBool::new(true),
            active_subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push_fix(&self, sample: DeviceLocationSample) {
        self.raw_tx.send_replace(Some(sample));
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
        info!(granted, "location permission updated");
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active_subscriptions.load(Ordering::SeqCst)
    }

    fn ensure_permission(&self) -> Result<(), DeviceError> {
        if self.permission_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeviceError::PermissionDenied(Capability::Location))
        }
    }
}

impl Default for ShellLocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationService for ShellLocationFeed {
    async fn current_fix(&self) -> Result<DeviceLocationSample, DeviceError> {
        self.ensure_permission()?;
        (*self.raw_tx.borrow())
            .ok_or_else(|| DeviceError::Unavailable("no location fix yet".to_string()))
    }

    async fn subscribe(
        &self,
        policy: SamplingPolicy,
    ) -> Result<LocationSubscription, DeviceError> {
        self.ensure_permission()?;

        let mut raw_rx = self.raw_tx.subscribe();
        let (sample_tx, sample_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut last_emitted: Option<DeviceLocationSample> = None;
            loop {
                let next = *raw_rx.borrow_and_update();
                if let Some(sample) = next {
                    if policy.should_emit(last_emitted.as_ref(), &sample) {
                        sample_tx.send_replace(Some(sample));
                        last_emitted = Some(sample);
                    } else {
                        debug!("location fix throttled");
                    }
                }

                if raw_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let active = self.active_subscriptions.clone();
        active.fetch_add(1, Ordering::SeqCst);
        info!("location subscription started");

        Ok(LocationSubscription::new(sample_rx, move || {
            task.abort();
            active.fetch_sub(1, Ordering::SeqCst);
            info!("location subscription cancelled");
        }))
    }
}

/// Camera access as reported by the shell. Photos arrive as uploads, so only
/// the permission lives here.
pub struct ShellCamera {
    permission_granted: AtomicBool,
}

impl ShellCamera {
    pub fn new() -> Self {
        Self {
            permission_granted: AtomicBool::new(true),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
        info!(granted, "camera permission updated");
    }

    pub fn ensure_access(&self) -> Result<(), DeviceError> {
        if self.permission_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeviceError::PermissionDenied(Capability::Camera))
        }
    }
}

impl Default for ShellCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::{ShellCamera, ShellLocationFeed};
    use crate::device::{Capability, DeviceError, LocationService, SamplingPolicy};
    use crate::models::location::DeviceLocationSample;

    #[tokio::test]
    async fn current_fix_requires_a_pushed_sample() {
        let feed = ShellLocationFeed::new();
        assert!(matches!(
            feed.current_fix().await,
            Err(DeviceError::Unavailable(_))
        ));

        feed.push_fix(DeviceLocationSample::now(48.85, 2.35));
        let fix = feed.current_fix().await.unwrap();
        assert_eq!(fix.latitude, 48.85);
    }

    #[tokio::test]
    async fn denied_permission_blocks_fix_and_subscription() {
        let feed = ShellLocationFeed::new();
        feed.push_fix(DeviceLocationSample::now(48.85, 2.35));
        feed.set_permission(false);

        assert!(matches!(
            feed.current_fix().await,
            Err(DeviceError::PermissionDenied(_))
        ));
        assert!(feed.subscribe(SamplingPolicy::default()).await.is_err());
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn subscription_forwards_and_throttles() {
        let feed = ShellLocationFeed::new();
        let subscription = feed.subscribe(SamplingPolicy::default()).await.unwrap();
        let mut samples = subscription.watch();

        let first = DeviceLocationSample::now(48.85, 2.35);
        feed.push_fix(first);
        tokio::time::timeout(Duration::from_secs(1), samples.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.latest(), Some(first));

        // Same spot, a moment later: dropped by the throttle.
        feed.push_fix(DeviceLocationSample {
            timestamp: first.timestamp + chrono::Duration::milliseconds(200),
            ..first
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(subscription.latest(), Some(first));

        let moved = DeviceLocationSample {
            latitude: 48.86,
            longitude: 2.35,
            timestamp: Utc::now(),
        };
        feed.push_fix(moved);
        tokio::time::timeout(Duration::from_secs(1), samples.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.latest(), Some(moved));
    }

    #[tokio::test]
    async fn cancelling_releases_the_task() {
        let feed = ShellLocationFeed::new();
        let mut subscription = feed.subscribe(SamplingPolicy::default()).await.unwrap();
        let mut samples = subscription.watch();
        assert_eq!(feed.active_subscriptions(), 1);

        subscription.cancel();
        assert_eq!(feed.active_subscriptions(), 0);

        // The forwarding task owned the sender; once aborted the channel closes.
        tokio::time::timeout(Duration::from_secs(1), async {
            while samples.changed().await.is_ok() {}
        })
        .await
        .unwrap();

        drop(subscription);
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[test]
    fn camera_denial_names_the_capability() {
        let camera = ShellCamera::new();
        assert!(camera.ensure_access().is_ok());

        camera.set_permission(false);
        assert_eq!(
            camera.ensure_access(),
            Err(DeviceError::PermissionDenied(Capability::Camera))
        );

        camera.set_permission(true);
        assert!(camera.ensure_access().is_ok());
    }
}
