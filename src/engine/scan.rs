use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{DeliveryBackend, RequestContext};
use crate::error::AppError;
use crate::models::scan::{ScanAttempt, ScanOutcome, ScanSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "attempt")]
pub enum ScanState {
    Idle,
    AwaitingServerResult(ScanAttempt),
    Resolved(ScanAttempt),
}

/// What happened to a submitted scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSubmission {
    /// Another verification was already in flight; nothing was sent.
    Ignored,
    Resolved(ScanOutcome),
}

/// Barcode verification with a single in-flight request.
///
/// The state lock is only ever held between awaits, so a scan event arriving
/// while a verification is pending sees `AwaitingServerResult` and is dropped.
#[derive(Debug)]
pub struct ScanVerifier {
    state: Mutex<ScanState>,
}

impl Default for ScanVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanVerifier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScanState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ScanState {
        self.lock().clone()
    }

    pub async fn submit_scan(
        &self,
        ctx: &RequestContext,
        backend: &dyn DeliveryBackend,
        delivery_id: i64,
        candidate: &str,
        source: ScanSource,
    ) -> Result<ScanSubmission, AppError> {
        let code = match source {
            ScanSource::Manual => candidate.trim(),
            ScanSource::Camera => candidate,
        };

        let mut in_flight = {
            let mut state = self.lock();
            if matches!(*state, ScanState::AwaitingServerResult(_)) {
                info!(delivery_id, "scan ignored: verification already in flight");
                return Ok(ScanSubmission::Ignored);
            }
            if code.is_empty() {
                return Err(AppError::BadRequest("barcode cannot be empty".to_string()));
            }
            *state = ScanState::AwaitingServerResult(ScanAttempt {
                scanned_value: code.to_string(),
                source,
                outcome: ScanOutcome::Pending,
                started_at: Utc::now(),
            });
            InFlight::new(self)
        };

        let verdict = backend.verify_scan(ctx, delivery_id, code).await;

        let mut state = self.lock();
        in_flight.disarm();
        let mut attempt = match std::mem::replace(&mut *state, ScanState::Idle) {
            ScanState::AwaitingServerResult(attempt) => attempt,
            other => {
                *state = other;
                return Err(AppError::Internal("scan state changed while in flight".to_string()));
            }
        };

        match verdict {
            Ok(matched) => {
                attempt.outcome = if matched {
                    ScanOutcome::Matched
                } else {
                    ScanOutcome::Rejected
                };
                info!(delivery_id, code, outcome = ?attempt.outcome, "scan verified");
                let outcome = attempt.outcome;
                *state = ScanState::Resolved(attempt);
                Ok(ScanSubmission::Resolved(outcome))
            }
            Err(err) => {
                warn!(delivery_id, code, error = %err, "scan verification failed");
                Err(AppError::from(err))
            }
        }
    }

    /// After a rejection, clears the captured code so the driver can scan again.
    pub fn retry(&self) -> Result<(), AppError> {
        let mut state = self.lock();
        match &*state {
            ScanState::Resolved(attempt) if attempt.outcome == ScanOutcome::Rejected => {
                *state = ScanState::Idle;
                Ok(())
            }
            ScanState::Idle => Ok(()),
            _ => Err(AppError::Conflict("no rejected scan to retry".to_string())),
        }
    }

    /// Abandons the scan flow. A pending verification cannot be cancelled.
    pub fn cancel(&self) -> Result<(), AppError> {
        let mut state = self.lock();
        if matches!(*state, ScanState::AwaitingServerResult(_)) {
            return Err(AppError::Conflict("scan verification in flight".to_string()));
        }
        *state = ScanState::Idle;
        Ok(())
    }
}

/// Returns the verifier to `Idle` if a submission is dropped mid-verification.
struct InFlight<'a> {
    verifier: &'a ScanVerifier,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(verifier: &'a ScanVerifier) -> Self {
        Self {
            verifier,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.verifier.lock();
        if matches!(*state, ScanState::AwaitingServerResult(_)) {
            warn!("scan verification abandoned; back to idle");
            *state = ScanState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ScanState, ScanSubmission, ScanVerifier};
    use crate::error::AppError;
    use crate::models::scan::{ScanOutcome, ScanSource};
    use crate::testing::{ctx, delivery, FakeBackend};

    fn backend() -> Arc<FakeBackend> {
        Arc::new(FakeBackend::with_deliveries(vec![delivery(1, "PKG001234")]))
    }

    #[tokio::test]
    async fn expected_code_matches_and_wrong_code_is_rejected() {
        let backend = backend();
        let verifier = ScanVerifier::new();

        let matched = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
            .await
            .unwrap();
        assert_eq!(matched, ScanSubmission::Resolved(ScanOutcome::Matched));

        let rejected = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "WRONG", ScanSource::Camera)
            .await
            .unwrap();
        assert_eq!(rejected, ScanSubmission::Resolved(ScanOutcome::Rejected));
        assert!(matches!(verifier.state(), ScanState::Resolved(a) if a.scanned_value == "WRONG"));
    }

    #[tokio::test]
    async fn manual_entry_is_trimmed_and_blank_is_refused() {
        let backend = backend();
        let verifier = ScanVerifier::new();

        let matched = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "  PKG001234 ", ScanSource::Manual)
            .await
            .unwrap();
        assert_eq!(matched, ScanSubmission::Resolved(ScanOutcome::Matched));

        let blank = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "   ", ScanSource::Manual)
            .await;
        assert!(matches!(blank, Err(AppError::BadRequest(_))));
        assert_eq!(backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_scan_while_in_flight_is_ignored() {
        let backend = backend();
        let gate = backend.gate_scans();
        let verifier = Arc::new(ScanVerifier::new());

        let first = {
            let verifier = verifier.clone();
            let backend = backend.clone();
            tokio::spawn(async move {
                verifier
                    .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(1), async {
            while backend.scan_calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let state_before = verifier.state();
        let second = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Manual)
            .await
            .unwrap();
        assert_eq!(second, ScanSubmission::Ignored);
        assert_eq!(verifier.state(), state_before);
        assert_eq!(backend.scan_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, ScanSubmission::Resolved(ScanOutcome::Matched));
        assert_eq!(backend.scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_submission_returns_to_idle() {
        let backend = backend();
        let gate = backend.gate_scans();
        let verifier = Arc::new(ScanVerifier::new());

        let pending = {
            let verifier = verifier.clone();
            let backend = backend.clone();
            tokio::spawn(async move {
                verifier
                    .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(1), async {
            while backend.scan_calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(verifier.state(), ScanState::AwaitingServerResult(_)));

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(verifier.state(), ScanState::Idle);
        verifier.cancel().unwrap();

        gate.notify_one();
        let again = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
            .await
            .unwrap();
        assert_eq!(again, ScanSubmission::Resolved(ScanOutcome::Matched));
        assert_eq!(backend.scan_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn network_failure_is_distinct_from_rejection() {
        let backend = backend();
        backend.fail_scan.store(true, Ordering::SeqCst);
        let verifier = ScanVerifier::new();

        let result = verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
            .await;
        assert!(matches!(result, Err(AppError::Network(_))));
        assert_eq!(verifier.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn retry_resets_rejection_and_cancel_aborts() {
        let backend = backend();
        let verifier = ScanVerifier::new();

        verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "WRONG", ScanSource::Camera)
            .await
            .unwrap();
        verifier.retry().unwrap();
        assert_eq!(verifier.state(), ScanState::Idle);

        verifier
            .submit_scan(&ctx(), backend.as_ref(), 1, "PKG001234", ScanSource::Camera)
            .await
            .unwrap();
        assert!(matches!(verifier.retry(), Err(AppError::Conflict(_))));

        verifier.cancel().unwrap();
        assert_eq!(verifier.state(), ScanState::Idle);
    }
}
