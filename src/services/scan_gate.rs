//! QR check-in gate.
//!
//! The camera keeps reporting the same code for as long as it stays in frame,
//! so the handler is re-entered many times per physical scan. [`ScanGate`]
//! turns that stream into at most one `user_visits` insert:
//!
//! 1. Empty payloads and payloads arriving while the [`ScanLock`] is held are dropped.
//! 2. Payloads that are not a canonical UUID v4 are rejected with a notice;
//!    the lock is never taken.
//! 3. Otherwise the lock is taken, the current user is resolved and the visit
//!    is written. Any failure releases the lock.
//! 4. On success the permit is retained: the screen navigates away and the
//!    next mount resets the lock.
//!
//! The lock is also force-released when the host app returns to the
//! foreground, which recovers from a check-in interrupted by an app switch.

use crate::backend::{BackendError, DataService, IdentityService, tables};
use crate::clock::Clock;
use crate::models::{AppLifecycle, CheckInEvent, Notice};
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use thiserror::Error;

static CLUB_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("Invalid club id regex")
});

/// True when `payload` is a canonical version-4 UUID (any case)
pub fn is_valid_club_id(payload: &str) -> bool {
    CLUB_ID_PATTERN.is_match(payload)
}

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    generation: u64,
}

/// Single-permit lock guarding the check-in handler.
///
/// Not a queue: a failed [`try_acquire`](Self::try_acquire) means the caller
/// drops its event. Each acquisition gets a generation number so a permit
/// from before a [`force_release`](Self::force_release) can never release a
/// later holder.
#[derive(Debug, Default)]
pub struct ScanLock {
    state: Mutex<LockState>,
}

impl ScanLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().unwrap().held
    }

    /// Take the lock if it is free
    pub fn try_acquire(self: &Arc<Self>) -> Option<ScanPermit> {
        let mut state = self.state.lock().unwrap();
        if state.held {
            return None;
        }

        state.held = true;
        state.generation += 1;

        Some(ScanPermit {
            lock: Arc::clone(self),
            generation: state.generation,
            armed: true,
        })
    }

    /// Release regardless of who holds it. Returns whether it was held.
    pub fn force_release(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let was_held = state.held;
        state.held = false;
        state.generation += 1;
        was_held
    }

    fn release(&self, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.held && state.generation == generation {
            state.held = false;
        }
    }
}

/// Proof of holding the [`ScanLock`]. Dropping it releases the lock.
#[derive(Debug)]
pub struct ScanPermit {
    lock: Arc<ScanLock>,
    generation: u64,
    armed: bool,
}

impl ScanPermit {
    /// Keep the lock held after this permit goes away (successful check-in)
    pub fn retain(mut self) {
        self.armed = false;
    }
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        if self.armed {
            self.lock.release(self.generation);
        }
    }
}

/// Why a check-in attempt stopped after the lock was taken
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Failed to resolve current user: {0}")]
    Identity(#[source] BackendError),

    #[error("Failed to record visit: {0}")]
    Write(#[source] BackendError),
}

impl ScanError {
    pub fn notice(&self) -> Notice {
        match self {
            ScanError::NotSignedIn | ScanError::Identity(_) => Notice::new(
                "Not signed in",
                "Please sign in again before checking in.",
            ),
            ScanError::Write(_) => Notice::new(
                "Check-in failed",
                "Your visit could not be recorded. Please scan again.",
            ),
        }
    }
}

/// Result of feeding one camera event to the gate
#[derive(Debug)]
pub enum ScanOutcome {
    /// Empty payload or lock held; nothing happened
    Dropped,

    /// Payload is not a club id; lock untouched
    Rejected { notice: Notice },

    /// Visit recorded; the caller should show the notice and navigate back
    CheckedIn { event: CheckInEvent, notice: Notice },

    /// Lock was taken and released again
    Failed { error: ScanError, notice: Notice },
}

impl ScanOutcome {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            ScanOutcome::Dropped => None,
            ScanOutcome::Rejected { notice }
            | ScanOutcome::CheckedIn { notice, .. }
            | ScanOutcome::Failed { notice, .. } => Some(notice),
        }
    }
}

/// Turns camera payloads into at most one check-in per scan session.
pub struct ScanGate {
    lock: Arc<ScanLock>,
    identity: Arc<dyn IdentityService>,
    data: Arc<dyn DataService>,
    clock: Arc<dyn Clock>,
    lifecycle: Mutex<AppLifecycle>,
}

impl ScanGate {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        data: Arc<dyn DataService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lock: ScanLock::new(),
            identity,
            data,
            clock,
            lifecycle: Mutex::new(AppLifecycle::Active),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// The scan screen was (re)mounted; nothing from a previous mount may leak in
    pub fn on_mount(&self) {
        if self.lock.force_release() {
            tracing::debug!("Scan lock reset on mount");
        }
    }

    /// Feed a lifecycle transition. Returns true when it reset the lock.
    pub fn on_lifecycle(&self, next: AppLifecycle) -> bool {
        let mut current = self.lifecycle.lock().unwrap();
        let resumed = matches!(*current, AppLifecycle::Inactive | AppLifecycle::Background)
            && next == AppLifecycle::Active;
        *current = next;
        drop(current);

        if resumed {
            let was_held = self.lock.force_release();
            tracing::info!("App resumed, scan lock released (was held: {})", was_held);
        }
        resumed
    }

    /// Handle one payload reported by the camera
    pub async fn handle_scan(&self, payload: &str) -> ScanOutcome {
        if payload.is_empty() || self.lock.is_held() {
            return ScanOutcome::Dropped;
        }

        if !is_valid_club_id(payload) {
            tracing::info!("Rejected scanned payload that is not a club id");
            return ScanOutcome::Rejected {
                notice: Notice::new("Invalid QR Code", "Scanned QR code is not a valid club ID."),
            };
        }

        let Some(permit) = self.lock.try_acquire() else {
            return ScanOutcome::Dropped;
        };

        // From here on every early return drops the permit, which releases the lock
        let user = match self.identity.get_current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return Self::fail(ScanError::NotSignedIn),
            Err(e) => return Self::fail(ScanError::Identity(e)),
        };

        let event = CheckInEvent {
            user_id: user.id,
            club_id: payload.to_string(),
            visit_time: self.clock.now_utc(),
        };

        if let Err(e) = self
            .data
            .insert(tables::USER_VISITS, vec![event.to_row()])
            .await
        {
            return Self::fail(ScanError::Write(e));
        }

        tracing::info!("Checked in user {} at club {}", event.user_id, event.club_id);
        permit.retain();

        ScanOutcome::CheckedIn {
            event,
            notice: Notice::new("Success", "Successfully checked in!"),
        }
    }

    fn fail(error: ScanError) -> ScanOutcome {
        tracing::warn!("Check-in aborted: {}", error);
        let notice = error.notice();
        ScanOutcome::Failed { error, notice }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockDataService, MockIdentityService};
    use crate::clock::FixedClock;
    use crate::models::User;
    use chrono::NaiveDate;

    const CLUB_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2026, 10, 17)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        ))
    }

    fn signed_in_identity() -> MockIdentityService {
        let mut identity = MockIdentityService::new();
        identity.expect_get_current_user().returning(|| {
            Ok(Some(User {
                id: "user-1".to_string(),
                email: None,
            }))
        });
        identity
    }

    #[test]
    fn test_club_id_pattern() {
        assert!(is_valid_club_id(CLUB_ID));
        assert!(is_valid_club_id(&CLUB_ID.to_uppercase()));
        assert!(!is_valid_club_id("not-a-uuid"));
        // Version nibble must be 4
        assert!(!is_valid_club_id("3fa85f64-5717-1562-b3fc-2c963f66afa6"));
        // Variant nibble must be 8, 9, a or b
        assert!(!is_valid_club_id("3fa85f64-5717-4562-c3fc-2c963f66afa6"));
        assert!(!is_valid_club_id(&format!(" {}", CLUB_ID)));
    }

    #[test]
    fn test_lock_single_permit() {
        let lock = ScanLock::new();
        let permit = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());

        drop(permit);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_retained_permit_keeps_lock() {
        let lock = ScanLock::new();
        lock.try_acquire().unwrap().retain();
        assert!(lock.is_held());
        assert!(lock.force_release());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_stale_permit_cannot_release_new_holder() {
        let lock = ScanLock::new();
        let stale = lock.try_acquire().unwrap();

        lock.force_release();
        let _current = lock.try_acquire().unwrap();

        drop(stale);
        assert!(lock.is_held());
    }

    #[tokio::test]
    async fn test_invalid_payload_never_touches_backend() {
        let mut identity = MockIdentityService::new();
        identity.expect_get_current_user().never();
        let mut data = MockDataService::new();
        data.expect_insert().never();

        let gate = ScanGate::new(Arc::new(identity), Arc::new(data), clock());
        let outcome = gate.handle_scan("not-a-uuid").await;

        assert!(matches!(outcome, ScanOutcome::Rejected { .. }));
        assert_eq!(outcome.notice().unwrap().title, "Invalid QR Code");
        assert!(!gate.is_locked());
    }

    #[tokio::test]
    async fn test_successful_check_in_writes_once_and_keeps_lock() {
        let mut data = MockDataService::new();
        data.expect_insert()
            .withf(|table, rows| {
                table == "user_visits"
                    && rows.len() == 1
                    && rows[0]["club_id"] == CLUB_ID
                    && rows[0]["user_id"] == "user-1"
                    && rows[0]["visit_time"] == "2026-10-17T08:00:00.000Z"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let gate = ScanGate::new(Arc::new(signed_in_identity()), Arc::new(data), clock());

        let outcome = gate.handle_scan(CLUB_ID).await;
        assert!(matches!(outcome, ScanOutcome::CheckedIn { .. }));
        assert_eq!(
            outcome.notice().unwrap().message,
            "Successfully checked in!"
        );
        assert!(gate.is_locked());

        // Camera still sees the code
        for _ in 0..5 {
            assert!(matches!(gate.handle_scan(CLUB_ID).await, ScanOutcome::Dropped));
        }
    }

    #[tokio::test]
    async fn test_missing_user_releases_lock() {
        let mut identity = MockIdentityService::new();
        identity.expect_get_current_user().returning(|| Ok(None));
        let mut data = MockDataService::new();
        data.expect_insert().never();

        let gate = ScanGate::new(Arc::new(identity), Arc::new(data), clock());
        let outcome = gate.handle_scan(CLUB_ID).await;

        assert!(matches!(
            outcome,
            ScanOutcome::Failed {
                error: ScanError::NotSignedIn,
                ..
            }
        ));
        assert!(!gate.is_locked());
    }

    #[tokio::test]
    async fn test_identity_error_releases_lock() {
        let mut identity = MockIdentityService::new();
        identity
            .expect_get_current_user()
            .returning(|| Err(BackendError::NotAuthenticated));

        let gate = ScanGate::new(
            Arc::new(identity),
            Arc::new(MockDataService::new()),
            clock(),
        );
        let outcome = gate.handle_scan(CLUB_ID).await;

        assert!(matches!(
            outcome,
            ScanOutcome::Failed {
                error: ScanError::Identity(_),
                ..
            }
        ));
        assert!(!gate.is_locked());
    }

    #[tokio::test]
    async fn test_write_failure_releases_lock_and_allows_rescan() {
        let mut data = MockDataService::new();
        let mut attempts = 0;
        data.expect_insert().times(2).returning(move |_, _| {
            attempts += 1;
            if attempts == 1 {
                Err(BackendError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let gate = ScanGate::new(Arc::new(signed_in_identity()), Arc::new(data), clock());

        let first = gate.handle_scan(CLUB_ID).await;
        assert!(matches!(
            first,
            ScanOutcome::Failed {
                error: ScanError::Write(_),
                ..
            }
        ));
        assert_eq!(first.notice().unwrap().title, "Check-in failed");
        assert!(!gate.is_locked());

        let second = gate.handle_scan(CLUB_ID).await;
        assert!(matches!(second, ScanOutcome::CheckedIn { .. }));
    }

    #[test]
    fn test_resume_from_background_resets_lock() {
        let gate = ScanGate::new(
            Arc::new(MockIdentityService::new()),
            Arc::new(MockDataService::new()),
            clock(),
        );
        gate.lock.try_acquire().unwrap().retain();

        assert!(!gate.on_lifecycle(AppLifecycle::Active));
        assert!(gate.is_locked());

        assert!(!gate.on_lifecycle(AppLifecycle::Background));
        assert!(gate.is_locked());

        assert!(gate.on_lifecycle(AppLifecycle::Active));
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_resume_from_inactive_resets_lock() {
        let gate = ScanGate::new(
            Arc::new(MockIdentityService::new()),
            Arc::new(MockDataService::new()),
            clock(),
        );
        gate.lock.try_acquire().unwrap().retain();

        gate.on_lifecycle(AppLifecycle::Inactive);
        assert!(gate.on_lifecycle(AppLifecycle::Active));
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_mount_resets_lock() {
        let gate = ScanGate::new(
            Arc::new(MockIdentityService::new()),
            Arc::new(MockDataService::new()),
            clock(),
        );
        gate.lock.try_acquire().unwrap().retain();

        gate.on_mount();
        assert!(!gate.is_locked());
    }
}
