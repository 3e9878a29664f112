// Usage metrics
//
// Counters for check-ins, bookings and backend failures, summarized on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations so the controller and the bridge can record without
/// locks. Logged once on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Camera payloads that reached validation and took the scan lock
    pub scans_accepted: AtomicU64,

    /// Camera payloads dropped because the lock was held or they were empty
    pub scans_dropped: AtomicU64,

    /// Camera payloads that were not a club id
    pub scans_rejected: AtomicU64,

    pub check_ins: AtomicU64,

    pub check_in_failures: AtomicU64,

    pub bookings_confirmed: AtomicU64,

    /// Any service call that ended in a backend error
    pub backend_errors: AtomicU64,

    /// Number of UI events dispatched by the controller
    pub ui_events: AtomicU64,

    /// Number of UI events lost because the event channel was full
    pub ui_channel_full: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            scans_accepted: AtomicU64::new(0),
            scans_dropped: AtomicU64::new(0),
            scans_rejected: AtomicU64::new(0),
            check_ins: AtomicU64::new(0),
            check_in_failures: AtomicU64::new(0),
            bookings_confirmed: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
            ui_events: AtomicU64::new(0),
            ui_channel_full: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scan_dropped(&self) {
        self.scans_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_rejected(&self) {
        self.scans_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// A scan that took the lock and wrote the visit
    pub fn record_check_in(&self) {
        self.scans_accepted.fetch_add(1, Ordering::Relaxed);
        self.check_ins.fetch_add(1, Ordering::Relaxed);
    }

    /// A scan that took the lock and then failed
    pub fn record_check_in_failure(&self) {
        self.scans_accepted.fetch_add(1, Ordering::Relaxed);
        self.check_in_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_booking_confirmed(&self) {
        self.bookings_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_event(&self) {
        self.ui_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_channel_full(&self) {
        self.ui_channel_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of accepted scans that ended in a check-in
    pub fn check_in_success_rate(&self) -> f64 {
        let accepted = self.scans_accepted.load(Ordering::Relaxed);
        if accepted > 0 {
            self.check_ins.load(Ordering::Relaxed) as f64 / accepted as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Scans: {} accepted, {} dropped, {} rejected",
            self.scans_accepted.load(Ordering::Relaxed),
            self.scans_dropped.load(Ordering::Relaxed),
            self.scans_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Check-ins: {} ok, {} failed ({:.0}% success)",
            self.check_ins.load(Ordering::Relaxed),
            self.check_in_failures.load(Ordering::Relaxed),
            self.check_in_success_rate() * 100.0
        );
        tracing::info!(
            "Bookings confirmed: {}, backend errors: {}",
            self.bookings_confirmed.load(Ordering::Relaxed),
            self.backend_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "UI events: {}, channel full errors: {}",
            self.ui_events.load(Ordering::Relaxed),
            self.ui_channel_full.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
