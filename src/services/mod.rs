//! Services module - client business logic.
//!
//! Everything here is framework-agnostic: no console I/O, no event loop. The
//! UI controller owns the services and turns their results into state changes.
//!
//! # Components
//!
//! - [`ScanGate`]: QR check-in. Validates the payload, holds a single-permit
//!   [`ScanLock`] while the visit is written, and resets the lock when the app
//!   resumes or the scan screen mounts again.
//!
//! - [`BookingWizard`]: date → time → summary state machine. Times snap to
//!   half-hour slots and must lie in the future when committed and confirmed.
//!
//! - [`AuthContext`]: owns the session; every other service asks it for the
//!   caller's id.
//!
//! - [`ClubService`], [`AnnouncementService`], [`BookingService`],
//!   [`VisitService`]: thin wrappers over the backend tables.
//!
//! # Errors
//!
//! [`ScanError`], [`WizardError`] and [`ServiceError`] each map to a
//! user-visible [`Notice`](crate::models::Notice) via `notice()`.

pub mod announcements;
pub mod auth;
pub mod booking_wizard;
pub mod bookings;
pub mod clubs;
pub mod error;
pub mod profile;
pub mod scan_gate;
pub mod visits;

pub use announcements::AnnouncementService;
pub use auth::AuthContext;
pub use booking_wizard::{BookingDraft, BookingWizard, WizardError, is_future, snap_to_half_hour};
pub use bookings::{BookingCalendar, BookingService, format_date_label};
pub use clubs::ClubService;
pub use error::ServiceError;
pub use scan_gate::{ScanError, ScanGate, ScanLock, ScanOutcome, ScanPermit, is_valid_club_id};
pub use visits::{VisitRow, VisitService, VisitStats, review_due};
