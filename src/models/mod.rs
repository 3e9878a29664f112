//! Data models for the ClubApp client.
//!
//! This module contains the core data structures used throughout the application:
//! - [`AppState`]: The central state container (session, navigation, notices, check-in lock mirror)
//! - [`AppConfig`]: Backend and app settings loaded from `ClubApp Config.yaml`
//! - Domain rows mirrored from the backend tables: [`Club`], [`UserProfile`], [`Booking`],
//!   [`Announcement`], [`Visit`]
//! - Records produced by the client: [`CheckInEvent`], [`BookingSubmission`]
//!
//! # Architecture Note
//!
//! - **Serializable**: backend rows derive `Serialize`/`Deserialize` for the REST payloads
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **Immutable**: State updates go through StateManager's `update()` method

pub mod app_state;
pub mod config;
pub mod domain;

pub use app_state::{AppLifecycle, AppState, Notice, Screen, WizardStage};
pub use config::{AppConfig, AppSettings, BackendSettings};
pub use domain::{
    Announcement, AppointmentType, Booking, BookingSubmission, CheckInEvent, Club, Role, SLOT_MINUTES,
    Session, SignUpOutcome, User, UserProfile, Visit,
};
