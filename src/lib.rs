// ClubApp - club membership client
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the console entry point.

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use backend::{DataService, IdentityService, InMemoryBackend, SupabaseClient};
pub use cache::LocalStore;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppConfig, AppState};
pub use services::{BookingWizard, ScanGate};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
