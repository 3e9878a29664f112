use crate::models::domain::{Session, UserProfile};
use indexmap::IndexMap;
use std::fmt;

/// Screens of the app. The navigation stack in [`AppState`] holds these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Welcome,
    Home,
    Booking,
    BookingWizard,
    MyBookings,
    Calendar,
    MyClub,
    Settings,
    JoinClub,
    ScanQrCode,
    ViewAnnouncements,
    AddAnnouncement,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Welcome => "Welcome",
            Screen::Home => "Home",
            Screen::Booking => "Booking",
            Screen::BookingWizard => "Book Appointment",
            Screen::MyBookings => "My Bookings",
            Screen::Calendar => "Calendar",
            Screen::MyClub => "My Club",
            Screen::Settings => "Settings",
            Screen::JoinClub => "Join a Club",
            Screen::ScanQrCode => "Scan QR Code",
            Screen::ViewAnnouncements => "Announcements",
            Screen::AddAnnouncement => "Add Announcement",
        }
    }

    /// Screens reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Screen::Welcome)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Host application lifecycle as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

/// Steps of the booking wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    Date,
    Time,
    Summary,
}

/// A user-visible alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}: {}", self.title, self.message)
        }
    }
}

/// Single source of truth for the client's UI-facing state.
///
/// Wrapped by [`crate::state::StateManager`]; never mutate it directly.
#[derive(Clone, Debug)]
pub struct AppState {
    // Auth
    pub initialized: bool,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    pub club_name: Option<String>,

    // Navigation
    pub screen_stack: Vec<Screen>,

    // Alerts. The sequence number lets repeated identical notices register as changes.
    pub last_notice: Option<Notice>,
    pub notice_seq: u64,

    // Check-in
    pub scan_locked: bool,

    // Booking
    pub wizard_stage: Option<WizardStage>,

    // Visit stats keyed by club id, display names alongside
    pub visit_counts: IndexMap<String, usize>,
    pub club_names: IndexMap<String, String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            initialized: false,
            session: None,
            profile: None,
            club_name: None,
            screen_stack: vec![Screen::Welcome],
            last_notice: None,
            notice_seq: 0,
            scan_locked: false,
            wizard_stage: None,
            visit_counts: IndexMap::new(),
            club_names: IndexMap::new(),
        }
    }
}

impl AppState {
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }

    pub fn current_screen(&self) -> Screen {
        self.screen_stack.last().copied().unwrap_or(Screen::Welcome)
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(UserProfile::is_admin)
    }

    /// Drop everything tied to the signed-in account.
    pub fn reset_session_state(&mut self) {
        self.session = None;
        self.profile = None;
        self.club_name = None;
        self.scan_locked = false;
        self.wizard_stage = None;
        self.visit_counts.clear();
        self.club_names.clear();
        self.screen_stack = vec![Screen::Welcome];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::User;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert!(!state.initialized);
        assert!(!state.is_signed_in());
        assert_eq!(state.current_screen(), Screen::Welcome);
    }

    #[test]
    fn test_reset_session_state() {
        let mut state = AppState {
            session: Some(Session {
                access_token: "token".to_string(),
                refresh_token: String::new(),
                expires_at: None,
                user: User {
                    id: "u1".to_string(),
                    email: None,
                },
            }),
            screen_stack: vec![Screen::Home, Screen::ScanQrCode],
            scan_locked: true,
            ..AppState::default()
        };
        state.visit_counts.insert("c1".to_string(), 3);

        state.reset_session_state();

        assert!(!state.is_signed_in());
        assert!(!state.scan_locked);
        assert!(state.visit_counts.is_empty());
        assert_eq!(state.screen_stack, vec![Screen::Welcome]);
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::new("Invalid Time", "Please choose a time in the future.");
        assert_eq!(
            notice.to_string(),
            "Invalid Time: Please choose a time in the future."
        );
        assert_eq!(Notice::new("Booking confirmed!", "").to_string(), "Booking confirmed!");
    }
}
