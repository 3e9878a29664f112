use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Length of a bookable slot. Every appointment occupies one grid cell.
pub const SLOT_MINUTES: u32 = 30;

/// Authenticated account as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Result of a sign-up call. The session is absent when the backend
/// requires e-mail confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    ClubOwner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::ClubOwner => "club_owner",
        }
    }
}

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub club_id: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::ClubOwner
    }

    /// Up to two uppercase initials taken from the full name, `?` when unknown.
    pub fn initials(&self) -> String {
        let initials: String = self
            .full_name
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();

        if initials.is_empty() {
            "?".to_string()
        } else {
            initials
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub message: String,
    pub created_at: String,
}

/// Row of the `bookings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub appointment_type: String,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:MM`
    pub appointment_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub created_at: String,
}

/// The appointment kinds offered on the booking tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    Wellness,
    Club,
    Ambassador,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 3] = [
        AppointmentType::Wellness,
        AppointmentType::Club,
        AppointmentType::Ambassador,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AppointmentType::Wellness => "wellness",
            AppointmentType::Club => "club",
            AppointmentType::Ambassador => "ambassador",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentType::Wellness => "Wellness Evaluation",
            AppointmentType::Club => "First Club Visit",
            AppointmentType::Ambassador => "Ambassador Opportunity Call",
        }
    }

    /// Resolves a route parameter. Unknown or missing keys book a wellness evaluation.
    pub fn from_key(key: Option<&str>) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| Some(kind.key()) == key)
            .unwrap_or_default()
    }
}

/// A validated check-in, one row of `user_visits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInEvent {
    pub user_id: String,
    pub club_id: String,
    pub visit_time: DateTime<Utc>,
}

impl CheckInEvent {
    pub fn to_row(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "club_id": self.club_id,
            "visit_time": self.visit_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Visit row as read back for the stats screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub club_id: String,
    pub visit_time: String,
}

/// The immutable record produced when the booking wizard is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingSubmission {
    pub user: String,
    pub appointment_type: AppointmentType,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour wall clock
    pub time: String,
    #[serde(skip)]
    pub starts_at: NaiveDateTime,
}

impl BookingSubmission {
    pub fn new(
        user: Option<&str>,
        appointment_type: AppointmentType,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Self {
        Self {
            user: user.unwrap_or("Unknown User").to_string(),
            appointment_type,
            date: date.format("%Y-%m-%d").to_string(),
            time: time.format("%H:%M").to_string(),
            starts_at: date.and_time(time),
        }
    }

    pub fn to_row(&self, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "appointment_type": self.appointment_type.label(),
            "appointment_date": self.date,
            "appointment_time": self.time,
            "duration_minutes": SLOT_MINUTES,
        })
    }
}
