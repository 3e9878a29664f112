// Console input parsing
//
// Each stdin line becomes one UiEvent: taps, camera payloads and lifecycle
// transitions all arrive through the same channel.

use crate::models::{AppLifecycle, AppointmentType, Screen};
use chrono::{NaiveDate, NaiveTime};
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  signin <email> <password>            sign in
  signup <email> <password> <name...>  create an account
  signout                              sign out (asks for confirmation)
  open <screen>                        home, booking, bookings, calendar, club,
                                       settings, join, scan, announcements, announce
  back                                 go back one screen
  scan [payload]                       camera reported a QR payload
  lifecycle <active|inactive|background>
  book <wellness|club|ambassador>      start the booking wizard
  date <YYYY-MM-DD>                    pick a date (wizard date step)
  time <HH:MM>                         pick a time (wizard time step)
  next                                 advance the wizard
  confirm                              confirm the booking
  clubs [term]                         search clubs
  join <n>                             join club n from the last search
  announcements                        list announcements
  announce <message...>                post an announcement (club owners)
  bookings                             list your bookings
  delete <booking id>                  delete a booking (asks for confirmation)
  yes | no                             answer a confirmation prompt
  calendar [YYYY-MM-DD]                bookings by date
  visits                               visit counts per club
  profile                              show your profile
  state                                dump the current screen and session
  help                                 this text
  quit                                 exit";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("'{command}' cannot use '{value}'")]
    InvalidArgument { command: &'static str, value: String },
}

/// One input to the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String, full_name: String },
    SignOut,
    Open(Screen),
    Back,
    Scan(String),
    Lifecycle(AppLifecycle),
    StartBooking(AppointmentType),
    PickDate(NaiveDate),
    PickTime(NaiveTime),
    Next,
    Confirm,
    SearchClubs(String),
    JoinClub(usize),
    ListAnnouncements,
    AddAnnouncement(String),
    ListBookings,
    DeleteBooking(String),
    /// Reply to the last confirmation prompt
    Answer(bool),
    Calendar(Option<NaiveDate>),
    Visits,
    Profile,
    DumpState,
    Help,
    Quit,
}

fn parse_screen(name: &str) -> Option<Screen> {
    let screen = match name.to_ascii_lowercase().as_str() {
        "home" => Screen::Home,
        "booking" => Screen::Booking,
        "bookings" | "mybookings" => Screen::MyBookings,
        "calendar" => Screen::Calendar,
        "club" | "myclub" => Screen::MyClub,
        "settings" => Screen::Settings,
        "join" | "joinclub" => Screen::JoinClub,
        "scan" => Screen::ScanQrCode,
        "announcements" => Screen::ViewAnnouncements,
        "announce" => Screen::AddAnnouncement,
        _ => return None,
    };
    Some(screen)
}

fn parse_lifecycle(name: &str) -> Option<AppLifecycle> {
    match name.to_ascii_lowercase().as_str() {
        "active" => Some(AppLifecycle::Active),
        "inactive" => Some(AppLifecycle::Inactive),
        "background" => Some(AppLifecycle::Background),
        _ => None,
    }
}

fn required<'a>(
    value: Option<&'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, CommandError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(CommandError::MissingArgument { command, argument })
}

fn invalid(command: &'static str, value: &str) -> CommandError {
    CommandError::InvalidArgument {
        command,
        value: value.to_string(),
    }
}

impl FromStr for UiEvent {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let mut words = rest.split_whitespace();

        let event = match command.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "signin" => UiEvent::SignIn {
                email: required(words.next(), "signin", "an email")?.to_string(),
                password: required(words.next(), "signin", "a password")?.to_string(),
            },
            "signup" => {
                let email = required(words.next(), "signup", "an email")?.to_string();
                let password = required(words.next(), "signup", "a password")?.to_string();
                let full_name = words.collect::<Vec<_>>().join(" ");
                UiEvent::SignUp {
                    email,
                    password,
                    full_name: required(Some(full_name.as_str()), "signup", "a full name")?
                        .to_string(),
                }
            }
            "signout" => UiEvent::SignOut,
            "open" => {
                let name = required(words.next(), "open", "a screen name")?;
                UiEvent::Open(parse_screen(name).ok_or_else(|| invalid("open", name))?)
            }
            "back" => UiEvent::Back,
            // The payload is passed through untouched, including an empty one
            "scan" => UiEvent::Scan(rest.to_string()),
            "lifecycle" => {
                let name = required(words.next(), "lifecycle", "a state")?;
                UiEvent::Lifecycle(parse_lifecycle(name).ok_or_else(|| invalid("lifecycle", name))?)
            }
            "book" => UiEvent::StartBooking(AppointmentType::from_key(words.next())),
            "date" => {
                let value = required(words.next(), "date", "a date (YYYY-MM-DD)")?;
                UiEvent::PickDate(
                    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid("date", value))?,
                )
            }
            "time" => {
                let value = required(words.next(), "time", "a time (HH:MM)")?;
                UiEvent::PickTime(
                    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| invalid("time", value))?,
                )
            }
            "next" => UiEvent::Next,
            "confirm" => UiEvent::Confirm,
            "clubs" => UiEvent::SearchClubs(rest.to_string()),
            "join" => {
                let value = required(words.next(), "join", "a club number")?;
                let index: usize = value.parse().map_err(|_| invalid("join", value))?;
                if index == 0 {
                    return Err(invalid("join", value));
                }
                UiEvent::JoinClub(index)
            }
            "announcements" => UiEvent::ListAnnouncements,
            "announce" => UiEvent::AddAnnouncement(rest.to_string()),
            "bookings" => UiEvent::ListBookings,
            "delete" => UiEvent::DeleteBooking(required(words.next(), "delete", "a booking id")?.to_string()),
            "calendar" => UiEvent::Calendar(match words.next() {
                Some(value) => Some(
                    NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .map_err(|_| invalid("calendar", value))?,
                ),
                None => None,
            }),
            "yes" | "y" => UiEvent::Answer(true),
            "no" | "n" => UiEvent::Answer(false),
            "visits" => UiEvent::Visits,
            "profile" => UiEvent::Profile,
            "state" => UiEvent::DumpState,
            "help" | "?" => UiEvent::Help,
            "quit" | "exit" => UiEvent::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_keeps_payload() {
        assert_eq!(
            "scan 3FA85F64-5717-4562-B3FC-2C963F66AFA6".parse::<UiEvent>(),
            Ok(UiEvent::Scan("3FA85F64-5717-4562-B3FC-2C963F66AFA6".to_string()))
        );
        assert_eq!("scan".parse::<UiEvent>(), Ok(UiEvent::Scan(String::new())));
    }

    #[test]
    fn test_parse_lifecycle() {
        assert_eq!(
            "lifecycle background".parse::<UiEvent>(),
            Ok(UiEvent::Lifecycle(AppLifecycle::Background))
        );
        assert!(matches!(
            "lifecycle sleeping".parse::<UiEvent>(),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_wizard_inputs() {
        assert_eq!(
            "date 2026-10-18".parse::<UiEvent>(),
            Ok(UiEvent::PickDate(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()))
        );
        assert_eq!(
            "time 10:22".parse::<UiEvent>(),
            Ok(UiEvent::PickTime(NaiveTime::from_hms_opt(10, 22, 0).unwrap()))
        );
        assert_eq!(
            "book yoga".parse::<UiEvent>(),
            Ok(UiEvent::StartBooking(AppointmentType::Wellness))
        );
        assert!("time 25:00".parse::<UiEvent>().is_err());
    }

    #[test]
    fn test_parse_signup_joins_name() {
        assert_eq!(
            "signup ada@example.com secret Ada King Lovelace".parse::<UiEvent>(),
            Ok(UiEvent::SignUp {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
                full_name: "Ada King Lovelace".to_string(),
            })
        );
        assert!(matches!(
            "signup ada@example.com secret".parse::<UiEvent>(),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_answers() {
        assert_eq!("yes".parse::<UiEvent>(), Ok(UiEvent::Answer(true)));
        assert_eq!("Y".parse::<UiEvent>(), Ok(UiEvent::Answer(true)));
        assert_eq!("no".parse::<UiEvent>(), Ok(UiEvent::Answer(false)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("   ".parse::<UiEvent>(), Err(CommandError::Empty));
        assert_eq!(
            "dance".parse::<UiEvent>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
        assert!("join 0".parse::<UiEvent>().is_err());
        assert!("delete".parse::<UiEvent>().is_err());
        assert!("open garage".parse::<UiEvent>().is_err());
    }
}
