//! Integration tests for the account and club services
//!
//! These tests run the services against the in-memory backend and verify:
//! - Sign-up, sign-in and sign-out through the auth context
//! - Club search and joining
//! - Announcements scoped to the caller's club
//! - Booking persistence, listing, deletion and the calendar
//! - Visit counts, club names and the local cache

use chrono::NaiveDate;
use clubapp::backend::tables;
use clubapp::models::{AppointmentType, BookingSubmission, Role, Screen, Session};
use clubapp::services::{
    AnnouncementService, AuthContext, BookingService, ClubService, ServiceError, VisitService,
    format_date_label,
};
use clubapp::services::auth::SESSION_CACHE_KEY;
use clubapp::services::visits::{CLUB_NAMES_CACHE_KEY, VISITS_CACHE_KEY};
use clubapp::{DataService, IdentityService, InMemoryBackend, LocalStore, StateManager};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    backend: Arc<InMemoryBackend>,
    state: StateManager,
    auth: Arc<AuthContext>,
}

impl Fixture {
    fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let state = StateManager::new();
        let auth = Arc::new(AuthContext::new(
            backend.clone(),
            backend.clone(),
            state.clone(),
        ));
        Self {
            backend,
            state,
            auth,
        }
    }

    async fn sign_in(&self, email: &str) {
        self.auth.sign_in(email, "pw").await.unwrap();
    }
}

#[tokio::test]
async fn test_sign_up_creates_member_profile_and_session() {
    let fx = Fixture::new();

    let signed_in = fx
        .auth
        .sign_up("ada@example.com", "pw", "Ada Lovelace")
        .await
        .unwrap();
    assert!(signed_in);

    let users = fx.backend.rows(tables::USERS);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["role"], "member");
    assert_eq!(users[0]["full_name"], "Ada Lovelace");
    assert_eq!(users[0]["email"], "ada@example.com");

    let snapshot = fx.state.snapshot();
    assert!(snapshot.is_signed_in());
    assert_eq!(snapshot.current_screen(), Screen::Home);
    assert_eq!(snapshot.profile.unwrap().initials(), "AL");
}

#[tokio::test]
async fn test_duplicate_sign_up_fails() {
    let fx = Fixture::new();
    fx.auth.sign_up("ada@example.com", "pw", "Ada").await.unwrap();

    let err = fx.auth.sign_up("ada@example.com", "pw", "Ada").await.unwrap_err();
    assert!(matches!(err, ServiceError::Backend { action: "sign up", .. }));
}

#[tokio::test]
async fn test_wrong_password_is_reported() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);

    let err = fx.auth.sign_in("ada@example.com", "nope").await.unwrap_err();
    assert_eq!(err.notice().message, "Invalid login credentials");
    assert!(!fx.state.snapshot().is_signed_in());
}

#[tokio::test]
async fn test_initialize_restores_existing_session() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::ClubOwner, None);
    fx.sign_in("ada@example.com").await;

    // A fresh context over the same backend picks the session up
    let state = StateManager::new();
    let auth = AuthContext::new(fx.backend.clone(), fx.backend.clone(), state.clone());
    assert!(auth.initialize().await.unwrap());

    let snapshot = state.snapshot();
    assert_eq!(snapshot.current_screen(), Screen::Home);
    assert!(snapshot.is_admin());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let cache_path = Utf8PathBuf::try_from(dir.path().join("cache.json")).unwrap();

    let data = Arc::new(InMemoryBackend::new());
    data.register_account("ada@example.com", "pw", "Ada Lovelace", Role::Member, None);

    let first_run = AuthContext::new(data.clone(), data.clone(), StateManager::new())
        .with_session_store(Arc::new(LocalStore::open(&cache_path).unwrap()));
    first_run.sign_in("ada@example.com", "pw").await.unwrap();
    let user_id = first_run.user_id().unwrap();

    // New process: the identity service starts without a session
    let identity = Arc::new(InMemoryBackend::new());
    let store = Arc::new(LocalStore::open(&cache_path).unwrap());
    let state = StateManager::new();
    let second_run = AuthContext::new(identity.clone(), data.clone(), state.clone())
        .with_session_store(store.clone());

    assert!(second_run.initialize().await.unwrap());
    let snapshot = state.snapshot();
    assert_eq!(snapshot.current_screen(), Screen::Home);
    assert_eq!(snapshot.user_id(), Some(user_id.as_str()));
    assert_eq!(second_run.full_name().as_deref(), Some("Ada Lovelace"));
    assert_eq!(
        identity.get_session().await.unwrap().map(|s| s.user.id),
        Some(user_id)
    );

    second_run.sign_out().await.unwrap();
    let reopened = LocalStore::open(&cache_path).unwrap();
    assert!(reopened.get::<Session>(SESSION_CACHE_KEY).is_none());
}

#[tokio::test]
async fn test_sign_out_resets_to_welcome() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    fx.auth.sign_out().await.unwrap();
    let snapshot = fx.state.snapshot();
    assert!(!snapshot.is_signed_in());
    assert!(snapshot.profile.is_none());
    assert_eq!(snapshot.current_screen(), Screen::Welcome);
}

#[tokio::test]
async fn test_sign_out_failure_keeps_session() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    fx.backend.set_identity_down(true);
    assert!(fx.auth.sign_out().await.is_err());
    assert!(fx.state.snapshot().is_signed_in());
}

#[tokio::test]
async fn test_search_and_join_club() {
    let fx = Fixture::new();
    fx.backend.seed_club("Downtown Fitness");
    let riverside = fx.backend.seed_club("Riverside Athletic Club");
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    let clubs = ClubService::new(fx.auth.clone(), fx.backend.clone());

    let found = clubs.search("RIVER").await.unwrap();
    assert_eq!(found, vec![riverside.clone()]);
    assert_eq!(clubs.search("%river*").await.unwrap(), vec![riverside.clone()]);
    assert_eq!(clubs.search("").await.unwrap().len(), 2);

    let notice = clubs.join(&riverside).await.unwrap();
    assert_eq!(notice.message, "Welcome to Riverside Athletic Club!");

    let users = fx.backend.rows(tables::USERS);
    assert_eq!(users[0]["club_id"], riverside.id.as_str());
    assert_eq!(
        fx.state.snapshot().club_name.as_deref(),
        Some("Riverside Athletic Club")
    );
}

#[tokio::test]
async fn test_announcements_require_a_club() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    let announcements = AnnouncementService::new(fx.auth.clone(), fx.backend.clone());
    let err = announcements.list().await.unwrap_err();
    assert!(matches!(err, ServiceError::NoClub));
    assert_eq!(err.notice().message, "Failed to find your club.");
}

#[tokio::test]
async fn test_announcements_newest_first_and_scoped_to_club() {
    let fx = Fixture::new();
    let club = fx.backend.seed_club("Downtown Fitness");
    let other = fx.backend.seed_club("Riverside Athletic Club");
    fx.backend.register_account(
        "owner@example.com",
        "pw",
        "Owner",
        Role::ClubOwner,
        Some(&club.id),
    );
    fx.backend
        .insert(
            tables::ANNOUNCEMENTS,
            vec![json!({"message": "Elsewhere", "user_id": "x", "club_id": other.id})],
        )
        .await
        .unwrap();
    fx.sign_in("owner@example.com").await;

    let announcements = AnnouncementService::new(fx.auth.clone(), fx.backend.clone());
    announcements.add("Pool closed Monday").await.unwrap();
    let notice = announcements.add("  New spin class  ").await.unwrap();
    assert_eq!(notice.message, "Announcement added!");

    let listed = announcements.list().await.unwrap();
    let messages: Vec<&str> = listed.iter().map(|a| a.message.as_str()).collect();
    assert_eq!(messages, vec!["New spin class", "Pool closed Monday"]);
}

fn submission(date: &str, time: (u32, u32)) -> BookingSubmission {
    BookingSubmission::new(
        Some("Ada"),
        AppointmentType::Wellness,
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        chrono::NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_bookings_submit_list_delete() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    let bookings = BookingService::new(fx.auth.clone(), fx.backend.clone());
    bookings.submit(&submission("2026-10-20", (10, 0))).await.unwrap();
    bookings.submit(&submission("2026-10-18", (14, 30))).await.unwrap();

    let mine = bookings.my_bookings().await.unwrap();
    assert_eq!(mine.len(), 2);
    // Most recently created first
    assert_eq!(mine[0].appointment_date, "2026-10-18");
    assert_eq!(mine[0].appointment_type, "Wellness Evaluation");
    assert_eq!(mine[0].duration_minutes, 30);

    bookings.delete(&mine[0].id).await.unwrap();
    assert_eq!(bookings.my_bookings().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_booking_delete_failure_notice() {
    let fx = Fixture::new();
    fx.backend.fail_writes_to(tables::BOOKINGS);

    let bookings = BookingService::new(fx.auth.clone(), fx.backend.clone());
    let err = bookings.delete("missing").await.unwrap_err();
    assert_eq!(err.notice().message, "Failed to delete booking.");
}

#[tokio::test]
async fn test_calendar_groups_all_bookings() {
    let fx = Fixture::new();
    fx.backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    let bookings = BookingService::new(fx.auth.clone(), fx.backend.clone());
    bookings.submit(&submission("2026-03-05", (9, 0))).await.unwrap();
    bookings.submit(&submission("2026-03-01", (9, 0))).await.unwrap();
    bookings.submit(&submission("2026-03-05", (11, 30))).await.unwrap();

    let calendar = bookings.calendar().await.unwrap();
    let dates: Vec<&str> = calendar.marked_dates().collect();
    assert_eq!(dates, vec!["2026-03-01", "2026-03-05"]);

    let fifth = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
    assert_eq!(calendar.on(fifth).len(), 2);
    assert_eq!(format_date_label(fifth), "5th March");
}

async fn seed_visits(backend: &InMemoryBackend, user_id: &str, club_id: &str, count: usize) {
    let rows = (0..count)
        .map(|_| {
            json!({
                "user_id": user_id,
                "club_id": club_id,
                "visit_time": "2026-10-17T07:30:00.000Z",
            })
        })
        .collect();
    backend.insert(tables::USER_VISITS, rows).await.unwrap();
}

#[tokio::test]
async fn test_visit_counts_names_and_cache() {
    let fx = Fixture::new();
    let club = fx.backend.seed_club("Downtown Fitness");
    let user = fx
        .backend
        .register_account("ada@example.com", "pw", "Ada", Role::Member, None);
    fx.sign_in("ada@example.com").await;

    seed_visits(&fx.backend, &user.id, &club.id, 10).await;
    seed_visits(&fx.backend, &user.id, "deleted-club", 3).await;
    seed_visits(&fx.backend, "someone-else", &club.id, 4).await;

    let temp_dir = TempDir::new().unwrap();
    let cache_path = Utf8PathBuf::try_from(temp_dir.path().join("cache.json")).unwrap();
    let cache = Arc::new(LocalStore::open(&cache_path).unwrap());

    let visits = VisitService::new(fx.auth.clone(), fx.backend.clone(), cache.clone());
    assert!(visits.cached().counts.is_empty());

    let stats = visits.refresh().await.unwrap();
    let rows = stats.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].club_name, "Downtown Fitness");
    assert_eq!(rows[0].count, 10);
    assert!(rows[0].review_due);
    assert_eq!(rows[1].club_name, "Unknown Club");
    assert_eq!(rows[1].count, 3);
    assert!(!rows[1].review_due);

    // Cached under the fixed keys and readable after reopening the file
    let reopened = LocalStore::open(&cache_path).unwrap();
    let counts: IndexMap<String, usize> = reopened.get(VISITS_CACHE_KEY).unwrap();
    let names: IndexMap<String, String> = reopened.get(CLUB_NAMES_CACHE_KEY).unwrap();
    assert_eq!(counts.get(&club.id), Some(&10));
    assert_eq!(names.get(&club.id).map(String::as_str), Some("Downtown Fitness"));
    assert_eq!(visits.cached(), stats);
}

#[tokio::test]
async fn test_services_require_sign_in() {
    let fx = Fixture::new();
    let bookings = BookingService::new(fx.auth.clone(), fx.backend.clone());
    let visits = VisitService::new(
        fx.auth.clone(),
        fx.backend.clone(),
        Arc::new(LocalStore::ephemeral()),
    );

    assert!(matches!(
        bookings.my_bookings().await,
        Err(ServiceError::NotSignedIn)
    ));
    assert!(matches!(visits.refresh().await, Err(ServiceError::NotSignedIn)));
}
