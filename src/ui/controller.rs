// App Controller - wires UI events to services and state
//
// The controller owns every service and the (optional) booking wizard. It
// handles one UiEvent at a time:
// - calls the matching service
// - writes the result into the StateManager (notices, navigation, scan lock)
// - renders the resulting state changes plus any listing as console lines

use crate::backend::{DataService, IdentityService};
use crate::cache::LocalStore;
use crate::clock::Clock;
use crate::metrics::Metrics;
use crate::models::{AppointmentType, Club, Notice, Screen, WizardStage};
use crate::services::{
    AnnouncementService, AuthContext, BookingService, BookingWizard, ClubService, ScanError,
    ScanGate, ScanOutcome, ServiceError, VisitService, VisitStats, format_date_label,
};
use crate::state::{StateChange, StateManager};
use crate::ui::commands::{HELP, UiEvent};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Backend and platform collaborators handed to the controller
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityService>,
    pub data: Arc<dyn DataService>,
    pub cache: Arc<LocalStore>,
    pub clock: Arc<dyn Clock>,
}

/// Actions that ask before they run
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingAction {
    SignOut,
    DeleteBooking(String),
}

impl PendingAction {
    fn prompt(&self) -> &'static str {
        match self {
            PendingAction::SignOut => "Are you sure you want to sign out?",
            PendingAction::DeleteBooking(_) => "Are you sure you want to delete this booking?",
        }
    }
}

/// Main coordinator of the console frontend
///
/// # Example
/// ```ignore
/// let (bridge, events) = EventLoopBridge::new(metrics.clone());
/// bridge.spawn_reader(std::io::stdin().lock());
///
/// let controller = AppController::new(StateManager::new(), collaborators, metrics);
/// controller.run(events).await?;
/// ```
pub struct AppController {
    state: StateManager,
    state_rx: broadcast::Receiver<StateChange>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,

    auth: Arc<AuthContext>,
    scan_gate: ScanGate,
    clubs: ClubService,
    announcements: AnnouncementService,
    bookings: BookingService,
    visits: VisitService,

    /// Present while the booking wizard screen is open
    wizard: Option<BookingWizard>,

    /// Results of the last club search, addressed 1-based by `join`
    club_results: Vec<Club>,

    /// Destructive action waiting for a yes/no answer
    pending: Option<PendingAction>,

    output: Vec<String>,
}

impl AppController {
    pub fn new(state: StateManager, deps: Collaborators, metrics: Arc<Metrics>) -> Self {
        let state_rx = state.subscribe();
        let auth = Arc::new(
            AuthContext::new(deps.identity.clone(), deps.data.clone(), state.clone())
                .with_session_store(deps.cache.clone()),
        );

        tracing::info!("App controller initialized");

        Self {
            scan_gate: ScanGate::new(deps.identity.clone(), deps.data.clone(), deps.clock.clone()),
            clubs: ClubService::new(auth.clone(), deps.data.clone()),
            announcements: AnnouncementService::new(auth.clone(), deps.data.clone()),
            bookings: BookingService::new(auth.clone(), deps.data.clone()),
            visits: VisitService::new(auth.clone(), deps.data.clone(), deps.cache.clone()),
            state,
            state_rx,
            metrics,
            clock: deps.clock,
            auth,
            wizard: None,
            club_results: Vec::new(),
            pending: None,
            output: Vec::new(),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    pub fn wizard(&self) -> Option<&BookingWizard> {
        self.wizard.as_ref()
    }

    /// Restore the session and land on the first screen
    pub async fn start(&mut self) -> Vec<String> {
        if let Err(e) = self.auth.initialize().await {
            self.fail(e);
        }
        self.take_output()
    }

    /// Drive the event loop until `Quit` arrives or every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) -> Result<()> {
        tracing::info!("Starting event loop");

        let lines = self.start().await;
        print_lines(&lines)?;

        while let Some(event) = events.recv().await {
            if event == UiEvent::Quit {
                break;
            }
            let lines = self.dispatch(event).await;
            print_lines(&lines)?;
        }

        tracing::info!("Event loop stopped");
        Ok(())
    }

    /// Handle one event and return the lines to show
    pub async fn dispatch(&mut self, event: UiEvent) -> Vec<String> {
        self.metrics.record_ui_event();
        tracing::debug!("Dispatching {:?}", event);

        // A prompt only survives until the next input
        if !matches!(event, UiEvent::Answer(_))
            && let Some(action) = self.pending.take()
        {
            tracing::debug!("Dropped unanswered confirmation for {:?}", action);
        }

        match event {
            UiEvent::SignIn { email, password } => {
                if let Err(e) = self.auth.sign_in(&email, &password).await {
                    self.fail(e);
                }
            }
            UiEvent::SignUp {
                email,
                password,
                full_name,
            } => {
                if let Err(e) = self.auth.sign_up(&email, &password, &full_name).await {
                    self.fail(e);
                }
            }
            UiEvent::SignOut => self.ask(PendingAction::SignOut),
            UiEvent::Answer(yes) => self.answer(yes).await,
            UiEvent::Open(screen) => self.open(screen).await,
            UiEvent::Back => self.back(),
            UiEvent::Scan(payload) => self.scan(&payload).await,
            UiEvent::Lifecycle(next) => {
                if self.scan_gate.on_lifecycle(next) {
                    self.state.set_scan_locked(false);
                }
            }
            UiEvent::StartBooking(kind) => self.start_booking(kind),
            UiEvent::PickDate(date) => {
                self.with_wizard(|wizard| wizard.pick_date(date));
            }
            UiEvent::PickTime(time) => {
                self.with_wizard(|wizard| wizard.pick_time(time));
            }
            UiEvent::Next => {
                if let Some(stage) = self.with_wizard(|wizard| wizard.next()) {
                    self.state.set_wizard_stage(Some(stage));
                    self.describe_wizard();
                }
            }
            UiEvent::Confirm => self.confirm_booking().await,
            UiEvent::SearchClubs(term) => self.search_clubs(&term).await,
            UiEvent::JoinClub(index) => self.join_club(index).await,
            UiEvent::ListAnnouncements => self.list_announcements().await,
            UiEvent::AddAnnouncement(message) => self.add_announcement(&message).await,
            UiEvent::ListBookings => self.list_bookings().await,
            UiEvent::DeleteBooking(id) => self.ask(PendingAction::DeleteBooking(id)),
            UiEvent::Calendar(date) => self.show_calendar(date).await,
            UiEvent::Visits => self.show_visits().await,
            UiEvent::Profile => self.show_profile().await,
            UiEvent::DumpState => self.dump_state(),
            UiEvent::Help => self.output.push(HELP.to_string()),
            UiEvent::Quit => {}
        }

        self.take_output()
    }

    fn ask(&mut self, action: PendingAction) {
        if !self.signed_in() {
            self.fail(ServiceError::NotSignedIn);
            return;
        }
        self.say(format!("{} (yes/no)", action.prompt()));
        self.pending = Some(action);
    }

    async fn answer(&mut self, yes: bool) {
        let Some(action) = self.pending.take() else {
            self.say("Nothing to confirm.");
            return;
        };

        if !yes {
            self.say("Cancelled.");
            return;
        }

        match action {
            PendingAction::SignOut => self.sign_out().await,
            PendingAction::DeleteBooking(id) => self.delete_booking(&id).await,
        }
    }

    async fn sign_out(&mut self) {
        match self.auth.sign_out().await {
            Ok(()) => {
                self.wizard = None;
                self.club_results.clear();
            }
            Err(e) => self.fail(e),
        }
    }

    fn take_output(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        // State changes first, then whatever the handler listed
        loop {
            match self.state_rx.try_recv() {
                Ok(change) => lines.extend(render_change(&change)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} state change(s)", skipped);
                }
                Err(_) => break,
            }
        }

        lines.append(&mut self.output);
        lines
    }

    fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    fn fail(&mut self, error: ServiceError) {
        if matches!(error, ServiceError::Backend { .. }) {
            self.metrics.record_backend_error();
        }
        tracing::debug!("Service call failed: {}", error);
        self.state.show_notice(error.notice());
    }

    fn signed_in(&self) -> bool {
        self.state.read(|state| state.is_signed_in())
    }

    async fn open(&mut self, screen: Screen) {
        if !screen.is_public() && !self.signed_in() {
            self.fail(ServiceError::NotSignedIn);
            return;
        }

        if screen == Screen::AddAnnouncement && !self.state.read(|s| s.is_admin()) {
            self.state.show_notice(Notice::new(
                "Error",
                "Only club owners can post announcements.",
            ));
            return;
        }

        if screen == Screen::BookingWizard && self.wizard.is_none() {
            self.say("No booking in progress. Use 'book <type>' first.");
            return;
        }

        // Leaving the wizard for another screen drops the draft
        if self.on_screen(Screen::BookingWizard) && screen != Screen::BookingWizard {
            self.discard_wizard();
        }

        self.state.navigate(screen);

        match screen {
            Screen::ScanQrCode => {
                self.scan_gate.on_mount();
                self.state.set_scan_locked(false);
                self.say("Point the camera at your club's QR code.");
            }
            Screen::Booking => {
                for kind in AppointmentType::ALL {
                    self.say(format!("  book {:<11} {}", kind.key(), kind.label()));
                }
            }
            Screen::JoinClub => self.search_clubs("").await,
            Screen::ViewAnnouncements => self.list_announcements().await,
            Screen::MyBookings => self.list_bookings().await,
            Screen::Calendar => self.show_calendar(None).await,
            Screen::MyClub => self.show_visits().await,
            Screen::Settings => self.show_profile().await,
            _ => {}
        }
    }

    fn back(&mut self) {
        let on_wizard = self.on_screen(Screen::BookingWizard);

        if on_wizard && let Some(wizard) = self.wizard.as_mut() {
            match wizard.back() {
                Some(stage) => {
                    self.state.set_wizard_stage(Some(stage));
                    self.describe_wizard();
                    return;
                }
                // Leaving from the first step discards the draft
                None => self.discard_wizard(),
            }
        }

        self.state.navigate_back();
    }

    fn on_screen(&self, screen: Screen) -> bool {
        self.state.read(|s| s.current_screen()) == screen
    }

    fn discard_wizard(&mut self) {
        if self.wizard.take().is_some() {
            tracing::debug!("Booking draft discarded");
        }
        self.state.set_wizard_stage(None);
    }

    async fn scan(&mut self, payload: &str) {
        if !self.on_screen(Screen::ScanQrCode) {
            tracing::debug!("Camera payload ignored outside the scan screen");
            self.metrics.record_scan_dropped();
            return;
        }

        match self.scan_gate.handle_scan(payload).await {
            ScanOutcome::Dropped => self.metrics.record_scan_dropped(),
            ScanOutcome::Rejected { notice } => {
                self.metrics.record_scan_rejected();
                self.state.show_notice(notice);
            }
            ScanOutcome::CheckedIn { notice, .. } => {
                self.metrics.record_check_in();
                self.state.set_scan_locked(true);
                self.state.show_notice(notice);
                self.state.navigate_back();
            }
            ScanOutcome::Failed { error, notice } => {
                self.metrics.record_check_in_failure();
                if !matches!(error, ScanError::NotSignedIn) {
                    self.metrics.record_backend_error();
                }
                self.state.set_scan_locked(false);
                self.state.show_notice(notice);
            }
        }
    }

    fn start_booking(&mut self, kind: AppointmentType) {
        if !self.signed_in() {
            self.fail(ServiceError::NotSignedIn);
            return;
        }

        self.wizard = Some(BookingWizard::new(kind, self.clock.clone()));
        self.state.navigate(Screen::BookingWizard);
        self.state.set_wizard_stage(Some(WizardStage::Date));
        self.say(format!("Booking: {}", kind.label()));
        self.describe_wizard();
    }

    /// Run a wizard step on the open wizard screen; errors become notices.
    /// `None` when it failed or the wizard is not showing.
    fn with_wizard<T>(
        &mut self,
        step: impl FnOnce(&mut BookingWizard) -> Result<T, crate::services::WizardError>,
    ) -> Option<T> {
        if !self.on_screen(Screen::BookingWizard) {
            self.say("No booking in progress. Use 'book <type>' first.");
            return None;
        }
        let Some(wizard) = self.wizard.as_mut() else {
            self.say("No booking in progress. Use 'book <type>' first.");
            return None;
        };

        match step(wizard) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Wizard step rejected: {}", e);
                self.state.show_notice(e.notice());
                None
            }
        }
    }

    fn describe_wizard(&mut self) {
        let Some(wizard) = &self.wizard else {
            return;
        };
        let draft = wizard.draft();

        let line = match draft.stage {
            WizardStage::Date => format!(
                "Select a date ({}), then 'next'",
                draft.temp_date.format("%Y-%m-%d")
            ),
            WizardStage::Time => format!(
                "Select a time ({}), then 'next'",
                draft.temp_time.format("%H:%M")
            ),
            WizardStage::Summary => match draft.starts_at() {
                Some(starts_at) => format!(
                    "{} on {} at {}. 'confirm' to book",
                    draft.appointment_type.label(),
                    starts_at.format("%A, %B %-d, %Y"),
                    starts_at.format("%-I:%M %p")
                ),
                None => return,
            },
        };
        self.say(line);
    }

    async fn confirm_booking(&mut self) {
        let full_name = self.auth.full_name();
        let Some(submission) = self.with_wizard(|wizard| wizard.confirm(full_name.as_deref()))
        else {
            return;
        };

        match self.bookings.submit(&submission).await {
            Ok(()) => {
                self.metrics.record_booking_confirmed();
                self.wizard = None;
                self.state.set_wizard_stage(None);
                self.state.show_notice(Notice::new("Booking confirmed!", ""));
                self.state.navigate_back();
            }
            Err(e) => self.fail(e),
        }
    }

    async fn search_clubs(&mut self, term: &str) {
        match self.clubs.search(term).await {
            Ok(clubs) => {
                if clubs.is_empty() {
                    self.say("No clubs found.");
                }
                for (i, club) in clubs.iter().enumerate() {
                    self.say(format!("  {}. {}", i + 1, club.name));
                }
                self.club_results = clubs;
            }
            Err(e) => self.fail(e),
        }
    }

    async fn join_club(&mut self, index: usize) {
        let Some(club) = index
            .checked_sub(1)
            .and_then(|i| self.club_results.get(i))
            .cloned()
        else {
            self.say(format!("No club #{} in the last search.", index));
            return;
        };

        match self.clubs.join(&club).await {
            Ok(notice) => {
                self.state.show_notice(notice);
                if self.on_screen(Screen::JoinClub) {
                    self.state.navigate_back();
                }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn list_announcements(&mut self) {
        match self.announcements.list().await {
            Ok(announcements) if announcements.is_empty() => self.say("No announcements yet."),
            Ok(announcements) => {
                for announcement in announcements {
                    self.say(format!("- [{}] {}", announcement.created_at, announcement.message));
                }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn add_announcement(&mut self, message: &str) {
        if !self.state.read(|s| s.is_admin()) {
            self.state.show_notice(Notice::new(
                "Error",
                "Only club owners can post announcements.",
            ));
            return;
        }

        match self.announcements.add(message).await {
            Ok(notice) => {
                self.state.show_notice(notice);
                if self.on_screen(Screen::AddAnnouncement) {
                    self.state.navigate_back();
                }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn list_bookings(&mut self) {
        match self.bookings.my_bookings().await {
            Ok(bookings) if bookings.is_empty() => self.say("No bookings yet."),
            Ok(bookings) => {
                for booking in bookings {
                    self.say(format!(
                        "  {}  {} on {} at {}",
                        booking.id,
                        booking.appointment_type,
                        booking.appointment_date,
                        booking.appointment_time
                    ));
                }
            }
            Err(e) => self.fail(e),
        }
    }

    async fn delete_booking(&mut self, id: &str) {
        match self.bookings.delete(id).await {
            Ok(()) => {
                self.say("Booking deleted.");
                self.list_bookings().await;
            }
            Err(e) => self.fail(e),
        }
    }

    async fn show_calendar(&mut self, date: Option<NaiveDate>) {
        let calendar = match self.bookings.calendar().await {
            Ok(calendar) => calendar,
            Err(e) => return self.fail(e),
        };

        match date {
            Some(date) => {
                self.say(format_date_label(date));
                let lines: Vec<String> = calendar
                    .on(date)
                    .iter()
                    .map(|b| format!("  {} {}", b.appointment_time, b.appointment_type))
                    .collect();
                if lines.is_empty() {
                    self.say("  No bookings on this day.");
                }
                self.output.extend(lines);
            }
            None if calendar.is_empty() => self.say("No bookings scheduled."),
            None => {
                let lines: Vec<String> = calendar
                    .marked_dates()
                    .filter_map(|key| NaiveDate::parse_from_str(key, "%Y-%m-%d").ok())
                    .map(|day| {
                        format!(
                            "  {} ({}): {} booking(s)",
                            format_date_label(day),
                            day.format("%Y-%m-%d"),
                            calendar.on(day).len()
                        )
                    })
                    .collect();
                self.output.extend(lines);
            }
        }
    }

    async fn show_visits(&mut self) {
        let cached = self.visits.cached();
        if !cached.counts.is_empty() {
            self.state
                .set_visits(cached.counts.clone(), cached.names.clone());
        }

        match self.visits.refresh().await {
            Ok(stats) => {
                self.state.set_visits(stats.counts.clone(), stats.names.clone());
                self.render_visits(&stats);
            }
            Err(e) => {
                self.fail(e);
                if !cached.counts.is_empty() {
                    self.say("Showing cached visit counts:");
                    self.render_visits(&cached);
                }
            }
        }
    }

    fn render_visits(&mut self, stats: &VisitStats) {
        let rows = stats.rows();
        if rows.is_empty() {
            self.say("No visits yet.");
        }
        for row in rows {
            let mut line = format!("  {}: {} visit(s)", row.club_name, row.count);
            if row.review_due {
                line.push_str(" - enjoying your visits? Leave us a review!");
            }
            self.say(line);
        }
    }

    async fn show_profile(&mut self) {
        if let Err(e) = self.auth.refresh_profile().await {
            self.fail(e);
            return;
        }

        let lines = self.state.read(|state| {
            let Some(profile) = &state.profile else {
                return Vec::new();
            };
            vec![
                format!(
                    "[{}] {}",
                    profile.initials(),
                    profile.full_name.as_deref().unwrap_or("Unknown")
                ),
                format!("  Email: {}", profile.email.as_deref().unwrap_or("-")),
                format!("  Role:  {}", profile.role.as_str()),
                format!("  Club:  {}", state.club_name.as_deref().unwrap_or("None")),
            ]
        });
        self.output.extend(lines);
    }

    fn dump_state(&mut self) {
        let lines = self.state.read(|state| {
            vec![
                format!("screen: {}", state.current_screen()),
                format!("signed in: {}", state.is_signed_in()),
                format!("admin: {}", state.is_admin()),
                format!("scan locked: {}", state.scan_locked),
                format!("wizard: {:?}", state.wizard_stage),
            ]
        });
        self.output.extend(lines);
    }
}

fn render_change(change: &StateChange) -> Option<String> {
    match change {
        StateChange::ScreenChanged { screen } => Some(format!("== {} ==", screen)),
        StateChange::NoticeShown { notice } => Some(format!("! {}", notice)),
        StateChange::SessionChanged { signed_in: true } => Some("Signed in.".to_string()),
        StateChange::SessionChanged { signed_in: false } => Some("Signed out.".to_string()),
        _ => None,
    }
}

fn print_lines(lines: &[String]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
    }
    stdout.flush().context("Failed to flush stdout")
}
