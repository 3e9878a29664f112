// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the console frontend.

use crate::models::{AppState, Notice, Screen, Session, UserProfile, WizardStage};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events notify the frontend about state changes without requiring it
/// to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The auth context finished restoring the stored session
    Initialized,

    /// A session was established or torn down
    SessionChanged { signed_in: bool },

    /// The signed-in user's profile or club was (re)loaded
    ProfileChanged { is_admin: bool },

    /// The top of the navigation stack changed
    ScreenChanged { screen: Screen },

    /// An alert should be shown to the user
    NoticeShown { notice: Notice },

    /// The check-in lock was taken or released
    ScanLockChanged { held: bool },

    /// The booking wizard moved to another step (None when closed)
    WizardStageChanged { stage: Option<WizardStage> },

    /// Visit counts were refreshed from cache or backend
    VisitsUpdated { clubs: usize },

    /// State has been reset
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::services::AuthContext`]: Owns session lifecycle, writes through here
/// - [`crate::ui::AppController`]: Primary consumer of state events
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let signed_in = state_manager.read(|state| state.is_signed_in());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies the update, diffs and broadcasts.
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if !old.initialized && new.initialized {
            changes.push(StateChange::Initialized);
        }

        if old.session.is_some() != new.session.is_some() {
            changes.push(StateChange::SessionChanged {
                signed_in: new.session.is_some(),
            });
        }

        if old.profile != new.profile || old.club_name != new.club_name {
            changes.push(StateChange::ProfileChanged {
                is_admin: new.is_admin(),
            });
        }

        if old.current_screen() != new.current_screen() {
            changes.push(StateChange::ScreenChanged {
                screen: new.current_screen(),
            });
        }

        if old.notice_seq != new.notice_seq {
            if let Some(notice) = &new.last_notice {
                changes.push(StateChange::NoticeShown {
                    notice: notice.clone(),
                });
            }
        }

        if old.scan_locked != new.scan_locked {
            changes.push(StateChange::ScanLockChanged {
                held: new.scan_locked,
            });
        }

        if old.wizard_stage != new.wizard_stage {
            changes.push(StateChange::WizardStageChanged {
                stage: new.wizard_stage,
            });
        }

        if old.visit_counts != new.visit_counts || old.club_names != new.club_names {
            changes.push(StateChange::VisitsUpdated {
                clubs: new.visit_counts.len(),
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Mark the auth context as initialized with the restored session (if any)
    /// and route to the matching root screen.
    pub fn finish_initialization(&self, session: Option<Session>) -> Vec<StateChange> {
        self.update(|state| {
            let root = if session.is_some() {
                Screen::Home
            } else {
                Screen::Welcome
            };
            state.session = session;
            state.initialized = true;
            state.screen_stack = vec![root];
        })
    }

    /// Install a fresh session and land on the home screen
    pub fn set_session(&self, session: Session) -> Vec<StateChange> {
        self.update(|state| {
            state.session = Some(session);
            state.screen_stack = vec![Screen::Home];
        })
    }

    pub fn set_profile(
        &self,
        profile: Option<UserProfile>,
        club_name: Option<String>,
    ) -> Vec<StateChange> {
        self.update(|state| {
            state.profile = profile;
            state.club_name = club_name;
        })
    }

    /// Push a screen onto the navigation stack
    pub fn navigate(&self, screen: Screen) -> Vec<StateChange> {
        self.update(|state| {
            if state.current_screen() != screen {
                state.screen_stack.push(screen);
            }
        })
    }

    /// Pop one level; the root screen is never popped
    pub fn navigate_back(&self) -> Vec<StateChange> {
        self.update(|state| {
            if state.screen_stack.len() > 1 {
                state.screen_stack.pop();
            }
        })
    }

    pub fn show_notice(&self, notice: Notice) -> Vec<StateChange> {
        tracing::debug!("Notice: {}", notice);
        self.update(|state| {
            state.last_notice = Some(notice);
            state.notice_seq += 1;
        })
    }

    pub fn set_scan_locked(&self, held: bool) -> Vec<StateChange> {
        self.update(|state| state.scan_locked = held)
    }

    pub fn set_wizard_stage(&self, stage: Option<WizardStage>) -> Vec<StateChange> {
        self.update(|state| state.wizard_stage = stage)
    }

    pub fn set_visits(
        &self,
        visit_counts: IndexMap<String, usize>,
        club_names: IndexMap<String, String>,
    ) -> Vec<StateChange> {
        self.update(|state| {
            state.visit_counts = visit_counts;
            state.club_names = club_names;
        })
    }

    /// Tear down everything tied to the session (sign-out)
    pub fn reset_session_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.reset_session_state();
        });

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across services
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
