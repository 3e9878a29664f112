//! Auth context
//!
//! Owns the signed-in session for the whole client. Every other service
//! resolves "who is calling" through [`AuthContext::user_id`] instead of
//! reaching into the identity service on its own.
//!
//! With a session store attached, the session is saved to the local
//! key-value store on sign-in and handed back to the identity service on the
//! next start, so a restart does not sign the user out.

use super::ServiceError;
use super::profile::load_profile;
use crate::backend::{DataService, IdentityService, tables};
use crate::cache::LocalStore;
use crate::models::{Notice, Role, Session};
use crate::state::StateManager;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Local store key holding the last signed-in session
pub const SESSION_CACHE_KEY: &str = "auth_session";

pub struct AuthContext {
    identity: Arc<dyn IdentityService>,
    data: Arc<dyn DataService>,
    state: StateManager,
    sessions: Option<Arc<LocalStore>>,
}

impl AuthContext {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        data: Arc<dyn DataService>,
        state: StateManager,
    ) -> Self {
        Self {
            identity,
            data,
            state,
            sessions: None,
        }
    }

    /// Persist sessions in `store` across restarts
    pub fn with_session_store(mut self, store: Arc<LocalStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Id of the signed-in user, if any
    pub fn user_id(&self) -> Option<String> {
        self.state.read(|state| state.user_id().map(str::to_string))
    }

    pub fn require_user_id(&self) -> Result<String, ServiceError> {
        self.user_id().ok_or(ServiceError::NotSignedIn)
    }

    /// Display name used on bookings
    pub fn full_name(&self) -> Option<String> {
        self.state
            .read(|state| state.profile.as_ref().and_then(|p| p.full_name.clone()))
    }

    /// Restore the live or saved session and pick the root screen
    pub async fn initialize(&self) -> Result<bool, ServiceError> {
        let session = self
            .identity
            .get_session()
            .await
            .map_err(ServiceError::backend("restore session"));

        // An unreadable session still finishes initialization, signed out
        let mut session = match session {
            Ok(session) => session,
            Err(e) => {
                self.state.finish_initialization(None);
                return Err(e);
            }
        };

        if session.is_none()
            && let Some(saved) = self.saved_session()
        {
            tracing::info!("Restoring saved session for {}", saved.user.id);
            self.identity.restore_session(saved.clone());
            session = Some(saved);
        }

        let signed_in = session.is_some();
        self.state.finish_initialization(session);
        tracing::info!("Auth initialized (signed in: {})", signed_in);

        if signed_in {
            self.refresh_profile().await?;
        }
        Ok(signed_in)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ServiceError> {
        let session = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(ServiceError::backend("sign in"))?;

        self.install_session(session).await
    }

    /// Create the account and its `users` row. Returns whether a session was issued;
    /// without one the account still needs e-mail confirmation.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<bool, ServiceError> {
        let outcome = self
            .identity
            .sign_up(email, password)
            .await
            .map_err(ServiceError::backend("sign up"))?;

        let row = json!({
            "id": outcome.user.id,
            "email": email,
            "role": Role::Member.as_str(),
            "full_name": full_name,
        });
        self.data
            .insert(tables::USERS, vec![row])
            .await
            .map_err(ServiceError::backend("create profile"))?;

        tracing::info!("Registered user {}", outcome.user.id);

        match outcome.session {
            Some(session) => {
                self.install_session(session).await?;
                Ok(true)
            }
            None => {
                self.state.show_notice(Notice::new(
                    "Check your email",
                    "Confirm your address, then sign in.",
                ));
                Ok(false)
            }
        }
    }

    /// End the session. A remote failure leaves the local session in place.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        self.identity
            .sign_out()
            .await
            .map_err(ServiceError::backend("sign out"))?;

        self.forget_session();
        self.state.reset_session_state();
        tracing::info!("Signed out");
        Ok(())
    }

    /// Reload profile and club name for the current user
    pub async fn refresh_profile(&self) -> Result<(), ServiceError> {
        let user_id = self.require_user_id()?;
        let (profile, club_name) = load_profile(self.data.as_ref(), &user_id)
            .await
            .map_err(ServiceError::backend("load profile"))?;

        self.state.set_profile(Some(profile), club_name);
        Ok(())
    }

    async fn install_session(&self, session: Session) -> Result<(), ServiceError> {
        if let Some(store) = &self.sessions
            && let Err(e) = store.set(SESSION_CACHE_KEY, &session)
        {
            tracing::warn!("Failed to save session: {:#}", e);
        }

        self.state.set_session(session);
        self.refresh_profile().await
    }

    /// The stored session, unless it has already expired
    fn saved_session(&self) -> Option<Session> {
        let session: Session = self.sessions.as_ref()?.get(SESSION_CACHE_KEY)?;

        if session
            .expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now().timestamp())
        {
            tracing::info!("Saved session expired");
            self.forget_session();
            return None;
        }
        Some(session)
    }

    fn forget_session(&self) {
        if let Some(store) = &self.sessions
            && let Err(e) = store.remove(SESSION_CACHE_KEY)
        {
            tracing::warn!("Failed to clear saved session: {:#}", e);
        }
    }
}
