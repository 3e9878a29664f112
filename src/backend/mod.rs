//! Backend collaborators - identity and table access.
//!
//! The client never talks to the hosted backend directly from a screen. Every
//! call goes through one of two traits:
//!
//! - [`IdentityService`]: current user/session, session restore, sign-in, sign-up, sign-out
//! - [`DataService`]: row-level insert/select/update/delete against named tables
//!
//! Two implementations are provided:
//!
//! - [`SupabaseClient`]: GoTrue + PostgREST over HTTPS via `reqwest`
//! - [`InMemoryBackend`]: process-local tables used by the demo mode and tests
//!
//! Queries are described with [`Query`] and [`Filter`]; [`fetch_rows`] and
//! [`fetch_single`] decode result rows into typed models.

pub mod memory;
pub mod supabase;

pub use memory::InMemoryBackend;
pub use supabase::SupabaseClient;

use crate::models::{Session, SignUpOutcome, User};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Table names used by the client.
pub mod tables {
    pub const USERS: &str = "users";
    pub const CLUBS: &str = "clubs";
    pub const USER_VISITS: &str = "user_visits";
    pub const BOOKINGS: &str = "bookings";
    pub const ANNOUNCEMENTS: &str = "announcements";
}

/// Errors reported by backend collaborators
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("No row found in {0}")]
    NotFound(String),

    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Row filter, translated to PostgREST operators by the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// Case-insensitive substring match on `column`
    ILike(String, String),
    /// `column` is one of the values
    In(String, Vec<String>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::ILike(column, _) | Filter::In(column, _) => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A select against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    /// Comma-separated column list; `None` selects every column
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Order)>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: None,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn ilike(mut self, column: &str, fragment: impl Into<String>) -> Self {
        self.filters
            .push(Filter::ILike(column.to_string(), fragment.into()));
        self
    }

    pub fn in_list(mut self, column: &str, values: Vec<String>) -> Self {
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }
}

/// Identity collaborator: who is signed in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The user behind the current session, `None` when signed out
    async fn get_current_user(&self) -> Result<Option<User>, BackendError>;

    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Install a session saved by an earlier run
    fn restore_session(&self, session: Session);

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Table collaborator. No transactions, no idempotency keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataService: Send + Sync {
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError>;

    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError>;

    async fn update(
        &self,
        table: &str,
        values: Value,
        filters: Vec<Filter>,
    ) -> Result<(), BackendError>;

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<(), BackendError>;
}

/// Run a select and decode every row into `T`
pub async fn fetch_rows<T: DeserializeOwned>(
    data: &dyn DataService,
    query: &Query,
) -> Result<Vec<T>, BackendError> {
    data.select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}

/// Run a select that must match exactly one row
pub async fn fetch_single<T: DeserializeOwned>(
    data: &dyn DataService,
    query: &Query,
) -> Result<T, BackendError> {
    fetch_rows(data, query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(query.table.clone()))
}
