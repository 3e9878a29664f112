//! In-memory backend
//!
//! Process-local stand-in for the hosted backend. Tables are vectors of JSON
//! rows; inserts get an `id` and a `created_at` the way the database defaults
//! would fill them. Used by the console demo mode and the integration tests.

use super::{BackendError, DataService, Filter, IdentityService, Order, Query, tables};
use crate::models::{Club, Role, Session, SignUpOutcome, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use uuid::Uuid;

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    failing_tables: HashSet<String>,
    identity_down: bool,
    last_created_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
    insert_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with one club and two accounts, used when no backend URL is configured.
    pub fn with_demo_data() -> Self {
        let backend = Self::new();
        let club = backend.seed_club("Downtown Fitness");
        backend.seed_club("Riverside Athletic Club");
        backend.register_account("member@example.com", "password", "Demo Member", Role::Member, None);
        backend.register_account(
            "owner@example.com",
            "password",
            "Demo Owner",
            Role::ClubOwner,
            Some(&club.id),
        );
        tracing::info!("Demo backend seeded, check-in code for {}: {}", club.name, club.id);
        backend
    }

    /// Add a club row and return it
    pub fn seed_club(&self, name: &str) -> Club {
        let club = Club {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.push_row(tables::CLUBS, json!({ "id": club.id, "name": club.name }));
        club
    }

    /// Create an identity account plus its `users` profile row
    pub fn register_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
        club_id: Option<&str>,
    ) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };

        self.inner.lock().unwrap().accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );

        self.push_row(
            tables::USERS,
            json!({
                "id": user.id,
                "email": email,
                "full_name": full_name,
                "role": role.as_str(),
                "club_id": club_id,
            }),
        );

        user
    }

    /// Make every write to `table` fail
    pub fn fail_writes_to(&self, table: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_tables
            .insert(table.to_string());
    }

    /// Make identity lookups fail as if the auth service were unreachable
    pub fn set_identity_down(&self, down: bool) {
        self.inner.lock().unwrap().identity_down = down;
    }

    /// Number of insert calls received, including failed ones
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    /// Raw rows of a table in insertion order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn push_row(&self, table: &str, row: Value) {
        let mut inner = self.inner.lock().unwrap();
        let row = Self::with_defaults(&mut inner, row);
        inner.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Fill `id` and a strictly increasing `created_at` when the row lacks them
    fn with_defaults(inner: &mut Inner, row: Value) -> Value {
        let Value::Object(mut map) = row else {
            return row;
        };

        map.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

        if !map.contains_key("created_at") {
            let now = Utc::now();
            let created_at = match inner.last_created_at {
                Some(last) if now <= last => last + Duration::microseconds(1),
                _ => now,
            };
            inner.last_created_at = Some(created_at);
            map.insert(
                "created_at".to_string(),
                Value::String(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }

        Value::Object(map)
    }

    fn check_writable(inner: &Inner, table: &str) -> Result<(), BackendError> {
        if inner.failing_tables.contains(table) {
            return Err(BackendError::Api {
                status: 503,
                message: format!("writes to {} are unavailable", table),
            });
        }
        Ok(())
    }

    fn check_identity(inner: &Inner) -> Result<(), BackendError> {
        if inner.identity_down {
            return Err(BackendError::Api {
                status: 503,
                message: "identity service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let cell = cell_text(row, filter.column());
    match filter {
        Filter::Eq(_, value) => cell.as_deref() == Some(value.as_str()),
        // Literal substring; `ClubService::search` strips PostgREST wildcards
        Filter::ILike(_, fragment) => cell
            .map(|c| c.to_lowercase().contains(&fragment.to_lowercase()))
            .unwrap_or(false),
        Filter::In(_, values) => cell.map(|c| values.contains(&c)).unwrap_or(false),
    }
}

fn project(row: &Value, columns: Option<&str>) -> Value {
    let Some(columns) = columns.filter(|c| c.trim() != "*") else {
        return row.clone();
    };

    let mut projected = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(value) = row.get(column) {
            projected.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

#[async_trait]
impl IdentityService for InMemoryBackend {
    async fn get_current_user(&self) -> Result<Option<User>, BackendError> {
        let inner = self.inner.lock().unwrap();
        Self::check_identity(&inner)?;
        Ok(inner.session.as_ref().map(|s| s.user.clone()))
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let inner = self.inner.lock().unwrap();
        Self::check_identity(&inner)?;
        Ok(inner.session.clone())
    }

    fn restore_session(&self, session: Session) {
        self.inner.lock().unwrap().session = Some(session);
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_identity(&inner)?;

        let user = match inner.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(BackendError::InvalidCredentials),
        };

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Some((Utc::now() + Duration::hours(1)).timestamp()),
            user,
        };
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        {
            let inner = self.inner.lock().unwrap();
            Self::check_identity(&inner)?;
            if inner.accounts.contains_key(&email.to_lowercase()) {
                return Err(BackendError::Api {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        self.inner.lock().unwrap().accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );

        // Auto-confirm: sign-up yields a live session
        let session = self.sign_in(email, password).await?;
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_identity(&inner)?;
        inner.session = None;
        Ok(())
    }
}

#[async_trait]
impl DataService for InMemoryBackend {
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner, table)?;

        for row in rows {
            let row = Self::with_defaults(&mut inner, row);
            inner.tables.entry(table.to_string()).or_default().push(row);
        }
        Ok(())
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Value> = inner
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((column, order)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = cell_text(a, column).cmp(&cell_text(b, column));
                match order {
                    Order::Asc => ordering,
                    Order::Desc => ordering.reverse(),
                }
            });
        }

        Ok(rows
            .iter()
            .map(|row| project(row, query.columns.as_deref()))
            .collect())
    }

    async fn update(
        &self,
        table: &str,
        values: Value,
        filters: Vec<Filter>,
    ) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner, table)?;

        let Value::Object(values) = values else {
            return Ok(());
        };

        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| matches(row, f)))
            {
                if let Value::Object(map) = row {
                    for (key, value) in &values {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner, table)?;

        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| matches(row, f)));
        }
        Ok(())
    }
}
