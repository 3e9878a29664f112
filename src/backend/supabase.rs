//! Supabase client
//!
//! HTTP client for the hosted backend: GoTrue for identity and PostgREST for
//! tables. The current session is held here so every table request carries
//! the caller's bearer token (row-level security is enforced server-side).

use super::{BackendError, DataService, Filter, IdentityService, Order, Query};
use crate::models::{BackendSettings, Session, SignUpOutcome, User};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use std::sync::RwLock;
use std::time::Duration;

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl SupabaseClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            session: RwLock::new(None),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Turn a non-2xx response into [`BackendError::Api`] with the server's message
    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "msg", "error_description", "error"]
                    .iter()
                    .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or(body);

        tracing::warn!("Backend request failed with {}: {}", status, message);

        if status == StatusCode::BAD_REQUEST && message.contains("Invalid login credentials") {
            return Err(BackendError::InvalidCredentials);
        }

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn session_from_value(value: &Value) -> Result<Option<Session>, BackendError> {
        if value.get("access_token").is_some() {
            Ok(Some(serde_json::from_value(value.clone())?))
        } else {
            Ok(None)
        }
    }
}

/// PostgREST query parameters for a filter list
pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
            Filter::ILike(column, fragment) => (column.clone(), format!("ilike.*{}*", fragment)),
            Filter::In(column, values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                (column.clone(), format!("in.({})", quoted.join(",")))
            }
        })
        .collect()
}

/// Full PostgREST parameter list for a select
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        query
            .columns
            .as_deref()
            .map(|c| c.replace(' ', ""))
            .unwrap_or_else(|| "*".to_string()),
    )];
    params.extend(filter_params(&query.filters));

    if let Some((column, order)) = &query.order {
        let direction = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", column, direction)));
    }

    params
}

#[async_trait]
impl IdentityService for SupabaseClient {
    async fn get_current_user(&self) -> Result<Option<User>, BackendError> {
        if self.access_token().is_none() {
            return Ok(None);
        }

        let response = self
            .request(Method::GET, self.auth_url("user"))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Stored session was rejected, treating as signed out");
            return Ok(None);
        }

        let user = Self::check(response).await?.json::<User>().await?;
        Ok(Some(user))
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.session.read().unwrap().clone())
    }

    fn restore_session(&self, session: Session) {
        tracing::debug!("Restored session for {}", session.user.id);
        *self.session.write().unwrap() = Some(session);
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session = Self::check(response).await?.json::<Session>().await?;
        tracing::info!("Signed in as {}", session.user.id);

        *self.session.write().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body = Self::check(response).await?.json::<Value>().await?;

        // With auto-confirm the body is a session; otherwise it is the bare user.
        let session = Self::session_from_value(&body)?;
        let user = match &session {
            Some(session) => session.user.clone(),
            None => serde_json::from_value(body.get("user").cloned().unwrap_or(body))?,
        };

        if session.is_some() {
            *self.session.write().unwrap() = session.clone();
        }

        Ok(SignUpOutcome { user, session })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.access_token().is_some() {
            let response = self
                .request(Method::POST, self.auth_url("logout"))
                .send()
                .await?;
            Self::check(response).await?;
        }

        *self.session.write().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl DataService for SupabaseClient {
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, self.rest_url(table))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;

        Self::check(response).await?;
        tracing::debug!("Inserted {} row(s) into {}", rows.len(), table);
        Ok(())
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let response = self
            .request(Method::GET, self.rest_url(&query.table))
            .query(&query_params(query))
            .send()
            .await?;

        let rows = Self::check(response).await?.json::<Vec<Value>>().await?;
        tracing::debug!("Selected {} row(s) from {}", rows.len(), query.table);
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        values: Value,
        filters: Vec<Filter>,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::PATCH, self.rest_url(table))
            .header("Prefer", "return=minimal")
            .query(&filter_params(&filters))
            .json(&values)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, self.rest_url(table))
            .query(&filter_params(&filters))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
