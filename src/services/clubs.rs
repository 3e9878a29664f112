use super::{AuthContext, ServiceError};
use crate::backend::{DataService, Filter, Query, fetch_rows, tables};
use crate::models::{Club, Notice};
use serde_json::json;
use std::sync::Arc;

/// Club discovery and membership
pub struct ClubService {
    auth: Arc<AuthContext>,
    data: Arc<dyn DataService>,
}

impl ClubService {
    pub fn new(auth: Arc<AuthContext>, data: Arc<dyn DataService>) -> Self {
        Self { auth, data }
    }

    /// Clubs whose name contains `term`, ignoring case. An empty term lists every club.
    pub async fn search(&self, term: &str) -> Result<Vec<Club>, ServiceError> {
        let query = Query::table(tables::CLUBS)
            .select("id, name")
            .ilike("name", search_fragment(term));

        let clubs: Vec<Club> = fetch_rows(self.data.as_ref(), &query)
            .await
            .map_err(ServiceError::backend("search clubs"))?;

        tracing::debug!("Club search '{}' matched {} club(s)", term, clubs.len());
        Ok(clubs)
    }

    /// Make `club` the caller's club
    pub async fn join(&self, club: &Club) -> Result<Notice, ServiceError> {
        let user_id = self.auth.require_user_id()?;

        self.data
            .update(
                tables::USERS,
                json!({ "club_id": club.id }),
                vec![Filter::eq("id", user_id.as_str())],
            )
            .await
            .map_err(ServiceError::backend("join club"))?;

        tracing::info!("User {} joined club {}", user_id, club.id);

        let state = self.auth.state();
        let profile = state.read(|s| s.profile.clone()).map(|mut profile| {
            profile.club_id = Some(club.id.clone());
            profile
        });
        state.set_profile(profile, Some(club.name.clone()));

        Ok(Notice::new("Success", format!("Welcome to {}!", club.name)))
    }
}

/// `term` as a literal substring: `*` and `%` are wildcards to PostgREST `ilike`.
fn search_fragment(term: &str) -> String {
    term.trim()
        .chars()
        .filter(|c| !matches!(c, '*' | '%'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockDataService, MockIdentityService};
    use crate::state::StateManager;

    fn auth(data: Arc<MockDataService>) -> Arc<AuthContext> {
        Arc::new(AuthContext::new(
            Arc::new(MockIdentityService::new()),
            data,
            StateManager::new(),
        ))
    }

    #[tokio::test]
    async fn test_join_requires_sign_in() {
        let mut data = MockDataService::new();
        data.expect_update().never();
        let data = Arc::new(data);

        let service = ClubService::new(auth(data.clone()), data);
        let club = Club {
            id: "c1".to_string(),
            name: "Downtown".to_string(),
        };

        assert!(matches!(
            service.join(&club).await,
            Err(ServiceError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_search_uses_case_insensitive_filter() {
        let mut data = MockDataService::new();
        data.expect_select()
            .withf(|query| query.filters == vec![Filter::ILike("name".into(), "fit".into())])
            .returning(|_| Ok(Vec::new()));
        let data = Arc::new(data);

        let service = ClubService::new(auth(data.clone()), data);
        assert!(service.search(" fit ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_strips_wildcards() {
        let mut data = MockDataService::new();
        data.expect_select()
            .withf(|query| query.filters == vec![Filter::ILike("name".into(), "fit".into())])
            .times(1)
            .returning(|_| Ok(Vec::new()));
        let data = Arc::new(data);

        let service = ClubService::new(auth(data.clone()), data);
        service.search("%f*it%").await.unwrap();
        assert_eq!(search_fragment(" * "), "");
    }
}
