// Profile lookups shared by the auth context and the club-scoped services

use crate::backend::{BackendError, DataService, Query, fetch_rows, fetch_single, tables};
use crate::models::{Club, UserProfile};
use serde::Deserialize;

/// The caller's `users` row
pub async fn fetch_profile(
    data: &dyn DataService,
    user_id: &str,
) -> Result<UserProfile, BackendError> {
    let query = Query::table(tables::USERS)
        .select("id, full_name, email, role, club_id")
        .eq("id", user_id);
    fetch_single(data, &query).await
}

/// Club the user belongs to, if any
pub async fn fetch_club_id(
    data: &dyn DataService,
    user_id: &str,
) -> Result<Option<String>, BackendError> {
    #[derive(Deserialize)]
    struct ClubRef {
        club_id: Option<String>,
    }

    let query = Query::table(tables::USERS)
        .select("club_id")
        .eq("id", user_id);
    let row: ClubRef = fetch_single(data, &query).await?;
    Ok(row.club_id)
}

pub async fn fetch_club_name(
    data: &dyn DataService,
    club_id: &str,
) -> Result<Option<String>, BackendError> {
    let query = Query::table(tables::CLUBS)
        .select("id, name")
        .eq("id", club_id);
    let clubs: Vec<Club> = fetch_rows(data, &query).await?;
    Ok(clubs.into_iter().next().map(|club| club.name))
}

/// Profile plus the display name of its club
pub async fn load_profile(
    data: &dyn DataService,
    user_id: &str,
) -> Result<(UserProfile, Option<String>), BackendError> {
    let profile = fetch_profile(data, user_id).await?;
    let club_name = match &profile.club_id {
        Some(club_id) => fetch_club_name(data, club_id).await?,
        None => None,
    };
    Ok((profile, club_name))
}
