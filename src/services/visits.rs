//! Visit counts per club for the "My Club" screen.
//!
//! Counts and club names are written to the local cache after each fetch.
//! [`VisitService::cached`] reads them back so the screen can render before
//! the network answers.

use super::{AuthContext, ServiceError};
use crate::backend::{DataService, Query, fetch_rows, tables};
use crate::cache::LocalStore;
use crate::models::{Club, Visit};
use indexmap::IndexMap;
use std::sync::Arc;

pub const VISITS_CACHE_KEY: &str = "cached_visits_by_club";
pub const CLUB_NAMES_CACHE_KEY: &str = "cached_club_names";

const UNKNOWN_CLUB: &str = "Unknown Club";

/// Every tenth visit prompts for a review
pub fn review_due(count: usize) -> bool {
    count != 0 && count % 10 == 0
}

/// One line of the visit table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRow {
    pub club_id: String,
    pub club_name: String,
    pub count: usize,
    pub review_due: bool,
}

/// Visit counts keyed by club id plus their display names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitStats {
    pub counts: IndexMap<String, usize>,
    pub names: IndexMap<String, String>,
}

impl VisitStats {
    pub fn rows(&self) -> Vec<VisitRow> {
        self.counts
            .iter()
            .map(|(club_id, &count)| VisitRow {
                club_id: club_id.clone(),
                club_name: self
                    .names
                    .get(club_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_CLUB.to_string()),
                count,
                review_due: review_due(count),
            })
            .collect()
    }
}

pub struct VisitService {
    auth: Arc<AuthContext>,
    data: Arc<dyn DataService>,
    cache: Arc<LocalStore>,
}

impl VisitService {
    pub fn new(auth: Arc<AuthContext>, data: Arc<dyn DataService>, cache: Arc<LocalStore>) -> Self {
        Self { auth, data, cache }
    }

    /// Whatever the last fetch stored, empty when nothing was cached
    pub fn cached(&self) -> VisitStats {
        VisitStats {
            counts: self.cache.get(VISITS_CACHE_KEY).unwrap_or_default(),
            names: self.cache.get(CLUB_NAMES_CACHE_KEY).unwrap_or_default(),
        }
    }

    /// Recount the caller's visits and refresh the cache
    pub async fn refresh(&self) -> Result<VisitStats, ServiceError> {
        let user_id = self.auth.require_user_id()?;

        let query = Query::table(tables::USER_VISITS)
            .select("club_id, visit_time")
            .eq("user_id", user_id);
        let visits: Vec<Visit> = fetch_rows(self.data.as_ref(), &query)
            .await
            .map_err(ServiceError::backend("load visits"))?;

        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for visit in visits {
            *counts.entry(visit.club_id).or_default() += 1;
        }

        let names = if counts.is_empty() {
            IndexMap::new()
        } else {
            let query = Query::table(tables::CLUBS)
                .select("id, name")
                .in_list("id", counts.keys().cloned().collect());
            let clubs: Vec<Club> = fetch_rows(self.data.as_ref(), &query)
                .await
                .map_err(ServiceError::backend("load club names"))?;
            clubs.into_iter().map(|club| (club.id, club.name)).collect()
        };

        let stats = VisitStats { counts, names };
        self.store(&stats);

        tracing::debug!("Visit counts refreshed for {} club(s)", stats.counts.len());
        Ok(stats)
    }

    fn store(&self, stats: &VisitStats) {
        let result = self
            .cache
            .set(VISITS_CACHE_KEY, &stats.counts)
            .and_then(|_| self.cache.set(CLUB_NAMES_CACHE_KEY, &stats.names));

        if let Err(e) = result {
            tracing::warn!("Failed to cache visit counts: {:#}", e);
        }
    }
}
