use super::profile::fetch_club_id;
use super::{AuthContext, ServiceError};
use crate::backend::{DataService, Order, Query, fetch_rows, tables};
use crate::models::{Announcement, Notice};
use serde_json::json;
use std::sync::Arc;

/// Club announcements: members read them, club owners post them
pub struct AnnouncementService {
    auth: Arc<AuthContext>,
    data: Arc<dyn DataService>,
}

impl AnnouncementService {
    pub fn new(auth: Arc<AuthContext>, data: Arc<dyn DataService>) -> Self {
        Self { auth, data }
    }

    /// Announcements for the caller's club, newest first
    pub async fn list(&self) -> Result<Vec<Announcement>, ServiceError> {
        let club_id = self.caller_club().await?;

        let query = Query::table(tables::ANNOUNCEMENTS)
            .select("id, message, created_at")
            .eq("club_id", club_id)
            .order_by("created_at", Order::Desc);

        fetch_rows(self.data.as_ref(), &query)
            .await
            .map_err(ServiceError::backend("load announcements"))
    }

    pub async fn add(&self, message: &str) -> Result<Notice, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::EmptyMessage);
        }

        let user_id = self.auth.require_user_id()?;
        let club_id = self.caller_club().await?;

        self.data
            .insert(
                tables::ANNOUNCEMENTS,
                vec![json!({
                    "message": message,
                    "user_id": user_id,
                    "club_id": club_id,
                })],
            )
            .await
            .map_err(ServiceError::backend("add announcement"))?;

        tracing::info!("Posted announcement to club {}", club_id);
        Ok(Notice::new("Success", "Announcement added!"))
    }

    async fn caller_club(&self) -> Result<String, ServiceError> {
        let user_id = self.auth.require_user_id()?;
        match fetch_club_id(self.data.as_ref(), &user_id).await {
            Ok(Some(club_id)) => Ok(club_id),
            Ok(None) => Err(ServiceError::NoClub),
            Err(e) => {
                tracing::warn!("Club lookup for {} failed: {}", user_id, e);
                Err(ServiceError::NoClub)
            }
        }
    }
}
