use crate::backend::BackendError;
use crate::models::Notice;
use thiserror::Error;

/// Errors from the account, club, announcement, booking and visit services
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No signed-in user")]
    NotSignedIn,

    #[error("User has not joined a club")]
    NoClub,

    #[error("Announcement message is empty")]
    EmptyMessage,

    #[error("Failed to {action}: {source}")]
    Backend {
        action: &'static str,
        #[source]
        source: BackendError,
    },
}

impl ServiceError {
    /// Adapter for `map_err` that tags a backend failure with what was being done
    pub fn backend(action: &'static str) -> impl FnOnce(BackendError) -> ServiceError {
        move |source| {
            tracing::warn!("Failed to {}: {}", action, source);
            ServiceError::Backend { action, source }
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            ServiceError::NotSignedIn => Notice::new("Error", "You need to sign in first."),
            ServiceError::NoClub => Notice::new("Error", "Failed to find your club."),
            ServiceError::EmptyMessage => Notice::new("Error", "Please enter a message."),
            ServiceError::Backend {
                source: BackendError::InvalidCredentials,
                ..
            } => Notice::new("Error", "Invalid login credentials"),
            ServiceError::Backend { action, .. } => {
                Notice::new("Error", format!("Failed to {}.", action))
            }
        }
    }
}
