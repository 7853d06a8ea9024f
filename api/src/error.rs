//! Domain error taxonomy shared by the token, listing and reel layers.

use thiserror::Error;

pub type DropReelResult<T> = Result<T, DropReelError>;

#[derive(Debug, Error)]
pub enum DropReelError {
    /// Dropbox rejected a code exchange or refresh, or answered with garbage
    #[error("Authorization exchange failed: {message}")]
    AuthExchange {
        status: Option<u16>,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote folder is missing or inaccessible
    #[error("Listing failed ({code}): {message}")]
    Listing {
        status: Option<u16>,
        code: String,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DropReelError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        DropReelError::Storage(format!("{}: {}", context, err))
    }

    /// Remote HTTP status attached to the error, if any
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            DropReelError::AuthExchange { status, .. } | DropReelError::Listing { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}
