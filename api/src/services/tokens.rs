//! Dropbox OAuth token lifecycle: authorize, exchange, refresh, reset.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::dropbox::{DropboxClient, DropboxError, TokenResponse};
use super::token_store::TokenStore;
use crate::constants::DROPBOX_SCOPES;
use crate::error::{DropReelError, DropReelResult};
use crate::models::Credential;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("No Dropbox credential stored")]
    NoCredential,

    #[error("Stored credential has no refresh token")]
    NoRefreshToken,

    #[error(transparent)]
    Failed(#[from] DropReelError),
}

/// Outcome of `reset`, reported rather than thrown
#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub success: bool,
    pub message: String,
}

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    dropbox: DropboxClient,
    // Held for the whole load-refresh-save sequence so concurrent callers
    // never race each other's writes
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, dropbox: DropboxClient) -> Self {
        Self {
            store,
            dropbox,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn dropbox(&self) -> &DropboxClient {
        &self.dropbox
    }

    pub fn authorization_url(&self) -> String {
        self.dropbox.authorize_url(DROPBOX_SCOPES)
    }

    /// Exchange an authorization code and persist the resulting credential
    pub async fn exchange_code(&self, code: &str) -> DropReelResult<Credential> {
        let response = self
            .dropbox
            .exchange_code(code)
            .await
            .map_err(exchange_error)?;

        if response.access_token.is_empty() {
            return Err(DropReelError::AuthExchange {
                status: None,
                message: "Dropbox returned an empty access token".to_string(),
            });
        }

        let credential = credential_from_response(response, None);
        self.store.save(&credential).await?;

        info!(
            expires_at = ?credential.expires_at,
            has_refresh_token = credential.refresh_token.is_some(),
            "Stored new Dropbox credential"
        );
        Ok(credential)
    }

    /// Stored credential, with read failures logged and treated as absent
    pub async fn current_credential(&self) -> Option<Credential> {
        match self.store.load().await {
            Ok(credential) => credential,
            Err(e) => {
                error!("Failed to load credential: {}", e);
                None
            }
        }
    }

    /// Usable access token, refreshing transparently when expired.
    /// `None` means "not authenticated" for every failure mode.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        let credential = self.current_credential().await?;

        if !credential.is_expired() {
            return Some(credential.access_token);
        }

        if credential.refresh_token.is_none() {
            info!("Access token expired and no refresh token is stored");
            return None;
        }

        debug!("Access token expired, refreshing");
        self.refresh_if_stale(&credential.access_token)
            .await
            .map(|c| c.access_token)
    }

    /// Force a refresh. On failure the previous credential stays in place.
    pub async fn refresh_access_token(&self) -> Option<Credential> {
        match self.try_refresh().await {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                None
            }
        }
    }

    /// Force a refresh, reporting why it could not happen
    pub async fn try_refresh(&self) -> Result<Credential, RefreshError> {
        let _guard = self.refresh_lock.lock().await;

        let existing = self.store.load().await?.ok_or(RefreshError::NoCredential)?;
        self.refresh_locked(existing).await
    }

    /// Refresh unless another caller already replaced `stale_access_token`
    /// while this one waited for the lock.
    pub async fn refresh_if_stale(&self, stale_access_token: &str) -> Option<Credential> {
        let _guard = self.refresh_lock.lock().await;

        let current = match self.store.load().await {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to load credential for refresh: {}", e);
                return None;
            }
        };

        if current.access_token != stale_access_token && !current.is_expired() {
            debug!("Credential already refreshed by a concurrent caller");
            return Some(current);
        }

        match self.refresh_locked(current).await {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                None
            }
        }
    }

    async fn refresh_locked(&self, existing: Credential) -> Result<Credential, RefreshError> {
        let refresh_token = existing
            .refresh_token
            .ok_or(RefreshError::NoRefreshToken)?;

        let response = self
            .dropbox
            .refresh_token(&refresh_token)
            .await
            .map_err(exchange_error)?;

        // Dropbox does not rotate refresh tokens; keep the one we have
        let credential = credential_from_response(response, Some(refresh_token));
        self.store.save(&credential).await?;

        info!(expires_at = ?credential.expires_at, "Refreshed Dropbox access token");
        Ok(credential)
    }

    /// Seed an empty store with a credential carried by the client
    /// (cookie mirror). Returns whether the store was updated.
    pub async fn adopt(&self, credential: &Credential) -> DropReelResult<bool> {
        let _guard = self.refresh_lock.lock().await;

        if self.store.load().await?.is_some() {
            return Ok(false);
        }

        self.store.save(credential).await?;
        info!("Restored Dropbox credential from request cookies");
        Ok(true)
    }

    /// Clear the stored credential
    pub async fn reset(&self) -> ResetReport {
        let _guard = self.refresh_lock.lock().await;

        match self.store.clear().await {
            Ok(()) => {
                info!("Dropbox credential reset");
                ResetReport {
                    success: true,
                    message: "Dropbox credentials cleared".to_string(),
                }
            }
            Err(e) => {
                error!("Failed to reset credential: {}", e);
                ResetReport {
                    success: false,
                    message: format!("Failed to clear Dropbox credentials: {}", e),
                }
            }
        }
    }
}

fn exchange_error(e: DropboxError) -> DropReelError {
    DropReelError::AuthExchange {
        status: e.status(),
        message: e.to_string(),
    }
}

fn credential_from_response(response: TokenResponse, fallback_refresh: Option<String>) -> Credential {
    Credential {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(fallback_refresh),
        expires_at: response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_response(refresh_token: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
        TokenResponse {
            access_token: "sl.new".to_string(),
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: refresh_token.map(str::to_string),
            scope: None,
            account_id: None,
        }
    }

    #[test]
    fn test_refresh_response_keeps_existing_refresh_token() {
        let credential =
            credential_from_response(token_response(None, Some(14400)), Some("kept".to_string()));
        assert_eq!(credential.refresh_token.as_deref(), Some("kept"));
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_new_refresh_token_wins() {
        let credential = credential_from_response(
            token_response(Some("rotated"), Some(14400)),
            Some("old".to_string()),
        );
        assert_eq!(credential.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn test_missing_expiry_is_unknown() {
        let credential = credential_from_response(token_response(None, None), None);
        assert!(credential.expires_at.is_none());
        assert!(!credential.is_expired());
    }
}
