//! Connection health checks against Dropbox.
//!
//! `test_connection` walks a bounded state machine:
//! `Probing -> Refreshing -> ProbingFinal`. A token Dropbox reports as
//! expired gets exactly one refresh and one retest, never more.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::dropbox::{Account, AuthFailure};
use super::tokens::TokenManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Expired,
    Revoked,
    Unreachable,
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<Account> for AccountSummary {
    fn from(a: Account) -> Self {
        Self {
            account_id: a.account_id,
            display_name: a.name.display_name,
            email: a.email,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub retryable: bool,
    pub suggested_action: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    pub details: ConnectionDetails,
}

impl ConnectionStatus {
    fn new(
        status: ConnectionState,
        error_code: Option<String>,
        retryable: bool,
        suggested_action: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            details: ConnectionDetails {
                error_code,
                retryable,
                suggested_action: suggested_action.to_string(),
                message: message.into(),
                account: None,
            },
        }
    }

    pub fn connected(account: Account) -> Self {
        let mut status = Self::new(
            ConnectionState::Connected,
            None,
            false,
            "none",
            "Connected to Dropbox",
        );
        status.details.account = Some(account.into());
        status
    }

    pub fn not_configured() -> Self {
        Self::new(
            ConnectionState::NotConfigured,
            None,
            false,
            "authenticate",
            "No Dropbox credential is stored",
        )
    }

    pub fn expired(error_code: &str) -> Self {
        Self::new(
            ConnectionState::Expired,
            Some(error_code.to_string()),
            true,
            "reconnect",
            "Dropbox access token expired and could not be refreshed",
        )
    }

    pub fn revoked(error_code: String, message: String) -> Self {
        Self::new(ConnectionState::Revoked, Some(error_code), false, "reconnect", message)
    }

    pub fn unreachable(error_code: String, message: String) -> Self {
        Self::new(
            ConnectionState::Unreachable,
            Some(error_code),
            true,
            "retry later",
            message,
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == ConnectionState::Connected
    }
}

/// Result of the raw connectivity check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum ProbePhase {
    Probing { access_token: String },
    Refreshing { rejected_token: String },
    ProbingFinal { access_token: String },
}

enum CheckOutcome {
    Done(ConnectionStatus),
    TokenExpired,
}

pub struct ConnectionProber {
    tokens: Arc<TokenManager>,
    folder_path: String,
}

impl ConnectionProber {
    pub fn new(tokens: Arc<TokenManager>, folder_path: &str) -> Self {
        Self {
            tokens,
            folder_path: folder_path.to_string(),
        }
    }

    /// Side-effect-free metadata call against the configured folder. Any
    /// HTTP answer counts as reachable, whatever the credential's health.
    pub async fn ping_remote_api(&self) -> PingResult {
        let Some(credential) = self.tokens.current_credential().await else {
            return PingResult {
                reachable: false,
                latency_ms: None,
                status_code: None,
                error: Some("No access token stored".to_string()),
            };
        };

        let started = Instant::now();
        let result = self
            .tokens
            .dropbox()
            .ping(&credential.access_token, &self.folder_path)
            .await;
        let latency_ms = Some(started.elapsed().as_millis() as u64);

        match result {
            Ok(status) => {
                debug!(status = status.as_u16(), ?latency_ms, "Dropbox ping answered");
                PingResult {
                    reachable: true,
                    latency_ms,
                    status_code: Some(status.as_u16()),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Dropbox ping failed: {}", e);
                PingResult {
                    reachable: false,
                    latency_ms,
                    status_code: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Classify the current credential
    pub async fn test_connection(&self) -> ConnectionStatus {
        let Some(access_token) = self.tokens.get_valid_access_token().await else {
            // A stored credential that yields no token is expired past repair
            return match self.tokens.current_credential().await {
                None => ConnectionStatus::not_configured(),
                Some(credential) if credential.refresh_token.is_none() => {
                    ConnectionStatus::expired("no_refresh_token")
                }
                Some(_) => ConnectionStatus::expired("refresh_failed"),
            };
        };

        let mut phase = ProbePhase::Probing { access_token };
        loop {
            phase = match phase {
                ProbePhase::Probing { access_token } => match self.check(&access_token).await {
                    CheckOutcome::Done(status) => return status,
                    CheckOutcome::TokenExpired => ProbePhase::Refreshing {
                        rejected_token: access_token,
                    },
                },
                ProbePhase::Refreshing { rejected_token } => {
                    info!("Dropbox reported the access token expired, refreshing once");
                    match self.tokens.refresh_if_stale(&rejected_token).await {
                        Some(credential) => ProbePhase::ProbingFinal {
                            access_token: credential.access_token,
                        },
                        None => return ConnectionStatus::expired("refresh_failed"),
                    }
                }
                ProbePhase::ProbingFinal { access_token } => {
                    return match self.check(&access_token).await {
                        CheckOutcome::Done(status) => status,
                        CheckOutcome::TokenExpired => {
                            ConnectionStatus::expired("expired_access_token")
                        }
                    };
                }
            };
        }
    }

    async fn check(&self, access_token: &str) -> CheckOutcome {
        match self.tokens.dropbox().get_current_account(access_token).await {
            Ok(account) => CheckOutcome::Done(ConnectionStatus::connected(account)),
            Err(e) => match e.auth_failure() {
                Some(AuthFailure::Expired) => CheckOutcome::TokenExpired,
                Some(AuthFailure::Revoked) => {
                    warn!("Dropbox rejected the access token: {}", e);
                    CheckOutcome::Done(ConnectionStatus::revoked(e.code(), e.to_string()))
                }
                None => {
                    warn!(transient = e.is_transient(), "Dropbox probe failed: {}", e);
                    CheckOutcome::Done(ConnectionStatus::unreachable(e.code(), e.to_string()))
                }
            },
        }
    }
}
