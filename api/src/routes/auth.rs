//! Dropbox authorization endpoints (/auth/*)

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;
use crate::services::cookies;
use crate::services::error::ApiError;
use crate::services::probe::{ConnectionDetails, ConnectionState, ConnectionStatus, PingResult};
use crate::services::tokens::RefreshError;

/// RFC 3986 unreserved characters pass through untouched
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/start", get(start))
        .route("/auth/callback", get(callback))
        .route("/auth/refresh", get(refresh))
        .route("/auth/reset", get(reset))
        .route("/auth/status", get(status))
        .route("/auth/test", get(test_connection))
}

// ============================================================================
// Cookie hydration
// ============================================================================

/// Seed an empty token store from the credential cookies so a fresh process
/// picks up where the browser left off
pub async fn hydrate_credential(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if let Some(credential) = cookies::credential_from_jar(&jar) {
        if let Err(e) = state.tokens.adopt(&credential).await {
            warn!("Failed to restore credential from cookies: {}", e);
        }
    }
    next.run(request).await
}

fn append_cookies(response: &mut Response, values: Vec<HeaderValue>) {
    for value in values {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

// ============================================================================
// OAuth flow
// ============================================================================

/// GET /auth/start - Redirect the browser to the Dropbox consent page
async fn start(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&state.tokens.authorization_url())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

/// GET /auth/callback - Exchange the authorization code and return to the app
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let base = &state.config.app_base_url;
    let back_with_error = |reason: &str| {
        Redirect::temporary(&format!(
            "{}/?error={}",
            base,
            utf8_percent_encode(reason, QUERY_VALUE)
        ))
        .into_response()
    };

    if let Some(provider_error) = query.error {
        warn!(error = %provider_error, "Dropbox authorization was declined");
        return back_with_error(&provider_error);
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return back_with_error("no_code");
    };

    let credential = match state.tokens.exchange_code(&code).await {
        Ok(credential) => credential,
        Err(e) => {
            error!("Token exchange failed: {}", e);
            return back_with_error("token_exchange_failed");
        }
    };

    let cookie_values = match cookies::credential_cookies(&credential, state.config.cookie_secure) {
        Ok(values) => values,
        Err(e) => return e.into_response(),
    };

    info!("Dropbox account connected");
    let mut response = Redirect::temporary(&format!("{}/?auth=success", base)).into_response();
    append_cookies(&mut response, cookie_values);
    response
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
}

/// GET /auth/refresh - Force a token refresh
async fn refresh(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match state.tokens.try_refresh().await {
        Ok(credential) => {
            let mut response = Json(ActionResponse {
                success: true,
                message: "Access token refreshed".to_string(),
            })
            .into_response();
            append_cookies(
                &mut response,
                cookies::credential_cookies(&credential, state.config.cookie_secure)?,
            );
            Ok(response)
        }
        Err(e @ (RefreshError::NoCredential | RefreshError::NoRefreshToken)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(ActionResponse {
                success: false,
                message: e.to_string(),
            }),
        )
            .into_response()),
        Err(RefreshError::Failed(e)) => {
            error!("Forced refresh failed: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActionResponse {
                    success: false,
                    message: e.to_string(),
                }),
            )
                .into_response())
        }
    }
}

/// GET /auth/reset - Forget the stored credential and clear the cookies
async fn reset(State(state): State<Arc<AppState>>) -> Response {
    let report = state.tokens.reset().await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let mut response = (status, Json(report)).into_response();
    append_cookies(&mut response, cookies::clear_cookies());
    response
}

// ============================================================================
// Connection health
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthStatusResponse {
    is_authenticated: bool,
    status: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    retryable: bool,
    suggested_action: String,
    details: ConnectionDetails,
}

impl From<ConnectionStatus> for AuthStatusResponse {
    fn from(connection: ConnectionStatus) -> Self {
        Self {
            is_authenticated: connection.is_authenticated(),
            status: connection.status,
            error_code: connection.details.error_code.clone(),
            retryable: connection.details.retryable,
            suggested_action: connection.details.suggested_action.clone(),
            details: connection.details,
        }
    }
}

/// GET /auth/status - Classify the current credential
async fn status(State(state): State<Arc<AppState>>) -> Json<AuthStatusResponse> {
    Json(state.prober.test_connection().await.into())
}

#[derive(Serialize)]
struct ConnectionTestResponse {
    #[serde(rename = "dropboxAPI")]
    dropbox_api: PingResult,
    connection: ConnectionStatus,
    timestamp: DateTime<Utc>,
}

/// GET /auth/test - Raw reachability plus classification
async fn test_connection(State(state): State<Arc<AppState>>) -> Json<ConnectionTestResponse> {
    let (dropbox_api, connection) =
        tokio::join!(state.prober.ping_remote_api(), state.prober.test_connection());

    Json(ConnectionTestResponse {
        dropbox_api,
        connection,
        timestamp: Utc::now(),
    })
}
