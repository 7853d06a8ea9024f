//! Dropbox HTTP client: OAuth token endpoints plus the handful of files/users
//! RPC calls DropReel needs.

use base64::Engine;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::{
    DROPBOX_API_URL, DROPBOX_AUTH_URL, DROPBOX_CONTENT_URL, THUMBNAIL_SIZE,
};

/// Base URLs for the three Dropbox hosts. Overridable so tests can point the
/// client at a local mock server.
#[derive(Debug, Clone)]
pub struct DropboxEndpoints {
    pub auth_url: String,
    pub api_url: String,
    pub content_url: String,
}

impl Default for DropboxEndpoints {
    fn default() -> Self {
        Self {
            auth_url: DROPBOX_AUTH_URL.to_string(),
            api_url: DROPBOX_API_URL.to_string(),
            content_url: DROPBOX_CONTENT_URL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct DropboxClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: DropboxEndpoints,
    http: Client,
}

impl DropboxClient {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        endpoints: DropboxEndpoints,
        timeout: Duration,
    ) -> Result<Self, DropboxError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            endpoints,
            http,
        })
    }

    /// Build Basic auth header for OAuth token requests
    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/2/{}", self.endpoints.api_url.trim_end_matches('/'), endpoint)
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.endpoints.api_url.trim_end_matches('/'))
    }

    /// Step 1: Build the authorization URL. Offline access so Dropbox issues
    /// a refresh token alongside the short-lived access token.
    pub fn authorize_url(&self, scopes: &[&str]) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&token_access_type=offline&scope={}",
            self.endpoints.auth_url,
            percent_encode(&self.client_id),
            percent_encode(&self.redirect_uri),
            percent_encode(&scopes.join(" "))
        )
    }

    /// Step 2: Exchange authorization code for access token
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, DropboxError> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
        ];
        self.token_request(&params).await
    }

    /// Refresh an access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, DropboxError> {
        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, DropboxError> {
        let resp = self
            .http
            .post(self.token_url())
            .header("Authorization", self.basic_auth_header())
            .form(params)
            .send()
            .await?;

        decode_response(resp).await
    }

    /// Get the account the access token belongs to. Cheapest authenticated call.
    pub async fn get_current_account(&self, access_token: &str) -> Result<Account, DropboxError> {
        let resp = self
            .http
            .post(self.api("users/get_current_account"))
            .bearer_auth(access_token)
            .send()
            .await?;

        decode_response(resp).await
    }

    /// Connectivity check. Returns whatever status Dropbox answered with;
    /// only transport failures are errors.
    pub async fn ping(&self, access_token: &str, path: &str) -> Result<StatusCode, reqwest::Error> {
        let (url, body) = if path.is_empty() {
            // get_metadata does not accept the root folder
            (
                self.api("files/list_folder"),
                serde_json::json!({ "path": "", "limit": 1 }),
            )
        } else {
            (
                self.api("files/get_metadata"),
                serde_json::json!({ "path": path }),
            )
        };

        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        Ok(resp.status())
    }

    pub async fn get_metadata(
        &self,
        access_token: &str,
        path: &str,
        include_media_info: bool,
    ) -> Result<Metadata, DropboxError> {
        let body = serde_json::json!({
            "path": path,
            "include_media_info": include_media_info,
        });
        self.rpc(access_token, "files/get_metadata", &body).await
    }

    /// List a folder, following the continuation cursor until exhausted.
    pub async fn list_folder(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<Vec<Metadata>, DropboxError> {
        let body = serde_json::json!({ "path": path, "recursive": false });
        let mut page: ListFolderResponse =
            self.rpc(access_token, "files/list_folder", &body).await?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            debug!(count = entries.len(), "Following list_folder cursor");
            let body = serde_json::json!({ "cursor": page.cursor });
            page = self
                .rpc(access_token, "files/list_folder/continue", &body)
                .await?;
            entries.append(&mut page.entries);
        }

        Ok(entries)
    }

    /// Short-lived (4h) direct link for streaming a file
    pub async fn get_temporary_link(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<TemporaryLink, DropboxError> {
        let body = serde_json::json!({ "path": path });
        self.rpc(access_token, "files/get_temporary_link", &body).await
    }

    /// Fetch a JPEG thumbnail. `Ok(None)` when Dropbox cannot produce one
    /// (missing file, unsupported type).
    pub async fn get_thumbnail(
        &self,
        access_token: &str,
        path: &str,
    ) -> Result<Option<Bytes>, DropboxError> {
        let arg = serde_json::json!({
            "resource": { ".tag": "path", "path": path },
            "format": "jpeg",
            "size": THUMBNAIL_SIZE,
            "mode": "strict",
        });

        let url = format!(
            "{}/2/files/get_thumbnail_v2",
            self.endpoints.content_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", header_safe_json(&arg))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            let text = resp.text().await.unwrap_or_default();
            debug!(path, error = %text.trim(), "No thumbnail available");
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }

        Ok(Some(resp.bytes().await?))
    }

    async fn rpc<B: Serialize, T: DeserializeOwned>(
        &self,
        access_token: &str,
        endpoint: &str,
        body: &B,
    ) -> Result<T, DropboxError> {
        let resp = self
            .http
            .post(self.api(endpoint))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        decode_response(resp).await
    }
}

async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, DropboxError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &text));
    }

    serde_json::from_str(&text).map_err(|e| DropboxError::Decode(e.to_string()))
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Dropbox-API-Arg must be plain ASCII: escape everything else as \uXXXX.
fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Decode a Dropbox error body. RPC endpoints answer with
/// `{"error_summary": "...", "error": {".tag": ...}}`, the OAuth endpoint
/// with `{"error": "invalid_grant", "error_description": ...}`, and some
/// 400s with plain text.
fn api_error(status: u16, body: &str) -> DropboxError {
    #[derive(Deserialize)]
    struct Envelope {
        error_summary: Option<String>,
        error: Option<serde_json::Value>,
        error_description: Option<String>,
    }

    let Ok(envelope) = serde_json::from_str::<Envelope>(body) else {
        // Cut on a char boundary; plain-text errors echo user-supplied paths
        let summary: String = body.trim().chars().take(200).collect();
        return DropboxError::Api {
            status,
            summary,
            tag: None,
        };
    };

    let tag = match &envelope.error {
        Some(serde_json::Value::Object(obj)) => obj
            .get(".tag")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let summary = envelope
        .error_summary
        .map(|s| s.trim_end_matches(['.', '/']).to_string())
        .or(envelope.error_description)
        .or_else(|| tag.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));

    DropboxError::Api {
        status,
        summary,
        tag,
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: AccountName,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountName {
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Metadata::File(f) => &f.name,
            Metadata::Folder(f) => &f.name,
            Metadata::Deleted(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
    pub size: Option<u64>,
    pub media_info: Option<MediaInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderMetadata {
    pub id: String,
    pub name: String,
    pub path_display: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum MediaInfo {
    Pending,
    Metadata { metadata: MediaDetails },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaDetails {
    /// Milliseconds
    pub duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<Metadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct TemporaryLink {
    pub link: String,
}

/// How Dropbox rejected an access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Token outlived its lifetime; a refresh should fix it
    Expired,
    /// Token is invalid, revoked, or lacks permission
    Revoked,
}

#[derive(Debug, Error)]
pub enum DropboxError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dropbox API error ({status}): {summary}")]
    Api {
        status: u16,
        summary: String,
        tag: Option<String>,
    },

    #[error("Unexpected Dropbox response: {0}")]
    Decode(String),
}

impl DropboxError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DropboxError::Api { status, .. } => Some(*status),
            DropboxError::Http(e) => e.status().map(|s| s.as_u16()),
            DropboxError::Decode(_) => None,
        }
    }

    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            DropboxError::Api {
                status: 401, tag, ..
            } if tag.as_deref() == Some("expired_access_token") => Some(AuthFailure::Expired),
            DropboxError::Api {
                status: 401 | 403, ..
            } => Some(AuthFailure::Revoked),
            _ => None,
        }
    }

    /// Network trouble, rate limiting, or a Dropbox-side outage
    pub fn is_transient(&self) -> bool {
        match self {
            DropboxError::Http(_) => true,
            DropboxError::Api { status, .. } => *status == 429 || *status >= 500,
            DropboxError::Decode(_) => false,
        }
    }

    /// Short machine-readable code, e.g. `path/not_found` or `expired_access_token`
    pub fn code(&self) -> String {
        match self {
            DropboxError::Http(e) if e.is_timeout() => "timeout".to_string(),
            DropboxError::Http(_) => "network_error".to_string(),
            DropboxError::Api { summary, tag, .. } => {
                if summary.contains('/') || tag.is_none() {
                    summary.clone()
                } else {
                    tag.clone().unwrap_or_else(|| summary.clone())
                }
            }
            DropboxError::Decode(_) => "malformed_response".to_string(),
        }
    }
}
