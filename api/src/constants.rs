//! Application constants

/// Dropbox OAuth authorization endpoint
pub const DROPBOX_AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Dropbox RPC endpoint base (OAuth token exchange, files, users)
pub const DROPBOX_API_URL: &str = "https://api.dropboxapi.com";

/// Dropbox content endpoint base (thumbnails, downloads)
pub const DROPBOX_CONTENT_URL: &str = "https://content.dropboxapi.com";

/// Scopes requested during authorization
pub const DROPBOX_SCOPES: &[&str] = &[
    "account_info.read",
    "files.metadata.read",
    "files.content.read",
];

/// Timeout applied to every Dropbox call unless overridden (10 seconds)
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// A credential expiring within this many seconds is treated as expired
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

/// File extensions recognized as videos (compared case-insensitively)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

/// Thumbnail size requested from Dropbox
pub const THUMBNAIL_SIZE: &str = "w640h480";

/// Cache lifetime for thumbnail responses (1 hour)
pub const THUMBNAIL_CACHE_SECS: u32 = 60 * 60;

/// Maximum accepted body for reel create/update requests (2 MB)
pub const MAX_REEL_BODY_SIZE: usize = 2 * 1024 * 1024;
