//! Runtime configuration read from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::constants::DEFAULT_REMOTE_TIMEOUT_SECS;
use crate::services::dropbox::DropboxEndpoints;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which `TokenStore` backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    File,
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub dropbox_app_key: String,
    pub dropbox_app_secret: String,
    pub dropbox_redirect_uri: String,
    /// Folder listed when the client does not ask for one ("" is the root)
    pub dropbox_folder_path: String,
    pub dropbox_endpoints: DropboxEndpoints,
    pub remote_timeout: Duration,
    /// Where the OAuth callback sends the browser afterwards
    pub app_base_url: String,
    pub port: u16,
    pub reels_path: PathBuf,
    pub credentials_path: PathBuf,
    pub token_store: TokenStoreKind,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let defaults = DropboxEndpoints::default();
        let dropbox_endpoints = DropboxEndpoints {
            auth_url: get("DROPBOX_AUTH_URL").unwrap_or(defaults.auth_url),
            api_url: get("DROPBOX_API_URL").unwrap_or(defaults.api_url),
            content_url: get("DROPBOX_CONTENT_URL").unwrap_or(defaults.content_url),
        };

        let timeout_secs = match get("DROPBOX_TIMEOUT_SECS") {
            Some(v) => parse::<u64>("DROPBOX_TIMEOUT_SECS", &v)?,
            None => DEFAULT_REMOTE_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DROPBOX_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let port = match get("PORT") {
            Some(v) => parse::<u16>("PORT", &v)?,
            None => 3000,
        };

        let token_store = match get("TOKEN_STORE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("file") => TokenStoreKind::File,
            Some("memory") => TokenStoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TOKEN_STORE",
                    value: other.to_string(),
                    reason: "expected file or memory".to_string(),
                });
            }
        };

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(v) => parse::<bool>("COOKIE_SECURE", &v.to_lowercase())?,
            None => true,
        };

        Ok(Self {
            dropbox_app_key: required("DROPBOX_APP_KEY")?,
            dropbox_app_secret: required("DROPBOX_APP_SECRET")?,
            dropbox_redirect_uri: get("DROPBOX_REDIRECT_URI")
                .unwrap_or_else(|| "http://localhost:3000/auth/callback".to_string()),
            dropbox_folder_path: get("DROPBOX_FOLDER_PATH").unwrap_or_default(),
            dropbox_endpoints,
            remote_timeout: Duration::from_secs(timeout_secs),
            app_base_url: get("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            port,
            reels_path: get("REELS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/reels.json")),
            credentials_path: get("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/credentials.json")),
            token_store,
            cookie_secure,
        })
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [("DROPBOX_APP_KEY", "key"), ("DROPBOX_APP_SECRET", "secret")];

    #[test]
    fn test_defaults() {
        let config = config(&REQUIRED).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.dropbox_folder_path, "");
        assert_eq!(config.remote_timeout, Duration::from_secs(10));
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert!(config.cookie_secure);
        assert_eq!(config.reels_path, PathBuf::from("data/reels.json"));
        assert_eq!(config.dropbox_endpoints.api_url, "https://api.dropboxapi.com");
    }

    #[test]
    fn test_missing_secret() {
        let err = config(&[("DROPBOX_APP_KEY", "key")]).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("DROPBOX_APP_SECRET")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = config(&[("DROPBOX_APP_KEY", "  "), ("DROPBOX_APP_SECRET", "s")])
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("DROPBOX_APP_KEY")));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("TOKEN_STORE", "Memory"),
            ("COOKIE_SECURE", "FALSE"),
            ("APP_BASE_URL", "https://reels.example.com/"),
            ("DROPBOX_TIMEOUT_SECS", "3"),
            ("DROPBOX_FOLDER_PATH", "/Showreel"),
        ]);
        let config = config(&pairs).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.token_store, TokenStoreKind::Memory);
        assert!(!config.cookie_secure);
        assert_eq!(config.app_base_url, "https://reels.example.com");
        assert_eq!(config.remote_timeout, Duration::from_secs(3));
        assert_eq!(config.dropbox_folder_path, "/Showreel");
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "not-a-port"));
        assert!(matches!(
            config(&pairs).err().unwrap(),
            ConfigError::Invalid { key: "PORT", .. }
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TOKEN_STORE", "redis"));
        assert!(matches!(
            config(&pairs).err().unwrap(),
            ConfigError::Invalid { key: "TOKEN_STORE", .. }
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DROPBOX_TIMEOUT_SECS", "0"));
        assert!(config(&pairs).is_err());
    }
}
