//! Error handling utilities for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

use crate::error::DropReelError;

/// JSON error body with a status code: `{"error": "..."}` plus optional extra fields
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach an extra field to the body
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.body {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DropReelError> for ApiError {
    fn from(e: DropReelError) -> Self {
        match &e {
            DropReelError::Listing { code, message, .. } => {
                let status = if code.starts_with("path/") {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_GATEWAY
                };
                ApiError::new(status, message.clone()).with_field("code", code.clone())
            }
            DropReelError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            DropReelError::AuthExchange { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
            }
            DropReelError::Storage(_) => {
                error!("{}", e);
                ApiError::internal("Failed to persist data")
            }
        }
    }
}

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, ApiError>;

    /// Log error with context and return a custom StatusCode
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!("{}: {}", context, e);
            ApiError::internal(context)
        })
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!("{}: {}", context, e);
            ApiError::new(status, context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_path_errors_map_to_404() {
        let err: ApiError = DropReelError::Listing {
            status: Some(409),
            code: "path/not_found".to_string(),
            message: "missing".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body["code"], "path/not_found");
        assert_eq!(err.body["error"], "missing");
    }

    #[test]
    fn test_other_listing_errors_map_to_502() {
        let err: ApiError = DropReelError::Listing {
            status: None,
            code: "timeout".to_string(),
            message: "timed out".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_log_status_keeps_status() {
        let result: Result<(), &str> = Err("boom");
        let err = result.log_status("Failed to load", StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body, json!({ "error": "Failed to load" }));
    }
}
