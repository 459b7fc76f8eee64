//! Error types for the Kino image proxy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use tmdb_image_cache::CacheError;

#[derive(Debug)]
pub enum ProxyError {
    Cache(CacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl ProxyError {
    /// Status code and client-facing message. Internal causes stay in the logs.
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::Cache(err) => match err {
                CacheError::UnknownSize(_) => (StatusCode::NOT_FOUND, "Unknown image size"),
                CacheError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "Invalid image path"),
                CacheError::UpstreamRejected(_) => (StatusCode::NOT_FOUND, "Image not found"),
                CacheError::PayloadTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "Image too large to cache")
                }
                CacheError::Network(_) => (StatusCode::BAD_GATEWAY, "Failed to download image"),
                CacheError::Filesystem(_)
                | CacheError::InvalidBaseUrl(_)
                | CacheError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            },
            ProxyError::Io(_) | ProxyError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Cache(err) => write!(f, "Cache error: {}", err),
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Cache(err) => Some(err),
            ProxyError::Io(err) => Some(err.as_ref()),
            ProxyError::Config(_) => None,
        }
    }
}

impl From<CacheError> for ProxyError {
    fn from(err: CacheError) -> Self {
        ProxyError::Cache(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Image request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Image request rejected");
        }

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
