//! Error types for the image cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// Size token outside the allowed TMDB sizes
    UnknownSize(String),
    /// Empty remote path or one that tries to leave the cache root
    InvalidPath(String),
    /// Origin answered with a non-success status
    UpstreamRejected(u16),
    /// Body exceeded the per-file byte ceiling
    PayloadTooLarge { limit: u64 },
    /// Connect, timeout or body transfer failure talking to the origin
    Network(Box<reqwest::Error>),
    Filesystem(Box<std::io::Error>),
    /// Origin base URL that cannot have path segments appended
    InvalidBaseUrl(String),
    /// Download task died before reporting back
    Internal(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSize(size) => write!(f, "Unknown image size: {}", size),
            Self::InvalidPath(path) => write!(f, "Invalid image path: {:?}", path),
            Self::UpstreamRejected(status) => {
                write!(f, "Origin rejected request with status {}", status)
            }
            Self::PayloadTooLarge { limit } => {
                write!(f, "Image exceeds the {} byte cache limit", limit)
            }
            Self::Network(err) => write!(f, "Network error: {}", err),
            Self::Filesystem(err) => write!(f, "Filesystem error: {}", err),
            Self::InvalidBaseUrl(url) => write!(f, "Invalid origin base URL: {}", url),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(err) => Some(err.as_ref()),
            Self::Filesystem(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Box::new(err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Filesystem(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
