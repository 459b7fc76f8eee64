//! Cache key derivation
//!
//! Maps a (size, remote path) pair to the file name it is stored under. This is
//! the only place remote paths are validated, so every path that reaches the
//! filesystem or the origin has gone through [`normalize_path`].

use crate::error::{CacheError, Result};
use crate::types::media_type_for;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_EXTENSION: &str = ".jpg";
const MAX_EXTENSION_LEN: usize = 10;

/// Poster sizes served by the TMDB image CDN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSize {
    W92,
    W154,
    W185,
    W342,
    W500,
    W780,
    Original,
}

impl ImageSize {
    pub const ALL: [ImageSize; 7] = [
        ImageSize::W92,
        ImageSize::W154,
        ImageSize::W185,
        ImageSize::W342,
        ImageSize::W500,
        ImageSize::W780,
        ImageSize::Original,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W154 => "w154",
            ImageSize::W185 => "w185",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::Original => "original",
        }
    }
}

impl FromStr for ImageSize {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| CacheError::UnknownSize(s.to_string()))
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cached image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    size: ImageSize,
    remote_path: String,
    digest: String,
    extension: String,
}

impl CacheKey {
    /// Validate raw request values and derive the key
    pub fn derive(size: &str, remote_path: &str) -> Result<Self> {
        let size = size.parse::<ImageSize>()?;
        Self::new(size, remote_path)
    }

    pub fn new(size: ImageSize, remote_path: &str) -> Result<Self> {
        let remote_path = normalize_path(remote_path)?;

        let mut hasher = Sha256::new();
        hasher.update(size.as_str().as_bytes());
        hasher.update(b"/");
        hasher.update(remote_path.as_bytes());
        let digest = hex::encode(hasher.finalize());

        let extension = extension_of(&remote_path);

        Ok(Self {
            size,
            remote_path,
            digest,
            extension,
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Normalized remote path, without a leading slash
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Lowercase hex SHA-256 of `size/remote_path`
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Extension including the leading dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.digest, self.extension)
    }

    pub fn content_type(&self) -> &'static str {
        media_type_for(&self.extension)
    }
}

/// Normalize separators and reject empty or traversing paths
pub fn normalize_path(raw: &str) -> Result<String> {
    let replaced = raw.replace('\\', "/");
    let normalized = replaced.trim_start_matches('/');

    if normalized.is_empty() || normalized.split('/').any(|segment| segment == "..") {
        return Err(CacheError::InvalidPath(raw.to_string()));
    }

    Ok(normalized.to_string())
}

fn extension_of(remote_path: &str) -> String {
    let last_segment = remote_path.rsplit('/').next().unwrap_or_default();

    Path::new(last_segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
