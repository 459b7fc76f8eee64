//! Origin downloads with atomic publication
//!
//! Bytes are streamed into a sibling `*.tmp` file and renamed onto the final
//! name only after the whole body arrived within the size limit. Readers of the
//! final name therefore see either nothing or a complete image.

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use url::Url;

pub const TEMP_SUFFIX: &str = ".tmp";

const CHUNK_SIZE: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const ACCEPT_IMAGES: &str = "image/*,*/*;q=0.8";
const USER_AGENT: &str = concat!(
    "kino-image-proxy/",
    env!("CARGO_PKG_VERSION"),
    " (TMDB image cache proxy)"
);

/// HTTP client for the upstream image origin
pub struct ImageFetcher {
    client: Client,
    base_url: Url,
    max_file_bytes: u64,
}

impl ImageFetcher {
    pub fn new(base_url: &str, max_file_bytes: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CacheError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CacheError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_file_bytes,
        })
    }

    /// `{base_url}/{size}/{remote_path}` with every segment percent-encoded
    pub fn url_for(&self, key: &CacheKey) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(key.size().as_str())
            .extend(key.remote_path().split('/'));
        Ok(url)
    }

    /// Download `url` and publish it at `dest`, returning the byte count.
    ///
    /// On error nothing is left behind at `dest` or at its temp path.
    pub async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir).await?;
        }

        let tmp = temp_path(dest);
        let result = match self.download_to(url, &tmp).await {
            Ok(size) => fs::rename(&tmp, dest).await.map(|_| size).map_err(CacheError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(size) => {
                debug!(url = %url, dest = ?dest, size, "Published cached image");
                Ok(size)
            }
            Err(e) => {
                remove_temp_file(&tmp).await;
                Err(e)
            }
        }
    }

    async fn download_to(&self, url: &Url, tmp: &Path) -> Result<u64> {
        debug!(url = %url, "Fetching image from origin");

        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_IMAGES)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Origin rejected image request");
            return Err(CacheError::UpstreamRejected(status.as_u16()));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_file_bytes {
                warn!(url = %url, declared, limit = self.max_file_bytes, "Image too large to cache");
                return Err(CacheError::PayloadTooLarge {
                    limit: self.max_file_bytes,
                });
            }
        }

        let file = fs::File::create(tmp).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut downloaded: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            downloaded += chunk.len() as u64;
            if downloaded > self.max_file_bytes {
                warn!(url = %url, downloaded, limit = self.max_file_bytes, "Image too large to cache");
                return Err(CacheError::PayloadTooLarge {
                    limit: self.max_file_bytes,
                });
            }
            writer.write_all(&chunk).await?;
        }

        if downloaded == 0 {
            warn!(status = %status, url = %url, "Origin returned an empty image");
            return Err(CacheError::UpstreamRejected(status.as_u16()));
        }

        writer.flush().await?;
        writer.get_ref().sync_all().await?;

        Ok(downloaded)
    }
}

/// Sibling path an in-flight download is written to
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

pub fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEMP_SUFFIX))
}

async fn remove_temp_file(tmp: &Path) {
    match fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?tmp, error = %e, "Failed to remove temp file"),
    }
}
