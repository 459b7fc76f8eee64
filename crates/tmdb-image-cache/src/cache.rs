//! File-based image caching in front of the TMDB origin

use crate::error::{CacheError, Result};
use crate::evict::{scan, sweep_temp_files, Evictor};
use crate::fetch::ImageFetcher;
use crate::key::CacheKey;
use crate::locks::DownloadLocks;
use crate::types::{CacheConfig, CacheStats, CachedImage};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{self, File};
use tracing::{debug, info, warn};

/// Disk cache of origin images, keyed by (size, remote path).
///
/// Cheap to clone; clones share the directory, the lock map and the counters.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

struct Inner {
    cache_dir: PathBuf,
    fetcher: ImageFetcher,
    evictor: Evictor,
    locks: DownloadLocks,
    hits: AtomicU64,
    misses: AtomicU64,
    downloads: AtomicU64,
    evictions: AtomicU64,
}

impl ImageCache {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let fetcher = ImageFetcher::new(&config.origin_base_url, config.max_file_bytes)?;
        let evictor = Evictor::new(
            config.cache_dir.clone(),
            config.max_cache_bytes,
            config.max_age_days,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                cache_dir: config.cache_dir,
                fetcher,
                evictor,
                locks: DownloadLocks::new(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                downloads: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        })
    }

    /// Create the cache directory and drop temp files from interrupted downloads
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.inner.cache_dir).await?;
        if let Err(e) = sweep_temp_files(&self.inner.cache_dir).await {
            warn!(cache_dir = ?self.inner.cache_dir, error = %e, "Failed to sweep temp files");
        }
        info!(cache_dir = ?self.inner.cache_dir, "Cache initialized");
        Ok(())
    }

    /// Serve `size/remote_path` from disk, downloading it first on a miss.
    ///
    /// Input is validated before any I/O. Concurrent misses for the same key
    /// share a single download. The download runs in its own task, so a caller
    /// that goes away does not abort it for the callers still waiting.
    pub async fn fetch_cached_image(&self, size: &str, remote_path: &str) -> Result<CachedImage> {
        let key = CacheKey::derive(size, remote_path)?;
        let dest = self.inner.cache_dir.join(key.file_name());

        if let Some(image) = self.inner.try_hit(&key, &dest).await {
            return Ok(image);
        }

        let guard = self.inner.locks.acquire(key.digest()).await;

        // Another holder may have finished while we waited
        if let Some(image) = self.inner.try_hit(&key, &dest).await {
            return Ok(image);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let url = self.inner.fetcher.url_for(&key)?;

        let inner = self.inner.clone();
        let task_dest = dest.clone();
        let download = tokio::spawn(async move {
            // Open before the eviction pass so the caller can read even if it unlinks the file
            let result = match inner.fetcher.download(&url, &task_dest).await {
                Ok(size) => File::open(&task_dest)
                    .await
                    .map(|file| (file, size))
                    .map_err(CacheError::from),
                Err(e) => Err(e),
            };
            drop(guard);

            let (file, size) = result?;
            inner.downloads.fetch_add(1, Ordering::Relaxed);

            let report = inner.evictor.run().await;
            inner
                .evictions
                .fetch_add(report.removed() as u64, Ordering::Relaxed);

            Ok::<_, CacheError>((file, size))
        });

        let (file, size) = download
            .await
            .map_err(|e| CacheError::Internal(format!("download task failed: {e}")))??;

        debug!(key = %key.digest(), size, "Cache miss served from origin");

        Ok(CachedImage {
            path: dest,
            file,
            content_type: key.content_type(),
            size,
            from_cache: false,
        })
    }

    /// Run an eviction pass outside the download path, returning files removed
    pub async fn evict(&self) -> usize {
        let removed = self.inner.evictor.run().await.removed();
        self.inner
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let (entries, total_size) = match scan(&self.inner.cache_dir).await {
            Ok(files) => (files.len(), files.iter().map(|f| f.size).sum::<u64>()),
            Err(e) => {
                warn!(
                    cache_dir = ?self.inner.cache_dir,
                    error = %e,
                    "Failed to scan cache directory"
                );
                (0, 0)
            }
        };

        CacheStats {
            entries,
            total_size,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            downloads: self.inner.downloads.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }

    /// Number of keys the download coordinator has seen
    pub async fn tracked_keys(&self) -> usize {
        self.inner.locks.len().await
    }
}

impl Inner {
    /// Open, touch and return the entry if it is published
    async fn try_hit(&self, key: &CacheKey, dest: &Path) -> Option<CachedImage> {
        let file = File::open(dest).await.ok()?;
        let metadata = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return None,
        };

        touch(dest).await;
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key.digest(), "Cache hit");

        Some(CachedImage {
            path: dest.to_path_buf(),
            file,
            content_type: key.content_type(),
            size: metadata.len(),
            from_cache: true,
        })
    }
}

/// Refresh the mtime used as the recency signal. Failures only cost LRU accuracy.
async fn touch(path: &Path) {
    let target = path.to_path_buf();
    let result =
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&target, FileTime::now()))
            .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(path = ?path, error = %e, "Failed to touch cache file"),
        Err(e) => warn!(path = ?path, error = %e, "Touch task failed"),
    }
}
