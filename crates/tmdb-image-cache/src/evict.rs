//! Size and age bounded eviction over the cache directory
//!
//! The directory listing is the only source of truth, so every pass is a full
//! scan of the top level of the cache root. In-flight `*.tmp` files and
//! subdirectories are never touched.

use crate::fetch::is_temp_path;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// A published cache file as seen by a directory scan
#[derive(Debug, Clone)]
pub struct CacheFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Files removed for exceeding the maximum age
    pub expired: usize,
    /// Files removed, oldest first, to get under the byte ceiling
    pub evicted: usize,
    pub remaining_files: usize,
    pub remaining_bytes: u64,
}

impl EvictionReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

pub struct Evictor {
    root: PathBuf,
    max_bytes: u64,
    max_age: Option<Duration>,
}

impl Evictor {
    /// `max_age_days == 0` disables age expiry
    pub fn new(root: PathBuf, max_bytes: u64, max_age_days: u64) -> Self {
        let max_age = (max_age_days > 0)
            .then(|| Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY)));
        Self {
            root,
            max_bytes,
            max_age,
        }
    }

    /// Run one pass. Filesystem errors are logged and never returned.
    pub async fn run(&self) -> EvictionReport {
        let mut report = EvictionReport::default();

        let files = match scan(&self.root).await {
            Ok(files) => files,
            Err(e) => {
                warn!(root = ?self.root, error = %e, "Failed to scan cache directory");
                return report;
            }
        };

        let now = SystemTime::now();
        let mut total: u64 = 0;
        let mut kept = Vec::with_capacity(files.len());

        for file in files {
            if let Some(max_age) = self.max_age {
                // mtimes in the future count as fresh
                let age = now.duration_since(file.modified).unwrap_or_default();
                if age > max_age {
                    if remove_file(&file.path, "expired").await == Removal::Removed {
                        report.expired += 1;
                    }
                    continue;
                }
            }
            total += file.size;
            kept.push(file);
        }

        let mut remaining_files = kept.len();

        if total > self.max_bytes {
            kept.sort_by_key(|file| file.modified);

            for file in &kept {
                if total <= self.max_bytes {
                    break;
                }
                match remove_file(&file.path, "over size limit").await {
                    Removal::Removed => {
                        total -= file.size;
                        remaining_files -= 1;
                        report.evicted += 1;
                    }
                    // A concurrent pass got there first
                    Removal::AlreadyGone => {
                        total -= file.size;
                        remaining_files -= 1;
                    }
                    Removal::Failed => {}
                }
            }
        }

        report.remaining_files = remaining_files;
        report.remaining_bytes = total;

        if report.removed() > 0 {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                remaining_files = report.remaining_files,
                remaining_bytes = report.remaining_bytes,
                "Cache eviction pass"
            );
        }

        report
    }
}

/// List published cache files directly under `root`, creating it if missing
pub async fn scan(root: &Path) -> std::io::Result<Vec<CacheFile>> {
    fs::create_dir_all(root).await?;

    let mut files = Vec::new();
    let mut entries = fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_temp_path(&path) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = ?path, error = %e, "Skipping unreadable cache entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        files.push(CacheFile {
            path,
            size: metadata.len(),
            modified,
        });
    }

    Ok(files)
}

/// Remove temp files left behind by downloads that never finished
pub async fn sweep_temp_files(root: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_temp_path(&path) {
            continue;
        }
        if remove_file(&path, "orphaned temp file").await == Removal::Removed {
            removed += 1;
        }
    }

    if removed > 0 {
        info!(root = ?root, removed, "Cleaned orphaned temp files");
    }
    Ok(removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    /// Unlinked by someone else between the scan and this call
    AlreadyGone,
    Failed,
}

async fn remove_file(path: &Path, reason: &str) -> Removal {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = ?path, reason, "Removed cache file");
            Removal::Removed
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Removal::AlreadyGone,
        Err(e) => {
            warn!(path = ?path, reason, error = %e, "Failed to remove cache file");
            Removal::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::tempdir;

    fn write_file(root: &Path, name: &str, size: usize, mtime_secs: i64) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
        path
    }

    fn write_aged_file(root: &Path, name: &str, size: usize, age: Duration) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        set_file_mtime(&path, FileTime::from_system_time(SystemTime::now() - age)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_evicts_oldest_first_until_under_limit() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.jpg", 100, 1_000);
        let b = write_file(dir.path(), "b.jpg", 100, 2_000);
        let c = write_file(dir.path(), "c.jpg", 100, 3_000);
        let d = write_file(dir.path(), "d.jpg", 100, 4_000);

        let evictor = Evictor::new(dir.path().to_path_buf(), 250, 0);
        let report = evictor.run().await;

        assert!(!a.exists());
        assert!(!b.exists());
        assert!(c.exists());
        assert!(d.exists());
        assert_eq!(
            report,
            EvictionReport {
                expired: 0,
                evicted: 2,
                remaining_files: 2,
                remaining_bytes: 200,
            }
        );
    }

    #[tokio::test]
    async fn test_stops_as_soon_as_limit_is_met() {
        let dir = tempdir().unwrap();
        // Creation order differs from mtime order
        let newest = write_file(dir.path(), "a.jpg", 100, 9_000);
        let oldest = write_file(dir.path(), "b.jpg", 100, 1_000);
        let middle = write_file(dir.path(), "c.jpg", 100, 5_000);

        let report = Evictor::new(dir.path().to_path_buf(), 200, 0).run().await;

        assert!(!oldest.exists());
        assert!(middle.exists());
        assert!(newest.exists());
        assert_eq!(report.evicted, 1);
        assert_eq!(report.remaining_bytes, 200);
    }

    #[tokio::test]
    async fn test_within_limit_removes_nothing() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.jpg", 100, 1_000);
        write_file(dir.path(), "b.jpg", 100, 2_000);

        let report = Evictor::new(dir.path().to_path_buf(), 200, 0).run().await;

        assert_eq!(report.removed(), 0);
        assert_eq!(report.remaining_files, 2);
        assert_eq!(report.remaining_bytes, 200);
    }

    #[tokio::test]
    async fn test_zero_limit_removes_everything() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.jpg", 10, 1_000);
        write_file(dir.path(), "b.jpg", 10, 2_000);

        let report = Evictor::new(dir.path().to_path_buf(), 0, 0).run().await;

        assert_eq!(report.evicted, 2);
        assert_eq!(report.remaining_files, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_expired_files_removed_regardless_of_size() {
        let dir = tempdir().unwrap();
        let old = write_aged_file(dir.path(), "old.jpg", 10, Duration::from_secs(3 * SECS_PER_DAY));
        let fresh = write_aged_file(dir.path(), "fresh.jpg", 10, Duration::from_secs(60));

        let report = Evictor::new(dir.path().to_path_buf(), 1_000_000, 2).run().await;

        assert!(!old.exists());
        assert!(fresh.exists());
        assert_eq!(report.expired, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(report.remaining_bytes, 10);
    }

    #[tokio::test]
    async fn test_zero_max_age_disables_expiry() {
        let dir = tempdir().unwrap();
        let ancient = write_file(dir.path(), "ancient.jpg", 10, 0);

        let report = Evictor::new(dir.path().to_path_buf(), 1_000_000, 0).run().await;

        assert!(ancient.exists());
        assert_eq!(report.removed(), 0);
    }

    #[tokio::test]
    async fn test_expired_files_do_not_count_toward_limit() {
        let dir = tempdir().unwrap();
        write_aged_file(dir.path(), "old.jpg", 100, Duration::from_secs(10 * SECS_PER_DAY));
        let a = write_aged_file(dir.path(), "a.jpg", 100, Duration::from_secs(120));
        let b = write_aged_file(dir.path(), "b.jpg", 100, Duration::from_secs(60));

        let report = Evictor::new(dir.path().to_path_buf(), 200, 1).run().await;

        assert_eq!(report.expired, 1);
        assert_eq!(report.evicted, 0);
        assert!(a.exists());
        assert!(b.exists());
    }

    #[tokio::test]
    async fn test_ignores_temp_files_and_subdirectories() {
        let dir = tempdir().unwrap();
        let tmp = write_file(dir.path(), "abc.jpg.tmp", 1_000, 0);
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        let nested = write_file(&sub, "inner.jpg", 1_000, 0);
        let published = write_file(dir.path(), "abc.jpg", 10, 0);

        let report = Evictor::new(dir.path().to_path_buf(), 0, 1).run().await;

        assert!(tmp.exists());
        assert!(nested.exists());
        assert!(!published.exists());
        assert_eq!(report.removed(), 1);
    }

    #[tokio::test]
    async fn test_missing_root_is_created() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cache");

        let report = Evictor::new(root.clone(), 100, 30).run().await;

        assert!(root.is_dir());
        assert_eq!(report, EvictionReport::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_passes_count_each_file_once() {
        let dir = tempdir().unwrap();
        for i in 0..400 {
            write_file(dir.path(), &format!("{i:03}.jpg"), 10, 1_000 + i);
        }

        let first = Evictor::new(dir.path().to_path_buf(), 0, 0);
        let second = Evictor::new(dir.path().to_path_buf(), 0, 0);
        let (a, b) = tokio::join!(first.run(), second.run());

        assert_eq!(a.removed() + b.removed(), 400);
        assert_eq!(a.remaining_files, 0);
        assert_eq!(b.remaining_files, 0);
        assert_eq!(a.remaining_bytes, 0);
        assert_eq!(b.remaining_bytes, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_already_gone_file_is_not_counted() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "a.jpg", 10, 1_000);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(remove_file(&path, "test").await, Removal::AlreadyGone);
    }

    #[tokio::test]
    async fn test_sweep_temp_files() {
        let dir = tempdir().unwrap();
        let tmp = write_file(dir.path(), "abc.jpg.tmp", 10, 0);
        let published = write_file(dir.path(), "abc.jpg", 10, 0);

        let removed = sweep_temp_files(dir.path()).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!tmp.exists());
        assert!(published.exists());
    }
}
