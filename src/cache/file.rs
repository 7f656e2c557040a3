// Server-side file cache.
// One JSON file per key in a dedicated directory, durable across restarts.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

use super::clock::{Clock, SystemClock};
use super::paths::{DEFAULT_PREFIX, entry_key, entry_path};
use super::pending::{PendingRegistry, decode_outcome, fetch_outcome};
use super::store::{CachedData, Lookup, RawEntry, SweepReport, write_atomic};
use super::ttl::TtlPolicy;

/// Filesystem-backed cache: `<dir>/<prefix><key>.json` holds
/// `{"data": ..., "timestamp": ...}`.
///
/// No locking; concurrent writers to one key race and the last rename wins.
pub struct FileCache {
    dir: PathBuf,
    prefix: String,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
    pending: Arc<PendingRegistry>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, pending: Arc<PendingRegistry>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: TtlPolicy::default(),
            clock: Arc::new(SystemClock),
            pending,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pending(&self) -> &Arc<PendingRegistry> {
        &self.pending
    }

    /// Path of the file backing `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        entry_path(&self.dir, &self.prefix, key)
    }

    /// Create the cache directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<()> {
        if fs::metadata(&self.dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::DirectoryUnavailable {
                path: self.dir.clone(),
                source,
            })?;
        info!(dir = %self.dir.display(), "cache directory created");
        Ok(())
    }

    async fn discard(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete cache file");
                false
            }
        }
    }

    /// Read a fresh entry, deleting its file if it is expired or malformed.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let path = self.entry_path(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Lookup::Miss,
            Err(e) => {
                warn!(key, error = %e, "error reading cache");
                return Lookup::StorageError(e.into());
            }
        };

        let entry = match RawEntry::from_json(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "deleting corrupted cache file");
                self.discard(&path).await;
                return Lookup::Miss;
            }
        };

        if entry.is_expired(self.clock.now_millis(), self.ttl.ttl_for(key)) {
            debug!(key, "server cache entry expired");
            self.discard(&path).await;
            return Lookup::Miss;
        }

        // A well-formed entry of another shape stays for its own readers.
        match decode_outcome(key, entry.data) {
            Some(data) => {
                debug!(key, "using server cache");
                Lookup::Hit(data)
            }
            None => Lookup::Miss,
        }
    }

    /// Fresh payload for `key`, or `None` on any miss or storage failure.
    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_option()
    }

    /// Write `data` under `key`, stamped with the current time.
    pub async fn try_save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        self.ensure_dir().await?;

        let path = self.entry_path(key);
        let json = CachedData::new(data, self.clock.now_millis()).to_json_pretty()?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, json.as_bytes()))
            .await
            .map_err(|e| CacheError::Other(format!("cache write task failed: {}", e)))??;

        debug!(path = %path.display(), "saved to server cache");
        Ok(())
    }

    /// Write `data` under `key`. Returns `false` on any I/O failure.
    pub async fn save_to_cache<T: Serialize>(&self, key: &str, data: &T) -> bool {
        match self.try_save(key, data).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "error saving to cache");
                false
            }
        }
    }

    /// Delete the file for `key`. A missing file counts as success.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.discard(&self.entry_path(key)).await
    }

    /// Delete expired and corrupted entry files. Names outside the
    /// `<prefix>*.json` pattern are left alone; a missing directory is empty.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };
        let now = self.clock.now_millis();

        while let Some(dir_entry) = entries.next_entry().await? {
            let file_name = dir_entry.file_name();
            let Some(key) = file_name.to_str().and_then(|name| entry_key(&self.prefix, name))
            else {
                report.skipped += 1;
                continue;
            };
            if dir_entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                report.skipped += 1;
                continue;
            }
            report.scanned += 1;

            let path = dir_entry.path();
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read cache file");
                    report.failed += 1;
                    continue;
                }
            };

            match RawEntry::from_json(&contents) {
                Ok(entry) if entry.is_valid(now, self.ttl.ttl_for(&key)) => report.kept += 1,
                Ok(_) => {
                    if self.discard(&path).await {
                        debug!(path = %path.display(), "deleted expired cache file");
                        report.expired += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Err(_) => {
                    if self.discard(&path).await {
                        debug!(path = %path.display(), "deleted corrupted cache file");
                        report.corrupted += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            dir = %self.dir.display(),
            expired = report.expired,
            corrupted = report.corrupted,
            kept = report.kept,
            "server cache cleanup finished"
        );
        Ok(report)
    }

    /// Sweep old entries. Returns `false` only if the directory could not be listed.
    pub async fn clean_cache(&self) -> bool {
        match self.sweep().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "error cleaning up cache");
                false
            }
        }
    }

    /// Serve `key` from disk, or run `fetch` with at most one fetch per key
    /// in flight in this process. Same contract as the client tier.
    pub async fn fetch_or_serve<T, F, Fut, E>(&self, key: &str, fetch: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        if let Lookup::Hit(data) = self.lookup(key).await {
            return Some(data);
        }

        let value = self
            .pending
            .coalesce(key, move || async move {
                // An entry of another shape is a miss; fetch and replace it.
                let cached = self.lookup::<T>(key).await.into_option();
                if let Some(value) = cached.and_then(|data| serde_json::to_value(&data).ok()) {
                    return Some(value);
                }
                let outcome = fetch_outcome(key, fetch().await);
                if let Some(value) = &outcome {
                    self.save_to_cache(key, value).await;
                }
                outcome
            })
            .await?;

        decode_outcome(key, value)
    }
}
