// Daily per-channel snapshots.
// Keeps one JSON document per channel per UTC day; older days are pruned.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::clock::{Clock, SystemClock};
use super::paths::{snapshot_date, snapshot_file_name};

/// Store of `<channel>_<YYYY-MM-DD>.json` files.
pub struct SnapshotStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of today's snapshot for `channel_id`.
    pub fn today_path(&self, channel_id: &str) -> PathBuf {
        self.dir.join(snapshot_file_name(channel_id, self.clock.today()))
    }

    /// Today's snapshot for `channel_id`, if one was saved.
    pub async fn load(&self, channel_id: &str) -> Result<Option<Value>> {
        let path = self.today_path(channel_id);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save today's snapshot for `channel_id`, replacing any earlier one.
    pub async fn save<T: Serialize>(&self, channel_id: &str, data: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.today_path(channel_id);
        fs::write(&path, serde_json::to_string_pretty(data)?).await?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Delete snapshots from any day but today. Returns how many were removed.
    pub async fn prune(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let today = self.clock.today();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(date) = file_name.to_str().and_then(snapshot_date) else {
                continue;
            };
            if date == today {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to prune snapshot")
                }
            }
        }

        info!(removed, "old snapshots pruned");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    // 2024-05-17T12:00:00Z
    const NOON: i64 = 1_715_947_200_000;

    #[tokio::test]
    async fn test_save_and_load_today() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(NOON));
        let store = SnapshotStore::new(temp_dir.path()).with_clock(clock.clone());

        assert_eq!(store.load("UCabc").await.unwrap(), None);

        let path = store.save("UCabc", &json!({"subscribers": 10})).await.unwrap();
        assert!(path.ends_with("UCabc_2024-05-17.json"));
        assert_eq!(
            store.load("UCabc").await.unwrap(),
            Some(json!({"subscribers": 10}))
        );

        // Tomorrow there is no snapshot yet.
        clock.advance(Duration::from_secs(24 * 60 * 60));
        assert_eq!(store.load("UCabc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prune_keeps_today_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(NOON));
        let store = SnapshotStore::new(temp_dir.path()).with_clock(clock.clone());

        store.save("UCold", &json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(24 * 60 * 60));
        store.save("UCnew", &json!(2)).await.unwrap();
        std::fs::write(temp_dir.path().join("yt_analyzer_UCx.json"), "{}").unwrap();

        assert_eq!(store.prune().await.unwrap(), 1);
        assert!(!temp_dir.path().join("UCold_2024-05-17.json").exists());
        assert!(temp_dir.path().join("UCnew_2024-05-18.json").exists());
        assert!(temp_dir.path().join("yt_analyzer_UCx.json").exists());
    }

    #[tokio::test]
    async fn test_prune_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("absent"));
        assert_eq!(store.prune().await.unwrap(), 0);
    }
}
