// Cache entry format shared by both tiers.
// Handles the {data, timestamp} record, TTL checks, lookup outcomes, and atomic writes.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{CacheError, Result};

use super::clock::duration_millis;

/// A cached payload with the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// The cached payload. Some writers call this field `payload`.
    #[serde(alias = "payload")]
    pub data: T,
    /// When the payload was cached, in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// An entry whose payload has not been given a type yet.
pub type RawEntry = CachedData<serde_json::Value>;

impl<T> CachedData<T> {
    pub fn new(data: T, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// Age of the entry at `now`. Negative if the clock moved backwards.
    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    /// Check if this entry has expired: older than `ttl` at `now`.
    pub fn is_expired(&self, now: i64, ttl: Duration) -> bool {
        self.age_millis(now) > duration_millis(ttl)
    }

    /// Check if this entry is still valid (not expired).
    pub fn is_valid(&self, now: i64, ttl: Duration) -> bool {
        !self.is_expired(now, ttl)
    }
}

impl<T: Serialize> CachedData<T> {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<T: DeserializeOwned> CachedData<T> {
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

/// Outcome of a cache read.
///
/// A miss covers absent, expired, and corrupted entries. Storage errors are
/// kept apart so callers can tell "cold" from "broken" when they care.
#[derive(Debug)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    StorageError(CacheError),
}

impl<T> Lookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }

    /// Collapse to the sentinel form: anything but a hit is `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::StorageError(_) => None,
        }
    }
}

/// Counts from one pass over a cache's stored entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries inside the namespace that were inspected.
    pub scanned: usize,
    /// Entries deleted because they outlived their TTL.
    pub expired: usize,
    /// Entries deleted because they could not be parsed.
    pub corrupted: usize,
    /// Entries left in place.
    pub kept: usize,
    /// Names outside the namespace, left alone.
    pub skipped: usize,
    /// Entries that could not be read or deleted.
    pub failed: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.corrupted
    }
}

/// Write a file atomically via a uniquely named temp file in the same
/// directory. Concurrent writers never share a temp file, so the last
/// rename wins. The temp file is removed on every failure path.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".yt-cache-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn test_expiry_boundary() {
        let entry = CachedData::new("x", 0);
        let ttl = Duration::from_secs(3600);

        assert!(entry.is_valid(HOUR_MS - 1, ttl));
        // Exactly TTL old is still valid.
        assert!(entry.is_valid(HOUR_MS, ttl));
        assert!(entry.is_expired(HOUR_MS + 1, ttl));
    }

    #[test]
    fn test_clock_moved_backwards_is_valid() {
        let entry = CachedData::new("x", 10 * HOUR_MS);
        assert!(entry.is_valid(0, Duration::from_secs(1)));
    }

    #[test]
    fn test_payload_alias() {
        let raw = r#"{"payload": {"views": 1000}, "timestamp": 5}"#;
        let entry: RawEntry = CachedData::from_json(raw).unwrap();
        assert_eq!(entry.data, json!({"views": 1000}));
        assert_eq!(entry.timestamp, 5);
    }

    #[test]
    fn test_missing_fields_fail_to_parse() {
        assert!(RawEntry::from_json(r#"{"data": 1}"#).is_err());
        assert!(RawEntry::from_json(r#"{"timestamp": 1}"#).is_err());
        assert!(RawEntry::from_json("not json").is_err());
    }

    #[test]
    fn test_on_disk_shape() {
        let entry = CachedData::new(json!({"views": 1000}), 1_700_000_000_000);
        let value: serde_json::Value =
            serde_json::from_str(&entry.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"data": {"views": 1000}, "timestamp": 1_700_000_000_000i64})
        );
    }

    #[test]
    fn test_lookup_into_option() {
        assert_eq!(Lookup::Hit(3).into_option(), Some(3));
        assert_eq!(Lookup::<i32>::Miss.into_option(), None);
        let broken: Lookup<i32> = Lookup::StorageError(CacheError::Other("disk".into()));
        assert!(!broken.is_hit());
        assert_eq!(broken.into_option(), None);
    }

    #[test]
    fn test_write_atomic_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("file.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_atomic_failure_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = temp_dir.path().join("entry.json");
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(write_atomic(&path, b"{}").is_err());

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("entry.json")]);
    }

    #[test]
    fn test_concurrent_writers_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entry.json");

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let path = &path;
                    scope.spawn(move || {
                        (0..25).all(|_| write_atomic(path, format!("{}", i).as_bytes()).is_ok())
                    })
                })
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });

        let last: u32 = fs::read_to_string(&path).unwrap().parse().unwrap();
        assert!(last < 8);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}
