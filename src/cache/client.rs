// Client-side cache over a persistent key-value store.
// Gives UI fetch flows a fetch-or-serve decision per identity key.

use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::clock::{Clock, SystemClock};
use super::kv::KeyValueStore;
use super::paths::DEFAULT_PREFIX;
use super::pending::{PendingRegistry, decode_outcome, fetch_outcome};
use super::store::{CachedData, Lookup, RawEntry, SweepReport};
use super::ttl::TtlPolicy;

/// Key-value backed cache with pending-request coalescing.
///
/// Entries live at `<prefix><key>` in the store as `{data, timestamp}` JSON.
/// A key whose fetch is in flight counts as cached, so repeated triggers
/// wait for the running fetch instead of starting another.
pub struct ClientCache<S> {
    store: S,
    prefix: String,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
    pending: Arc<PendingRegistry>,
}

impl<S: KeyValueStore> ClientCache<S> {
    pub fn new(store: S, pending: Arc<PendingRegistry>) -> Self {
        Self {
            store,
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

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pending(&self) -> &Arc<PendingRegistry> {
        &self.pending
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn discard(&self, storage_key: &str) -> bool {
        match self.store.remove_item(storage_key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = storage_key, error = %e, "failed to delete client cache entry");
                false
            }
        }
    }

    /// Whether `key` is being fetched or has a fresh entry.
    /// Expired and malformed entries found here are deleted.
    pub fn is_cached(&self, key: &str) -> bool {
        self.pending.contains(key) || self.lookup::<Value>(key).is_hit()
    }

    /// Read a fresh entry, deleting it if it is expired or malformed.
    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Lookup::Miss,
            Err(e) => {
                warn!(key, error = %e, "client cache read failed");
                return Lookup::StorageError(e);
            }
        };

        let entry = match RawEntry::from_json(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "discarding malformed client cache entry");
                self.discard(&storage_key);
                return Lookup::Miss;
            }
        };

        if entry.is_expired(self.clock.now_millis(), self.ttl.ttl_for(key)) {
            debug!(key, "client cache entry expired");
            self.discard(&storage_key);
            return Lookup::Miss;
        }

        // A well-formed entry of another shape stays for its own readers.
        match decode_outcome(key, entry.data) {
            Some(data) => {
                debug!(key, "using client cache");
                Lookup::Hit(data)
            }
            None => Lookup::Miss,
        }
    }

    /// Fresh payload for `key`, or `None` on any miss or storage failure.
    pub fn get_cached_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).into_option()
    }

    /// Write `data` under `key`, stamped with the current time.
    pub fn try_save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let entry = CachedData::new(data, self.clock.now_millis());
        let json = serde_json::to_string(&entry)?;
        self.store.set_item(&self.storage_key(key), &json)
    }

    /// Write `data` under `key` and settle its pending marker.
    /// Returns `false` if the store refused the write.
    pub fn save_to_cache<T: Serialize>(&self, key: &str, data: &T) -> bool {
        let result = self.try_save(key, data);
        self.pending.settle(key);
        match result {
            Ok(()) => {
                debug!(key, "saved to client cache");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "failed to save to client cache");
                false
            }
        }
    }

    /// Delete the entry for `key`. Returns `false` if the store failed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.discard(&self.storage_key(key))
    }

    /// Delete every expired or unparseable entry under the prefix.
    pub fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now_millis();
        let mut report = SweepReport::default();

        for storage_key in self.store.keys()? {
            let Some(key) = storage_key.strip_prefix(self.prefix.as_str()) else {
                report.skipped += 1;
                continue;
            };
            report.scanned += 1;

            let raw = match self.store.get_item(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key, error = %e, "failed to read client cache entry");
                    report.failed += 1;
                    continue;
                }
            };

            match RawEntry::from_json(&raw) {
                Ok(entry) if entry.is_valid(now, self.ttl.ttl_for(key)) => report.kept += 1,
                Ok(_) => {
                    if self.discard(&storage_key) {
                        report.expired += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Err(_) => {
                    if self.discard(&storage_key) {
                        report.corrupted += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            expired = report.expired,
            corrupted = report.corrupted,
            kept = report.kept,
            "client cache cleanup finished"
        );
        Ok(report)
    }

    /// Sweep old entries. Returns `false` only if the store could not be listed.
    pub fn cleanup_old_cache(&self) -> bool {
        match self.sweep() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "client cache cleanup failed");
                false
            }
        }
    }

    /// Serve `key` from cache, or run `fetch` once no matter how many callers
    /// ask at the same time.
    ///
    /// `fetch` reports success (`Ok(Some)`), not-found (`Ok(None)`), or
    /// failure (`Err`). Only successes are cached; every caller waiting on the
    /// same fetch gets the same answer.
    pub async fn fetch_or_serve<T, F, Fut, E>(&self, key: &str, fetch: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        if !self.pending.contains(key) {
            if let Lookup::Hit(data) = self.lookup(key) {
                return Some(data);
            }
        }

        let value = self
            .pending
            .coalesce(key, move || async move {
                // Another leader may have finished between the miss and our claim.
                let cached = self.lookup::<T>(key).into_option();
                if let Some(value) = cached.and_then(|data| serde_json::to_value(&data).ok()) {
                    return Some(value);
                }
                let outcome = fetch_outcome(key, fetch().await);
                if let Some(value) = &outcome {
                    self.save_to_cache(key, value);
                }
                outcome
            })
            .await?;

        decode_outcome(key, value)
    }
}
