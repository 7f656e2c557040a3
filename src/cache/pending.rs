// Pending-request registry.
// Collapses overlapping fetches for the same key into one in-flight call.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What the leader published: the fetched value, or `None` when the fetch
/// failed or found nothing.
pub type Outcome = Option<Value>;

#[derive(Debug)]
struct InFlight {
    id: u64,
    settled: watch::Receiver<Option<Outcome>>,
}

/// Keys whose fetch is currently in flight.
///
/// A key is present iff some caller holds the [`PendingGuard`] for it.
/// Markers live only in memory and disappear with the process.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    inflight: DashMap<String, InFlight>,
    next_id: AtomicU64,
}

/// Result of trying to claim a key.
#[derive(Debug)]
pub enum Claim<'a> {
    /// This caller performs the fetch.
    Leader(PendingGuard<'a>),
    /// Another caller is already fetching; wait for it.
    Follower(PendingWaiter),
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fetch for `key` is in flight.
    pub fn contains(&self, key: &str) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    /// Atomically mark `key` as in flight, or join the fetch already running.
    pub fn claim(&self, key: &str) -> Claim<'_> {
        match self.inflight.entry(key.to_owned()) {
            Entry::Occupied(entry) => Claim::Follower(PendingWaiter {
                settled: entry.get().settled.clone(),
            }),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                entry.insert(InFlight { id, settled: rx });
                debug!(key, "fetch marked in flight");
                Claim::Leader(PendingGuard {
                    registry: self,
                    key: key.to_owned(),
                    id,
                    settled: tx,
                })
            }
        }
    }

    /// Drop the marker for `key` regardless of who owns it.
    /// Returns whether a marker was present.
    pub fn settle(&self, key: &str) -> bool {
        self.inflight.remove(key).is_some()
    }

    /// Run `leader` unless a fetch for `key` is already in flight, in which
    /// case wait for that fetch's outcome instead.
    pub async fn coalesce<F, Fut>(&self, key: &str, leader: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        match self.claim(key) {
            Claim::Follower(waiter) => {
                debug!(key, "joining in-flight fetch");
                waiter.wait().await
            }
            Claim::Leader(guard) => {
                let outcome = leader().await;
                guard.complete(outcome.clone());
                outcome
            }
        }
    }
}

/// Turn a fetch result into the outcome shared with waiters.
/// Only a successful fetch produces a value.
pub(crate) fn fetch_outcome<T, E>(key: &str, result: Result<Option<T>, E>) -> Outcome
where
    T: Serialize,
    E: Display,
{
    match result {
        Ok(Some(data)) => serde_json::to_value(&data)
            .inspect_err(|e| warn!(key, error = %e, "fetched value is not JSON"))
            .ok(),
        Ok(None) => {
            debug!(key, "fetch found nothing");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "fetch failed");
            None
        }
    }
}

/// Give a shared outcome back its caller's type.
pub(crate) fn decode_outcome<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    serde_json::from_value(value)
        .inspect_err(|e| warn!(key, error = %e, "cached value has an unexpected shape"))
        .ok()
}

/// Ownership of an in-flight marker. Dropping it removes the marker,
/// whether the fetch succeeded, failed, panicked, or was cancelled.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    registry: &'a PendingRegistry,
    key: String,
    id: u64,
    settled: watch::Sender<Option<Outcome>>,
}

impl PendingGuard<'_> {
    /// Publish the outcome to every waiter and release the marker.
    pub fn complete(self, outcome: Outcome) {
        self.settled.send_replace(Some(outcome));
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // Only our own marker; a later claim on the same key may have replaced it.
        let removed = self
            .registry
            .inflight
            .remove_if(&self.key, |_, inflight| inflight.id == self.id)
            .is_some();
        if removed {
            debug!(key = %self.key, "in-flight marker released");
        }
    }
}

/// Handle for a caller that joined someone else's fetch.
#[derive(Debug)]
pub struct PendingWaiter {
    settled: watch::Receiver<Option<Outcome>>,
}

impl PendingWaiter {
    /// Wait for the leader. `None` if it failed, found nothing, or went
    /// away without publishing.
    pub async fn wait(mut self) -> Outcome {
        match self.settled.wait_for(Option::is_some).await {
            Ok(settled) => (*settled).clone().flatten(),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_claim_and_release() {
        let registry = PendingRegistry::new();

        let guard = match registry.claim("UCabc") {
            Claim::Leader(guard) => guard,
            Claim::Follower(_) => panic!("first claim should lead"),
        };
        assert!(registry.contains("UCabc"));
        assert!(matches!(registry.claim("UCabc"), Claim::Follower(_)));

        drop(guard);
        assert!(!registry.contains("UCabc"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_guard_keeps_newer_marker() {
        let registry = PendingRegistry::new();

        let Claim::Leader(first) = registry.claim("k") else {
            panic!("expected leader");
        };
        assert!(registry.settle("k"));

        let Claim::Leader(second) = registry.claim("k") else {
            panic!("expected leader after settle");
        };
        drop(first);
        assert!(registry.contains("k"));

        drop(second);
        assert!(!registry.contains("k"));
    }

    #[tokio::test]
    async fn test_followers_see_leader_outcome() {
        let registry = PendingRegistry::new();

        let Claim::Leader(guard) = registry.claim("k") else {
            panic!("expected leader");
        };
        let Claim::Follower(waiter) = registry.claim("k") else {
            panic!("expected follower");
        };

        guard.complete(Some(json!({"views": 1000})));
        assert_eq!(waiter.wait().await, Some(json!({"views": 1000})));
        assert!(!registry.contains("k"));
    }

    #[tokio::test]
    async fn test_abandoned_leader_releases_followers() {
        let registry = PendingRegistry::new();

        let Claim::Leader(guard) = registry.claim("k") else {
            panic!("expected leader");
        };
        let Claim::Follower(waiter) = registry.claim("k") else {
            panic!("expected follower");
        };

        drop(guard);
        assert_eq!(waiter.wait().await, None);
    }

    #[test]
    fn test_fetch_outcome() {
        assert_eq!(fetch_outcome::<_, String>("k", Ok(Some(5))), Some(json!(5)));
        assert_eq!(fetch_outcome::<u32, &str>("k", Ok(None)), None);
        assert_eq!(fetch_outcome::<u32, _>("k", Err("boom")), None);
    }

    #[test]
    fn test_decode_outcome_shape_mismatch() {
        assert_eq!(decode_outcome::<u32>("k", json!(3)), Some(3));
        assert_eq!(decode_outcome::<u32>("k", json!("three")), None);
    }

    #[tokio::test]
    async fn test_coalesce_runs_one_fetch() {
        let registry = PendingRegistry::new();
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Some(json!({"subscribers": 42}))
        };

        let (a, b, c) = tokio::join!(
            registry.coalesce("UCabc", fetch),
            registry.coalesce("UCabc", fetch),
            registry.coalesce("UCabc", fetch),
        );

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(a, Some(json!({"subscribers": 42})));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_coalesce_distinct_keys_run_separately() {
        let registry = PendingRegistry::new();
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;

        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            None
        };

        let (a, b) = tokio::join!(registry.coalesce("a", fetch), registry.coalesce("b", fetch));

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(a, None);
        assert_eq!(b, None);
    }
}
