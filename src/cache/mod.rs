// Cache module for the dashboard's external API calls.
// Two tiers (key-value client store, per-key files) share one entry format and pending registry.

pub mod client;
pub mod clock;
pub mod diagnose;
pub mod file;
pub mod kv;
pub mod paths;
pub mod pending;
pub mod snapshot;
pub mod store;
pub mod ttl;

pub use client::ClientCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnose::{DiagnosticReport, diagnose};
pub use file::FileCache;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use pending::{Claim, PendingGuard, PendingRegistry, PendingWaiter};
pub use snapshot::SnapshotStore;
pub use store::{CachedData, Lookup, SweepReport};
pub use ttl::{DEFAULT_TTL, TtlPolicy};
