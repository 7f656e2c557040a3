// Two-tier caching for the YouTube analytics dashboard.
// A key-value client cache and a per-key file cache sharing one entry format.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod youtube;

pub use cache::{
    CachedData, ClientCache, FileCache, Lookup, PendingRegistry, SnapshotStore, SweepReport,
    TtlPolicy,
};
pub use config::Config;
pub use error::{CacheError, Result};
