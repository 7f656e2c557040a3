// YouTube Data API module.
// Client and types for the channel lookups the dashboard caches.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::YouTubeClient;
pub use endpoints::{ChannelRef, parse_channel_ref};
pub use types::ChannelStats;
