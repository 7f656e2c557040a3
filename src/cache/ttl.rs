// TTL policy keyed by cache key namespace.
// Shorter-lived data (real-time trends, topic scores) lives under its own key prefix.

use std::time::Duration;

/// Default TTL for channel stats and anything without a namespace: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL for real-time trend queries: 30 minutes.
pub const REALTIME_TTL: Duration = Duration::from_secs(30 * 60);

/// TTL for topic and engagement scores: 1 hour.
pub const SCORE_TTL: Duration = Duration::from_secs(60 * 60);

/// Maps key namespaces to their time-to-live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    default: Duration,
    namespaces: Vec<(String, Duration)>,
}

impl TtlPolicy {
    /// A policy with only a default TTL.
    pub fn uniform(default: Duration) -> Self {
        Self {
            default,
            namespaces: Vec::new(),
        }
    }

    /// Add or replace the TTL for keys starting with `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>, ttl: Duration) -> Self {
        let namespace = namespace.into();
        self.namespaces.retain(|(ns, _)| *ns != namespace);
        self.namespaces.push((namespace, ttl));
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default
    }

    /// TTL for a key; the longest matching namespace wins.
    pub fn ttl_for(&self, key: &str) -> Duration {
        self.namespaces
            .iter()
            .filter(|(ns, _)| key.starts_with(ns.as_str()))
            .max_by_key(|(ns, _)| ns.len())
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.default)
    }

    /// The dashboard's namespaces on top of the given default TTL.
    pub fn dashboard(default: Duration) -> Self {
        Self::uniform(default)
            .with_namespace("realtime_trends_", REALTIME_TTL)
            .with_namespace("topic_score_", SCORE_TTL)
            .with_namespace("youtube_trending_topics_", SCORE_TTL)
            .with_namespace("video_optimization_", SCORE_TTL)
            .with_namespace("competitor_topics_", DEFAULT_TTL)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::dashboard(DEFAULT_TTL)
    }
}
