// Error types for the cache layer.
// Covers storage failures, YouTube API errors, and configuration problems.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Cache directory {path} is unavailable: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YouTube API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("YouTube API rejected the API key")]
    Unauthorized,

    #[error("YouTube API quota exceeded: {0}")]
    ApiQuotaExceeded(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Missing YOUTUBE_API_KEY environment variable")]
    MissingApiKey,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
