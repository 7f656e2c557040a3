// Configuration for the cache layer.
// Loaded from a JSON file with environment overrides; every field has a default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::paths::{
    self, DEFAULT_CACHE_DIR, DEFAULT_DATA_DIR, DEFAULT_PREFIX, DEFAULT_SNAPSHOT_DIR,
};
use crate::cache::ttl::{DEFAULT_TTL, TtlPolicy};
use crate::error::{CacheError, Result};

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "YT_CACHE_";

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Writable data area holding the cache directories.
    pub data_dir: PathBuf,
    /// Server-tier cache directory.
    pub cache_dir: PathBuf,
    /// Daily snapshot directory.
    pub snapshot_dir: PathBuf,
    /// Namespace prefix for stored entries.
    pub prefix: String,
    /// TTL for keys outside every namespace.
    pub default_ttl_secs: u64,
    /// Extra or replacement namespace TTLs, keyed by key prefix.
    pub namespace_ttls: BTreeMap<String, u64>,
    /// Client-tier store file; defaults to the platform data directory.
    pub client_store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl_secs: DEFAULT_TTL.as_secs(),
            namespace_ttls: BTreeMap::new(),
            client_store_path: None,
        }
    }
}

/// Short variable names kept for the two most common overrides:
/// `YT_CACHE_DIR` and `YT_CACHE_TTL_SECS`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        if key.as_str().eq_ignore_ascii_case("dir") {
            "cache_dir".into()
        } else if key.as_str().eq_ignore_ascii_case("ttl_secs") {
            "default_ttl_secs".into()
        } else {
            key.as_str().into()
        }
    })
}

impl Config {
    /// Load with precedence (lowest to highest):
    /// 1. Built-in defaults
    /// 2. `path`, or the platform `config.json` when no path is given
    /// 3. `YT_CACHE_*` environment variables
    ///
    /// An explicit `path` must exist; the platform file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(CacheError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
        }
        let file = path.map(Path::to_path_buf).or_else(paths::config_path);
        if let Some(file) = &file {
            debug!(path = %file.display(), "loading config");
        }

        Self::extract(Self::figment(file.as_deref()).merge(env_provider()))
    }

    /// Defaults layered under an optional JSON file.
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        match file {
            Some(file) => figment.merge(Json::file(file)),
            None => figment,
        }
    }

    /// Defaults layered under a JSON document.
    pub fn from_json(contents: &str) -> Result<Self> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Json::string(contents)),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(CacheError::Config("prefix must not be empty".into()));
        }
        if self.default_ttl_secs == 0 {
            return Err(CacheError::Config("default_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    /// TTL policy: built-in namespaces, the configured default, then
    /// configured namespace overrides.
    pub fn ttl_policy(&self) -> TtlPolicy {
        self.namespace_ttls.iter().fold(
            TtlPolicy::dashboard(Duration::from_secs(self.default_ttl_secs)),
            |policy, (namespace, secs)| {
                policy.with_namespace(namespace.clone(), Duration::from_secs(*secs))
            },
        )
    }

    /// Client store file, falling back to the platform data directory.
    pub fn client_store_path(&self) -> Option<PathBuf> {
        self.client_store_path.clone().or_else(paths::client_store_path)
    }
}
