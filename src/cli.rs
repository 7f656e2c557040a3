// Command-line interface for inspecting and maintaining the caches.
// Each subcommand builds the stores from `Config` and prints a human or JSON result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;

use crate::cache::{
    ClientCache, DiagnosticReport, FileCache, JsonFileStore, Lookup, PendingRegistry,
    SnapshotStore, SweepReport, diagnose,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::youtube::{ChannelStats, YouTubeClient};

#[derive(Parser)]
#[command(name = "yt-cache", version, about = "Inspect and maintain the YouTube analytics caches")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a server cache entry
    Get {
        /// Cache key, e.g. a channel id
        key: String,
    },

    /// Delete a server cache entry
    Invalidate { key: String },

    /// Remove expired and unreadable server cache entries
    Clean,

    /// Remove expired and unreadable client store entries
    CleanClient,

    /// Channel statistics, served from the server cache when fresh
    Stats {
        /// Channel id, channel URL, @handle or name
        channel: String,

        /// Also save today's snapshot of the statistics
        #[arg(long)]
        snapshot: bool,
    },

    /// Daily snapshot commands
    #[command(subcommand)]
    Snapshot(SnapshotCommands),

    /// Check that the cache directories exist and are writable
    Check,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Save today's snapshot from a JSON file or stdin
    Save {
        channel: String,
        /// JSON file to read; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Print today's snapshot
    Load { channel: String },

    /// Delete snapshots from earlier days
    Prune,
}

/// Run one parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Get { key } => get(&config, &key, json).await,
        Commands::Invalidate { key } => {
            let removed = file_cache(&config).invalidate(&key).await;
            emit(json, &json!({ "key": key, "removed": removed }), || {
                if removed {
                    format!("Invalidated {}", key)
                } else {
                    format!("Could not invalidate {}", key)
                }
            });
            Ok(())
        }
        Commands::Clean => {
            let report = file_cache(&config).sweep().await?;
            emit(json, &report, || sweep_summary("server cache", &report));
            Ok(())
        }
        Commands::CleanClient => {
            let report = client_cache(&config)?.sweep()?;
            emit(json, &report, || sweep_summary("client store", &report));
            Ok(())
        }
        Commands::Stats { channel, snapshot } => stats(&config, &channel, snapshot, json).await,
        Commands::Snapshot(command) => run_snapshot(&config, command, json).await,
        Commands::Check => {
            let report = diagnose(&config.data_dir, &config.cache_dir);
            emit(json, &report, || check_summary(&report));
            if report.is_healthy() {
                Ok(())
            } else {
                Err(CacheError::Other("cache directories are not usable".into()))
            }
        }
    }
}

/// Print an error the same way results are printed.
pub fn handle_error(err: &CacheError, json: bool) {
    if json {
        println!("{}", json!({ "error": err.to_string() }));
    } else {
        eprintln!("Error: {}", err);
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) {
    if json {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    } else {
        println!("{}", human());
    }
}

fn file_cache(config: &Config) -> FileCache {
    FileCache::new(&config.cache_dir, Arc::new(PendingRegistry::new()))
        .with_prefix(config.prefix.clone())
        .with_ttl_policy(config.ttl_policy())
}

fn client_cache(config: &Config) -> Result<ClientCache<JsonFileStore>> {
    let path = config
        .client_store_path()
        .ok_or_else(|| CacheError::Config("no client store path configured".into()))?;
    Ok(
        ClientCache::new(JsonFileStore::open(path)?, Arc::new(PendingRegistry::new()))
            .with_prefix(config.prefix.clone())
            .with_ttl_policy(config.ttl_policy()),
    )
}

async fn get(config: &Config, key: &str, json: bool) -> Result<()> {
    match file_cache(config).lookup::<Value>(key).await {
        Lookup::Hit(data) => {
            emit(json, &json!({ "key": key, "hit": true, "data": data }), || {
                serde_json::to_string_pretty(&data).unwrap_or_default()
            });
            Ok(())
        }
        Lookup::Miss => {
            emit(json, &json!({ "key": key, "hit": false }), || {
                format!("No fresh entry for {}", key)
            });
            Ok(())
        }
        Lookup::StorageError(e) => Err(e),
    }
}

async fn stats(config: &Config, channel: &str, snapshot: bool, json: bool) -> Result<()> {
    let client = YouTubeClient::from_env()?;
    let channel_id = client
        .resolve_channel_id(channel)
        .await?
        .ok_or_else(|| CacheError::NotFound(format!("channel {}", channel)))?;

    let cache = file_cache(config);
    let stats: ChannelStats = cache
        .fetch_or_serve(&channel_id, || client.get_channel_stats(&channel_id))
        .await
        .ok_or_else(|| CacheError::NotFound(format!("statistics for {}", channel_id)))?;

    if snapshot {
        SnapshotStore::new(&config.snapshot_dir)
            .save(&channel_id, &stats)
            .await?;
    }

    emit(json, &stats, || stats_summary(&stats));
    Ok(())
}

async fn run_snapshot(config: &Config, command: SnapshotCommands, json: bool) -> Result<()> {
    let store = SnapshotStore::new(&config.snapshot_dir);

    match command {
        SnapshotCommands::Save { channel, file } => {
            let data = read_json(file.as_deref()).await?;
            let path = store.save(&channel, &data).await?;
            emit(json, &json!({ "channel": channel, "path": path }), || {
                format!("Saved {}", path.display())
            });
        }
        SnapshotCommands::Load { channel } => {
            let data = store.load(&channel).await?;
            emit(json, &json!({ "channel": channel, "data": data }), || match &data {
                Some(data) => serde_json::to_string_pretty(data).unwrap_or_default(),
                None => format!("No snapshot for {} today", channel),
            });
        }
        SnapshotCommands::Prune => {
            let removed = store.prune().await?;
            emit(json, &json!({ "removed": removed }), || {
                format!("Pruned {} old snapshot(s)", removed)
            });
        }
    }
    Ok(())
}

async fn read_json(file: Option<&Path>) -> Result<Value> {
    let contents = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    Ok(serde_json::from_str(&contents)?)
}

fn sweep_summary(tier: &str, report: &SweepReport) -> String {
    format!(
        "Cleaned {}: {} scanned, {} expired, {} corrupted, {} kept, {} skipped, {} failed",
        tier,
        report.scanned,
        report.expired,
        report.corrupted,
        report.kept,
        report.skipped,
        report.failed
    )
}

fn stats_summary(stats: &ChannelStats) -> String {
    let subscribers = stats
        .subscribers
        .map(|s| s.to_string())
        .unwrap_or_else(|| "hidden".to_string());
    format!(
        "{} ({})\n  subscribers: {}\n  views: {}\n  videos: {}",
        stats.name, stats.id, subscribers, stats.views, stats.videos_count
    )
}

fn check_summary(report: &DiagnosticReport) -> String {
    let mut lines = Vec::new();
    for (label, dir) in [("data", &report.data_dir), ("cache", &report.cache_dir)] {
        let state = match (&dir.error, dir.created) {
            (Some(e), _) => format!("error: {}", e),
            (None, true) => "created".to_string(),
            (None, false) => "ok".to_string(),
        };
        let mode = dir.mode.as_deref().unwrap_or("-");
        lines.push(format!("{} dir {}: {} (mode {})", label, dir.path.display(), state, mode));
    }
    lines.push(match &report.write_error {
        None => "write test: ok".to_string(),
        Some(e) => format!("write test: failed ({})", e),
    });
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_snapshot_save() {
        let cli = Cli::parse_from(["yt-cache", "--json", "snapshot", "save", "UCabc", "s.json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Snapshot(SnapshotCommands::Save { channel, file }) => {
                assert_eq!(channel, "UCabc");
                assert_eq!(file, Some(PathBuf::from("s.json")));
            }
            _ => panic!("expected snapshot save"),
        }
    }

    #[test]
    fn test_sweep_summary() {
        let report = SweepReport {
            scanned: 3,
            expired: 1,
            kept: 2,
            ..SweepReport::default()
        };
        let text = sweep_summary("server cache", &report);
        assert!(text.starts_with("Cleaned server cache: 3 scanned, 1 expired"));
    }

    #[tokio::test]
    async fn test_read_json_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("s.json");
        std::fs::write(&path, r#"{"views": 5}"#).unwrap();

        assert_eq!(read_json(Some(&path)).await.unwrap(), json!({"views": 5}));

        std::fs::write(&path, "nope").unwrap();
        assert!(matches!(
            read_json(Some(&path)).await,
            Err(CacheError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_get_reports_saved_entry() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            cache_dir: temp_dir.path().join("cache"),
            ..Config::default()
        };

        file_cache(&config)
            .try_save("UCabc", &json!({"views": 1}))
            .await
            .unwrap();
        assert!(get(&config, "UCabc", true).await.is_ok());
        assert!(get(&config, "UCother", false).await.is_ok());
    }
}
