// Cache path utilities.
// Builds the on-disk names for cache entries and daily snapshots.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use directories::ProjectDirs;

/// Namespace prefix for every stored entry.
pub const DEFAULT_PREFIX: &str = "yt_analyzer_";

/// File extension of cache entries.
pub const ENTRY_EXTENSION: &str = ".json";

/// Server-tier cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

/// Daily snapshot directory, relative to the working directory.
pub const DEFAULT_SNAPSHOT_DIR: &str = "data/snapshots";

/// Writable data area that holds the cache directories.
pub const DEFAULT_DATA_DIR: &str = "data";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "yt-analyzer")
}

/// Platform config directory (~/.config/yt-analyzer on Linux).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path to the optional config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.json"))
}

/// Path to the persistent client-side key-value store.
pub fn client_store_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("local_storage.json"))
}

/// File name of a cache entry: `<prefix><key>.json`, with the key
/// percent-encoded outside `[A-Za-z0-9._-]`.
pub fn entry_file_name(prefix: &str, key: &str) -> String {
    format!("{}{}{}", prefix, encode_name(key), ENTRY_EXTENSION)
}

/// Path to a cache entry inside `dir`.
pub fn entry_path(dir: &Path, prefix: &str, key: &str) -> PathBuf {
    dir.join(entry_file_name(prefix, key))
}

/// Recover the key from an entry file name, or `None` if the name
/// does not follow the `<prefix><key>.json` pattern.
pub fn entry_key(prefix: &str, file_name: &str) -> Option<String> {
    let encoded = file_name.strip_prefix(prefix)?.strip_suffix(ENTRY_EXTENSION)?;
    decode_name(encoded).filter(|key| !key.is_empty())
}

/// File name of a daily snapshot: `<channel>_<YYYY-MM-DD>.json`.
pub fn snapshot_file_name(channel_id: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}{}",
        encode_name(channel_id),
        date.format("%Y-%m-%d"),
        ENTRY_EXTENSION
    )
}

/// Parse the date out of a snapshot file name.
pub fn snapshot_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix(ENTRY_EXTENSION)?;
    let (channel, date) = stem.rsplit_once('_')?;
    if channel.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-')
}

/// Encode a name for use as a single path component.
/// Plain ids pass through unchanged; every other byte becomes `%XX`.
fn encode_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        if is_plain(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of `encode_name`. Rejects anything `encode_name` would not
/// have produced, so each file maps back to exactly one key.
fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    let name = String::from_utf8(decoded).ok()?;
    (encode_name(&name) == encoded).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_name() {
        assert_eq!(encode_name("UCabc-12_3"), "UCabc-12_3");
        assert_eq!(encode_name("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(encode_name("topic:cats"), "topic%3Acats");
        assert_eq!(encode_name("50%"), "50%25");
        assert_eq!(encode_name("café"), "caf%C3%A9");
    }

    #[test]
    fn test_distinct_keys_get_distinct_files() {
        let keys = ["topic:cats", "topic_cats", "topic%3Acats", "topic/cats"];
        let names: std::collections::HashSet<_> =
            keys.iter().map(|k| entry_file_name(DEFAULT_PREFIX, k)).collect();
        assert_eq!(names.len(), keys.len());

        for key in keys {
            let name = entry_file_name(DEFAULT_PREFIX, key);
            assert_eq!(entry_key(DEFAULT_PREFIX, &name).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_decode_rejects_non_canonical_names() {
        assert_eq!(decode_name("a%61"), None);
        assert_eq!(decode_name("a%3a"), None);
        assert_eq!(decode_name("bad%2"), None);
        assert_eq!(decode_name("bad%zz"), None);
        assert_eq!(decode_name("caf%C3"), None);
    }

    #[test]
    fn test_entry_paths() {
        let path = entry_path(Path::new("data/cache"), DEFAULT_PREFIX, "UCabc123");
        assert_eq!(path, PathBuf::from("data/cache/yt_analyzer_UCabc123.json"));
    }

    #[test]
    fn test_entry_key() {
        assert_eq!(
            entry_key(DEFAULT_PREFIX, "yt_analyzer_UCabc123.json").as_deref(),
            Some("UCabc123")
        );
        assert_eq!(entry_key(DEFAULT_PREFIX, "yt_analyzer_UCabc123.tmp"), None);
        assert_eq!(entry_key(DEFAULT_PREFIX, "other_UCabc123.json"), None);
        assert_eq!(entry_key(DEFAULT_PREFIX, "yt_analyzer_.json"), None);
    }

    #[test]
    fn test_snapshot_names() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let name = snapshot_file_name("UC_with_underscores", date);
        assert_eq!(name, "UC_with_underscores_2024-05-17.json");
        assert_eq!(snapshot_date(&name), Some(date));

        assert_eq!(snapshot_date("yt_analyzer_UCabc.json"), None);
        assert_eq!(snapshot_date("_2024-05-17.json"), None);
        assert_eq!(snapshot_date("notes.txt"), None);
    }
}
