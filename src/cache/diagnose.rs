// Cache directory diagnostics.
// Verifies the data and cache directories exist and accept writes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

/// Health of one directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatus {
    pub path: PathBuf,
    /// Whether the directory was missing and got created now.
    pub created: bool,
    pub exists: bool,
    /// Unix permission bits as octal text, when available.
    pub mode: Option<String>,
    pub error: Option<String>,
}

/// Result of a full diagnostic pass.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub data_dir: DirectoryStatus,
    pub cache_dir: DirectoryStatus,
    /// Whether a probe file could be written and removed in the cache directory.
    pub writable: bool,
    pub write_error: Option<String>,
}

impl DiagnosticReport {
    pub fn is_healthy(&self) -> bool {
        self.data_dir.exists && self.cache_dir.exists && self.writable
    }
}

fn check_directory(path: &Path) -> DirectoryStatus {
    let mut status = DirectoryStatus {
        path: path.to_path_buf(),
        created: false,
        exists: path.is_dir(),
        mode: None,
        error: None,
    };

    if !status.exists {
        match fs::create_dir_all(path) {
            Ok(()) => {
                info!(path = %path.display(), "created directory");
                status.created = true;
                status.exists = true;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error creating directory");
                status.error = Some(e.to_string());
            }
        }
    }

    if status.exists {
        status.mode = permission_mode(path);
    }
    status
}

#[cfg(unix)]
fn permission_mode(path: &Path) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .ok()
        .map(|m| format!("{:o}", m.permissions().mode()))
}

#[cfg(not(unix))]
fn permission_mode(_path: &Path) -> Option<String> {
    None
}

fn probe_write(dir: &Path) -> Result<(), String> {
    let probe = dir.join("test.json");
    fs::write(&probe, serde_json::json!({"test": "data"}).to_string()).map_err(|e| e.to_string())?;
    fs::remove_file(&probe).map_err(|e| e.to_string())
}

/// Check `data_dir` and `cache_dir`, creating them if needed, and probe
/// that the cache directory accepts a write.
pub fn diagnose(data_dir: &Path, cache_dir: &Path) -> DiagnosticReport {
    let data_dir = check_directory(data_dir);
    let cache_dir = check_directory(cache_dir);

    let (writable, write_error) = if cache_dir.exists {
        match probe_write(&cache_dir.path) {
            Ok(()) => (true, None),
            Err(e) => {
                warn!(error = %e, "cache directory is not writable");
                (false, Some(e))
            }
        }
    } else {
        (false, Some("cache directory does not exist".to_string()))
    };

    DiagnosticReport {
        data_dir,
        cache_dir,
        writable,
        write_error,
    }
}
