//! Path utilities for gram-replay data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Call before any other path function; later calls are ignored.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        tracing::debug!(path = %path.display(), "Data directory already initialized");
    }
}

/// Default data directory (~/.gram-replay)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".gram-replay"))
        .unwrap_or_else(|| PathBuf::from(".gram-replay"))
}

/// Base data directory: the custom path if one was set, otherwise ~/.gram-replay
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Config file path (~/.gram-replay/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Logs directory (~/.gram-replay/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default log file path (~/.gram-replay/logs/gram-replay.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("gram-replay.log")
}
