use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::agents::AgentsConfig;
use crate::replay::ReplayOptions;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Replay pacing
    pub replay: ReplayOptions,
    /// Sub-agent tree behaviour
    pub agents: AgentsConfig,
}

/// TOML representation of the `[replay]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlReplayConfig {
    pub typing_speed_ms: Option<u64>,
    pub user_message_delay_ms: Option<u64>,
    pub assistant_start_delay_ms: Option<u64>,
    pub tool_result_delay_ms: Option<u64>,
}

/// TOML representation of the `[agents]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAgentsConfig {
    pub auto_expand_sub_agents: Option<bool>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub replay: Option<TomlReplayConfig>,
    pub agents: Option<TomlAgentsConfig>,
}

impl Config {
    /// Load `~/.gram-replay/config.toml`, writing the example file on first
    /// run. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
            return Ok(Config::default());
        }

        Self::load_from_path(&config_file)
    }

    /// Load a specific config file; the file must exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Overlay TOML settings onto the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config = toml::from_str::<TomlConfig>(contents)?;
        let mut config = Config::default();

        if let Some(replay) = toml_config.replay {
            if let Some(ms) = replay.typing_speed_ms {
                config.replay.typing_speed = Duration::from_millis(ms);
            }
            if let Some(ms) = replay.user_message_delay_ms {
                config.replay.user_message_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = replay.assistant_start_delay_ms {
                config.replay.assistant_start_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = replay.tool_result_delay_ms {
                config.replay.tool_result_delay = Duration::from_millis(ms);
            }
        }

        if let Some(agents) = toml_config.agents {
            if let Some(auto_expand) = agents.auto_expand_sub_agents {
                config.agents.auto_expand_sub_agents = auto_expand;
            }
        }

        Ok(config)
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create config directory");
                return;
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write default config");
        }
    }
}
