mod settings;

pub use settings::{
    Config, ConfigError, TomlAgentsConfig, TomlConfig, TomlReplayConfig, EXAMPLE_CONFIG,
};
