pub mod toml_config;

pub use toml_config::{AppConfig, ConfigError, DEFAULT_CONFIG_PATH};
