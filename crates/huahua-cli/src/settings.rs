//! Operator settings: defaults, then an optional TOML file, then `HUAHUA_*` environment variables.

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "huahua.toml";
pub const ENV_PREFIX: &str = "HUAHUA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// tracing filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    pub output: OutputFormat,
    pub chain_id: String,
}

impl Settings {
    /// Load settings. A missing default file is fine; an explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Config::builder()
            .set_default("log_filter", "info")?
            .set_default("output", "text")?
            .set_default("chain_id", "chihuahua-1")?
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
