//! Configuration management

use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Reference resolved when Init names no handler, or Invoke runs first
    #[serde(default = "default_handler")]
    pub default_handler: String,

    /// Request body cap in bytes; unset accepts any size
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_handler: default_handler(),
            max_body_bytes: None,
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_handler() -> String {
    fnstack_sample::DEFAULT_HANDLER.to_string()
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path, `fnstack.{toml,json,yaml}` in the working
    /// directory is read when present. `FNSTACK_SERVER__PORT` style variables
    /// override file values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("fnstack").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("FNSTACK").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
