//! Configuration management for the exporter
//!
//! This module defines the main `Config` struct and its sub-structs. Values
//! are layered with `figment`: built-in defaults, then an optional TOML file,
//! then `CONNTRACK_EXPORTER_`-prefixed environment variables, then
//! command-line arguments.

use crate::cli::Cli;
use crate::invoker::DEFAULT_TIMEOUT;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Prefix for environment overrides, e.g. `CONNTRACK_EXPORTER_COMMAND__TIMEOUT_MS=2000`.
pub const ENV_PREFIX: &str = "CONNTRACK_EXPORTER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Configuration for the scrape endpoint.
    pub server: ServerConfig,
    /// Configuration for the stats command.
    pub command: CommandConfig,
}

/// Configuration for the scrape endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address the HTTP server binds to.
    pub listen_address: SocketAddr,
    /// The path metrics are served under.
    pub metrics_path: String,
}

/// Configuration for the stats command.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CommandConfig {
    /// The program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// How long a single run may take before it is abandoned.
    pub timeout_ms: u64,
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Loads configuration from every source, with `cli` taking precedence.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::figment(cli.config.as_deref())?
            .merge(cli.clone())
            .extract::<Config>()?
            .validated()
    }

    /// Loads configuration from defaults, an optional file and the environment.
    pub fn load_from_file(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(config_path)?.extract::<Config>()?.validated()
    }

    fn figment(config_path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(ConfigError::Invalid(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.command.program.trim().is_empty() {
            return Err(ConfigError::Invalid("command.program must not be empty".into()));
        }
        if self.command.timeout_ms == 0 {
            return Err(ConfigError::Invalid("command.timeout_ms must be positive".into()));
        }
        if !self.server.metrics_path.starts_with('/') || self.server.metrics_path == "/" {
            return Err(ConfigError::Invalid(format!(
                "server.metrics_path must be an absolute path other than '/', got {:?}",
                self.server.metrics_path
            )));
        }
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 9371)),
                metrics_path: "/metrics".to_string(),
            },
            command: CommandConfig {
                program: "conntrack".to_string(),
                args: vec!["--stats".to_string()],
                timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            },
        }
    }
}
