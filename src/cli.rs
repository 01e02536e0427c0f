//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments are parsed with `clap` and then merged on top of the file and
//! environment configuration, so anything given here wins.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Exports `conntrack --stats` counters for Prometheus.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to serve metrics on.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// Path under which metrics are served.
    #[arg(long, value_name = "PATH")]
    pub metrics_path: Option<String>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to the conntrack binary.
    #[arg(long, value_name = "PATH")]
    pub conntrack_path: Option<String>,

    /// Argument passed to the conntrack binary; repeat for several. Replaces
    /// the configured arguments when given.
    #[arg(long = "conntrack-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub conntrack_args: Vec<String>,

    /// Deadline for one conntrack invocation in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut server = Dict::new();
        if let Some(addr) = self.listen_address {
            server.insert("listen_address".into(), Value::from(addr.to_string()));
        }
        if let Some(path) = &self.metrics_path {
            server.insert("metrics_path".into(), Value::from(path.clone()));
        }
        if !server.is_empty() {
            dict.insert("server".into(), Value::from(server));
        }

        let mut command = Dict::new();
        if let Some(program) = &self.conntrack_path {
            command.insert("program".into(), Value::from(program.clone()));
        }
        if !self.conntrack_args.is_empty() {
            command.insert("args".into(), Value::from(self.conntrack_args.clone()));
        }
        if let Some(timeout) = self.timeout_ms {
            command.insert("timeout_ms".into(), Value::from(timeout));
        }
        if !command.is_empty() {
            dict.insert("command".into(), Value::from(command));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
