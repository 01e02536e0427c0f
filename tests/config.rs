use clap::Parser;
use conntrack_stats_exporter::cli::Cli;
use conntrack_stats_exporter::config::{Config, ConfigError};
use serial_test::serial;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    let path = file.path().to_path_buf();
    test_fn(path);
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    let cli = Cli::try_parse_from(["conntrack-stats-exporter"]).unwrap();
    let config = Config::load(&cli).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [server]
        listen_address = "127.0.0.1:9999"
        metrics_path = "/stats"
        [command]
        program = "/usr/sbin/conntrack"
        args = ["--stats", "--verbose"]
        timeout_ms = 2500
    "#;

    with_config_file(toml_content, |path| {
        let config = Config::load_from_file(Some(path.as_path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.listen_address, "127.0.0.1:9999".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.metrics_path, "/stats");
        assert_eq!(config.command.program, "/usr/sbin/conntrack");
        assert_eq!(config.command.args, vec!["--stats", "--verbose"]);
        assert_eq!(config.command.timeout_ms, 2500);
    });
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    with_config_file("[command]\ntimeout_ms = 100\n", |path| {
        let config = Config::load_from_file(Some(path.as_path())).unwrap();
        assert_eq!(config.command.timeout_ms, 100);
        assert_eq!(config.command.program, "conntrack");
        assert_eq!(config.server.metrics_path, "/metrics");
    });
}

#[test]
#[serial]
fn test_cli_overrides_file() {
    with_config_file("[command]\ntimeout_ms = 100\nprogram = \"ct\"\n", |path| {
        let cli = Cli::try_parse_from([
            "conntrack-stats-exporter",
            "--config",
            path.to_str().unwrap(),
            "--timeout-ms",
            "750",
            "--listen-address",
            "127.0.0.1:1234",
            "--log-level",
            "trace",
        ])
        .unwrap();
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.command.timeout_ms, 750);
        assert_eq!(config.command.program, "ct");
        assert_eq!(config.server.listen_address, "127.0.0.1:1234".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, "trace");
    });
}

#[test]
#[serial]
fn test_repeated_conntrack_arg_replaces_configured_args() {
    with_config_file("[command]\nargs = [\"--stats\"]\n", |path| {
        let cli = Cli::try_parse_from([
            "conntrack-stats-exporter",
            "--config",
            path.to_str().unwrap(),
            "--conntrack-arg",
            "-S",
            "--conntrack-arg",
            "--verbose",
        ])
        .unwrap();
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.command.args, vec!["-S", "--verbose"]);
    });

    let cli = Cli::try_parse_from(["conntrack-stats-exporter"]).unwrap();
    assert!(cli.conntrack_args.is_empty());
    assert_eq!(Config::load(&cli).unwrap().command.args, vec!["--stats"]);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    with_config_file("[command]\ntimeout_ms = 100\n", |path| {
        std::env::set_var("CONNTRACK_EXPORTER_COMMAND__TIMEOUT_MS", "4000");
        std::env::set_var("CONNTRACK_EXPORTER_SERVER__METRICS_PATH", "/conntrack");
        let result = Config::load_from_file(Some(path.as_path()));
        std::env::remove_var("CONNTRACK_EXPORTER_COMMAND__TIMEOUT_MS");
        std::env::remove_var("CONNTRACK_EXPORTER_SERVER__METRICS_PATH");

        let config = result.unwrap();
        assert_eq!(config.command.timeout_ms, 4000);
        assert_eq!(config.server.metrics_path, "/conntrack");
    });
}

#[test]
#[serial]
fn test_missing_config_file_is_an_error() {
    let result = Config::load_from_file(Some(Path::new("/nonexistent/exporter.toml")));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    with_config_file("[command]\ntimeout_ms = 0\n", |path| {
        assert!(Config::load_from_file(Some(path.as_path())).is_err());
    });
    with_config_file("[server]\nlisten_address = \"not an address\"\n", |path| {
        assert!(matches!(
            Config::load_from_file(Some(path.as_path())),
            Err(ConfigError::Figment(_))
        ));
    });
}
