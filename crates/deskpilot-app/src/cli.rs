//! CLI argument definitions for the Deskpilot daemon.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use deskpilot_core::config::DeskpilotConfig;
use std::path::PathBuf;

/// Deskpilot: remote desktop automation with an action gateway and a task scheduler.
#[derive(Parser, Debug)]
#[command(name = "deskpilot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// API server bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Do not start the task scheduler.
    #[arg(long = "no-scheduler")]
    pub no_scheduler: bool,

    /// Do not start the automation worker. Actions stay queued and the task
    /// scheduler is disabled as well.
    #[arg(long = "no-worker")]
    pub no_worker: bool,

    /// Write the resolved configuration to the config path and exit.
    #[arg(long = "init-config")]
    pub init_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DESKPILOT_CONFIG env var > ~/.deskpilot/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DESKPILOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > DESKPILOT_PORT env var > config file value > 9990.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, std::env::var("DESKPILOT_PORT").ok())
    }

    fn resolve_port_with(&self, config_port: u16, env_port: Option<String>) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env_port.and_then(|val| val.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        9990
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` still wins
    /// over both when the subscriber is built.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply host, port, and component switches on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut DeskpilotConfig) {
        config.general.port = self.resolve_port(config.general.port);
        if let Some(host) = &self.host {
            config.general.host = host.clone();
        }
        if self.no_scheduler {
            config.scheduler.enabled = false;
        }
        if self.no_worker {
            config.dispatch.worker_enabled = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".deskpilot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".deskpilot").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("deskpilot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flag_port_wins() {
        let args = parse(&["--port", "8000"]);
        assert_eq!(args.resolve_port_with(9000, Some("7000".to_string())), 8000);
    }

    #[test]
    fn test_env_port_beats_config() {
        let args = parse(&[]);
        assert_eq!(args.resolve_port_with(9000, Some("7000".to_string())), 7000);
    }

    #[test]
    fn test_bad_env_port_falls_back_to_config() {
        let args = parse(&[]);
        assert_eq!(args.resolve_port_with(9000, Some("http".to_string())), 9000);
        assert_eq!(args.resolve_port_with(0, None), 9990);
    }

    #[test]
    fn test_config_flag_wins() {
        let args = parse(&["-c", "/tmp/deskpilot.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/deskpilot.toml"));
    }

    #[test]
    fn test_log_level_resolution() {
        assert_eq!(parse(&[]).resolve_log_level("warn"), "warn");
        assert_eq!(parse(&["-l", "debug"]).resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_component_switches() {
        let args = parse(&["--no-scheduler", "--no-worker"]);
        assert!(args.no_scheduler);
        assert!(args.no_worker);
        assert!(!args.init_config);
    }

    #[test]
    fn test_no_worker_leaves_scheduler_to_be_disabled() {
        let mut config = DeskpilotConfig::default();
        parse(&["--no-worker", "--host", "0.0.0.0", "-p", "8123"]).apply_overrides(&mut config);
        assert!(!config.dispatch.worker_enabled);
        assert_eq!(config.general.host, "0.0.0.0");
        assert_eq!(config.general.port, 8123);

        assert!(config.disable_scheduler_without_worker());
        assert!(!config.scheduler.enabled);
    }
}
