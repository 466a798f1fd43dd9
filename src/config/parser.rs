//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};
use std::path::PathBuf;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read the dotenv file from `path` instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration.
    ///
    /// Precedence, lowest first: defaults, `.env`, process environment, CLI.
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        config.auto_test = cli.auto_test;
        if let Some(duration) = cli.duration {
            config.auto_duration_secs = duration;
        }
        if let Some(interval) = cli.interval {
            config.auto_interval_secs = interval;
        }
        if let Some(id) = cli.tunnel_id {
            config.auto_tunnel_id = id;
        }
        if let Some(dir) = &cli.log_dir {
            config.log_dir = dir.clone();
        }
        if let Some(ms) = cli.read_timeout_ms {
            config.read_timeout_ms = Some(ms);
        }
        if let Some(cmd) = &cli.test_double {
            config.test_double_cmd = Some(cmd.clone());
        }
        if let Some(directive) = &cli.directive {
            config.probe_directive = directive.clone();
        }
        if let Some(color) = cli.color_override() {
            config.enable_color = color;
        }

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: auto_test={}, duration={}s, interval={}s, log_dir={}",
                config.auto_test, config.auto_duration_secs, config.auto_interval_secs, config.log_dir
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Mode: {}", if config.auto_test { "auto-test" } else { "interactive" }));
    summary.push(format!("Log Directory: {}", config.log_dir));
    summary.push(format!("Duration: {}s", config.auto_duration_secs));
    summary.push(format!("Interval: {}s", config.auto_interval_secs));
    summary.push(format!("Tunnel Id: {}", config.auto_tunnel_id));
    summary.push(format!("Probe Directive: {}", config.probe_directive));
    summary.push(format!(
        "Read Timeout: {}",
        config
            .read_timeout_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "none".to_string())
    ));
    summary.push(format!(
        "Test Double: {}",
        config.test_double_cmd.as_deref().unwrap_or(crate::defaults::TEST_DOUBLE_BIN)
    ));
    summary.push(format!("Launchers: {}", config.launchers.join(", ")));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn overridden(args: &[&str]) -> Config {
        let parser = ConfigParser::new(Cli::parse_from(args));
        let mut config = Config::default();
        parser.apply_cli_overrides(&mut config);
        config
    }

    #[test]
    fn test_no_flags_keeps_defaults() {
        let config = overridden(&["t"]);
        let defaults = Config::default();

        assert!(!config.auto_test);
        assert_eq!(config.auto_duration_secs, defaults.auto_duration_secs);
        assert_eq!(config.auto_interval_secs, defaults.auto_interval_secs);
        assert_eq!(config.log_dir, defaults.log_dir);
        assert_eq!(config.enable_color, defaults.enable_color);
        assert!(config.read_timeout_ms.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = overridden(&[
            "t",
            "--auto-test",
            "--duration", "3",
            "--interval", "0",
            "--tunnel-id", "9",
            "--log-dir", "/tmp/x",
            "--read-timeout-ms", "100",
            "--test-double", "cat",
            "--directive", "ping",
            "--no-color",
            "--verbose",
        ]);

        assert!(config.auto_test);
        assert_eq!(config.auto_duration_secs, 3.0);
        assert_eq!(config.auto_interval_secs, 0.0);
        assert_eq!(config.auto_tunnel_id, 9);
        assert_eq!(config.log_dir, "/tmp/x");
        assert_eq!(config.read_timeout_ms, Some(100));
        assert_eq!(config.test_double_cmd.as_deref(), Some("cat"));
        assert_eq!(config.probe_directive, "ping");
        assert!(!config.enable_color);
        assert!(config.verbose);
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_environment_values() {
        let parser = ConfigParser::new(Cli::parse_from(["t", "--auto-test", "--duration", "12"]));
        let mut config = Config::default();
        // As if AUTO_TEST_DURATION=8 had been merged
        config.auto_duration_secs = 8.0;
        config.auto_interval_secs = 0.5;

        parser.apply_cli_overrides(&mut config);
        assert_eq!(config.auto_duration_secs, 12.0);
        assert_eq!(config.auto_interval_secs, 0.5);
    }

    #[test]
    fn test_parse_with_missing_env_file() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().unwrap();

        let config = ConfigParser::new(Cli::parse_from(["t", "--log-dir", "logs-here"]))
            .with_env_file(dir.path().join(".env"))
            .parse()
            .unwrap();
        assert_eq!(config.log_dir, "logs-here");
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());

        assert!(summary.contains("Mode: interactive"));
        assert!(summary.contains("Log Directory: experiment_logs"));
        assert!(summary.contains("Read Timeout: none"));
        assert!(summary.contains("Test Double: dummy-tunnel"));
        assert!(summary.contains("Launchers: mm-tunnelclient, mm-tunnelserver"));
    }
}
