//! Additional comprehensive tests for configuration layering and validation

use super::{ConfigParser, EnvManager, ENV_LOCK};
use crate::{cli::Cli, models::Config};
use clap::Parser;
use std::env;
use tempfile::TempDir;

const ALL_VARS: &[&str] = &[
    "TUNNEL_LOG_DIR",
    "AUTO_TEST_DURATION",
    "AUTO_TEST_INTERVAL",
    "AUTO_TEST_TUNNEL_ID",
    "PROBE_DIRECTIVE",
    "READ_TIMEOUT_MS",
    "TEST_DOUBLE_CMD",
    "STARTUP_DELAY_MS",
    "TUNNEL_LAUNCHERS",
    "ENABLE_COLOR",
];

/// Holds the environment lock and clears every config variable on both ends
struct CleanEnv {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl CleanEnv {
    fn new() -> Self {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for var in ALL_VARS {
            env::remove_var(var);
        }
        Self { _guard: guard }
    }
}

impl Drop for CleanEnv {
    fn drop(&mut self) {
        for var in ALL_VARS {
            env::remove_var(var);
        }
    }
}

/// Environment merging
mod env_merge_tests {
    use super::*;

    #[test]
    fn test_merge_reads_every_variable() {
        let _env = CleanEnv::new();
        env::set_var("TUNNEL_LOG_DIR", " /var/tmp/runs ");
        env::set_var("AUTO_TEST_DURATION", "5");
        env::set_var("AUTO_TEST_INTERVAL", "0.25");
        env::set_var("AUTO_TEST_TUNNEL_ID", "2");
        env::set_var("PROBE_DIRECTIVE", "ping");
        env::set_var("READ_TIMEOUT_MS", "750");
        env::set_var("TEST_DOUBLE_CMD", "cat");
        env::set_var("STARTUP_DELAY_MS", "0");
        env::set_var("TUNNEL_LAUNCHERS", "mm-a, ,mm-b");
        env::set_var("ENABLE_COLOR", "false");

        let mut config = Config::default();
        config.merge_from_env().unwrap();

        assert_eq!(config.log_dir, "/var/tmp/runs");
        assert_eq!(config.auto_duration_secs, 5.0);
        assert_eq!(config.auto_interval_secs, 0.25);
        assert_eq!(config.auto_tunnel_id, 2);
        assert_eq!(config.probe_directive, "ping");
        assert_eq!(config.read_timeout_ms, Some(750));
        assert_eq!(config.test_double_cmd.as_deref(), Some("cat"));
        assert_eq!(config.startup_delay_ms, 0);
        assert_eq!(config.launchers, vec!["mm-a".to_string(), "mm-b".to_string()]);
        assert!(!config.enable_color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_variable_is_config_error() {
        let _env = CleanEnv::new();
        env::set_var("AUTO_TEST_DURATION", "a minute");

        let mut config = Config::default();
        let err = config.merge_from_env().unwrap_err();
        assert_eq!(err.category(), "CONFIG");
        assert!(err.to_string().contains("AUTO_TEST_DURATION"));
        assert_eq!(err.exit_code(), 1);
    }
}

/// Layer precedence: defaults < .env < environment < CLI
mod precedence_tests {
    use super::*;

    #[test]
    fn test_env_file_environment_and_cli_layers() {
        let _env = CleanEnv::new();
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(
            &env_file,
            "AUTO_TEST_DURATION=30\nAUTO_TEST_INTERVAL=0.5\nPROBE_DIRECTIVE=from_file\n",
        )
        .unwrap();

        // Already exported: wins over the file.
        env::set_var("AUTO_TEST_INTERVAL", "0.2");

        let cli = Cli::parse_from(["t", "--auto-test", "--directive", "from_cli"]);
        let config = ConfigParser::new(cli).with_env_file(&env_file).parse().unwrap();

        assert_eq!(config.auto_duration_secs, 30.0); // .env
        assert_eq!(config.auto_interval_secs, 0.2); // environment
        assert_eq!(config.probe_directive, "from_cli"); // CLI
        assert_eq!(config.auto_tunnel_id, 1); // default
    }

    #[test]
    fn test_invalid_final_config_rejected() {
        let _env = CleanEnv::new();
        let dir = TempDir::new().unwrap();
        env::set_var("TUNNEL_LAUNCHERS", ",");

        let result = ConfigParser::new(Cli::parse_from(["t"]))
            .with_env_file(dir.path().join("absent.env"))
            .parse();
        assert!(result.is_err());
    }
}

/// Validation edge cases
mod validation_edge_cases {
    use super::*;

    #[test]
    fn test_boundary_durations() {
        let mut config = Config::default();
        config.auto_duration_secs = 86_400.0;
        assert!(config.validate().is_ok());

        config.auto_duration_secs = 86_400.5;
        assert!(config.validate().is_err());

        config.auto_duration_secs = 0.001;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_boundary_startup_delay() {
        let mut config = Config::default();
        config.startup_delay_ms = 60_000;
        assert!(config.validate().is_ok());
        config.startup_delay_ms = 60_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_file_warnings_match_validator() {
        for (name, _, example) in EnvManager::get_supported_env_vars() {
            assert!(
                EnvManager::validate_env_var(name, example).is_ok(),
                "documented example for {} must validate",
                name
            );
        }
    }

    #[test]
    fn test_config_serializes_round_trip() {
        let mut config = Config::default();
        config.read_timeout_ms = Some(40);
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.read_timeout_ms, Some(40));
        assert_eq!(back.launchers, config.launchers);

        // Missing fields fall back to defaults.
        let sparse: Config = serde_json::from_str("{\"auto_test\": true}").unwrap();
        assert!(sparse.auto_test);
        assert_eq!(sparse.probe_directive, "send_packet");
    }
}
