//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists.
    ///
    /// Variables already set in the process environment win over the file.
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Tunnel Manager Configuration
#
# Values here are used as defaults. Variables already exported in the shell
# take precedence, and command-line flags override both.

# Directory for sent.log, recv.log and rttevents.log
# TUNNEL_LOG_DIR=experiment_logs

# Auto-test session length and probe spacing, in seconds
# AUTO_TEST_DURATION=60
# AUTO_TEST_INTERVAL=0.1

# Tunnel probed in auto-test mode
# AUTO_TEST_TUNNEL_ID=1

# Line written to the tunnel for every probe
# PROBE_DIRECTIVE=send_packet

# Bound on readline and acknowledgement reads in milliseconds (unset: wait forever)
# READ_TIMEOUT_MS=5000

# Tunnel launched when auto-test finds none registered
# TEST_DOUBLE_CMD=dummy-tunnel --delay-ms 200
# STARTUP_DELAY_MS=1000

# Sub-verbs of "tunnel ID ..." that launch a tunnel endpoint (comma-separated)
# TUNNEL_LAUNCHERS=mm-tunnelclient,mm-tunnelserver

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "TUNNEL_LOG_DIR" => {
                if value.is_empty() {
                    return Err(AppError::config("TUNNEL_LOG_DIR cannot be empty"));
                }
            }
            "AUTO_TEST_DURATION" => {
                let secs: f64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_DURATION value '{}': {}", value, e)))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(AppError::config(format!("AUTO_TEST_DURATION must be positive, got: {}", value)));
                }
            }
            "AUTO_TEST_INTERVAL" => {
                let secs: f64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_INTERVAL value '{}': {}", value, e)))?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(AppError::config(format!("AUTO_TEST_INTERVAL cannot be negative, got: {}", value)));
                }
            }
            "AUTO_TEST_TUNNEL_ID" => {
                let id: u32 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_TUNNEL_ID value '{}': {}", value, e)))?;
                if id == 0 {
                    return Err(AppError::config("AUTO_TEST_TUNNEL_ID must be a positive integer"));
                }
            }
            "READ_TIMEOUT_MS" | "STARTUP_DELAY_MS" => {
                value
                    .parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "PROBE_DIRECTIVE" | "TEST_DOUBLE_CMD" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "TUNNEL_LAUNCHERS" => {
                if value.split(',').all(|s| s.trim().is_empty()) {
                    return Err(AppError::config("TUNNEL_LAUNCHERS must name at least one launcher"));
                }
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TUNNEL_LOG_DIR", "Directory for the sent/recv/rtt event logs", "experiment_logs"),
            ("AUTO_TEST_DURATION", "Auto-test session length in seconds", "60"),
            ("AUTO_TEST_INTERVAL", "Seconds between probe packets", "0.1"),
            ("AUTO_TEST_TUNNEL_ID", "Tunnel probed in auto-test mode", "1"),
            ("PROBE_DIRECTIVE", "Line written to the tunnel for every probe", "send_packet"),
            ("READ_TIMEOUT_MS", "Bound on readline and ack reads in milliseconds", "5000"),
            ("TEST_DOUBLE_CMD", "Tunnel launched when auto-test finds none", "dummy-tunnel --delay-ms 200"),
            ("STARTUP_DELAY_MS", "Settle delay after launching the test double", "1000"),
            ("TUNNEL_LAUNCHERS", "Comma-separated launcher sub-verbs", "mm-tunnelclient,mm-tunnelserver"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<20} {}\n", var, description));
            help.push_str(&format!("  {:<20} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Warnings for malformed values among `pairs`
    pub fn validate_pairs<'a, I>(pairs: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .filter_map(|(key, value)| Self::validate_env_var(key, value).err())
            .map(|e| format!("Warning: {}", e))
            .collect()
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let set: Vec<(&str, String)> = Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| std::env::var(name).ok().map(|v| (name, v)))
            .collect();
        Self::validate_pairs(set.iter().map(|(k, v)| (*k, v.as_str())))
    }

    /// Check a .env file and validate its contents; `None` when absent
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}
