//! Configuration data model and validation

use crate::eventlog::LogPaths;
use crate::types::{AppError, Result, TunnelId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest auto-test session accepted, one day
const MAX_AUTO_DURATION_SECS: f64 = 86_400.0;
/// Longest gap between probes accepted
const MAX_AUTO_INTERVAL_SECS: f64 = 3_600.0;
/// Longest read timeout accepted, one hour
const MAX_READ_TIMEOUT_MS: u64 = 3_600_000;
/// Longest settle delay after launching the test double
const MAX_STARTUP_DELAY_MS: u64 = 60_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the sent/recv/rtt logs
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Run the probe harness instead of the interactive dispatcher
    #[serde(default)]
    pub auto_test: bool,

    /// Wall-clock budget of an auto-test session, in seconds
    #[serde(default = "default_auto_duration_secs")]
    pub auto_duration_secs: f64,

    /// Delay between probe sends, in seconds
    #[serde(default = "default_auto_interval_secs")]
    pub auto_interval_secs: f64,

    /// Tunnel probed in auto-test mode
    #[serde(default = "default_auto_tunnel_id")]
    pub auto_tunnel_id: u32,

    /// Line written to the tunnel for every probe
    #[serde(default = "default_probe_directive")]
    pub probe_directive: String,

    /// Bound on `readline` and acknowledgement reads; unbounded when unset
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// Command line of the tunnel launched when auto-test finds none
    #[serde(default)]
    pub test_double_cmd: Option<String>,

    /// Settle delay after launching the test double, in milliseconds
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Sub-verbs of `tunnel ID ...` that launch a tunnel endpoint
    #[serde(default = "default_launchers")]
    pub launchers: Vec<String>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            auto_test: false,
            auto_duration_secs: default_auto_duration_secs(),
            auto_interval_secs: default_auto_interval_secs(),
            auto_tunnel_id: default_auto_tunnel_id(),
            probe_directive: default_probe_directive(),
            read_timeout_ms: None,
            test_double_cmd: None,
            startup_delay_ms: default_startup_delay_ms(),
            launchers: default_launchers(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Auto-test session budget as Duration
    pub fn auto_duration(&self) -> Duration {
        Duration::from_secs_f64(self.auto_duration_secs)
    }

    /// Probe interval as Duration
    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs_f64(self.auto_interval_secs)
    }

    /// Read timeout as Duration, if one is configured
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Settle delay after launching the test double
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Tunnel probed in auto-test mode
    pub fn auto_tunnel(&self) -> Result<TunnelId> {
        TunnelId::new(self.auto_tunnel_id)
            .ok_or_else(|| AppError::config("Auto-test tunnel id must be a positive integer"))
    }

    /// Locations of the three event logs
    pub fn log_paths(&self) -> LogPaths {
        LogPaths::in_dir(PathBuf::from(&self.log_dir))
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.log_dir.trim().is_empty() {
            return Err(AppError::config("Log directory cannot be empty"));
        }

        if !self.auto_duration_secs.is_finite() || self.auto_duration_secs <= 0.0 {
            return Err(AppError::config("Auto-test duration must be greater than 0"));
        }

        if self.auto_duration_secs > MAX_AUTO_DURATION_SECS {
            return Err(AppError::config("Auto-test duration cannot exceed 86400 seconds"));
        }

        if !self.auto_interval_secs.is_finite() || self.auto_interval_secs < 0.0 {
            return Err(AppError::config("Probe interval cannot be negative"));
        }

        if self.auto_interval_secs > MAX_AUTO_INTERVAL_SECS {
            return Err(AppError::config("Probe interval cannot exceed 3600 seconds"));
        }

        self.auto_tunnel()?;

        if self.probe_directive.trim().is_empty() {
            return Err(AppError::config("Probe directive cannot be empty"));
        }

        if self.probe_directive.contains('\n') || self.probe_directive.contains('\r') {
            return Err(AppError::config("Probe directive must be a single line"));
        }

        if let Some(timeout) = self.read_timeout_ms {
            if timeout == 0 {
                return Err(AppError::config("Read timeout must be greater than 0"));
            }
            if timeout > MAX_READ_TIMEOUT_MS {
                return Err(AppError::config("Read timeout cannot exceed 3600000 ms"));
            }
        }

        if let Some(cmd) = &self.test_double_cmd {
            if cmd.trim().is_empty() {
                return Err(AppError::config("Test double command cannot be empty"));
            }
        }

        if self.startup_delay_ms > MAX_STARTUP_DELAY_MS {
            return Err(AppError::config("Startup delay cannot exceed 60000 ms"));
        }

        if self.launchers.is_empty() {
            return Err(AppError::config("At least one tunnel launcher must be configured"));
        }

        for launcher in &self.launchers {
            if launcher.is_empty() || launcher.chars().any(char::is_whitespace) {
                return Err(AppError::config(format!("Invalid tunnel launcher name: '{}'", launcher)));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(log_dir) = std::env::var("TUNNEL_LOG_DIR") {
            self.log_dir = log_dir.trim().to_string();
        }

        if let Ok(duration) = std::env::var("AUTO_TEST_DURATION") {
            self.auto_duration_secs = duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_DURATION value '{}': {}", duration, e)))?;
        }

        if let Ok(interval) = std::env::var("AUTO_TEST_INTERVAL") {
            self.auto_interval_secs = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_INTERVAL value '{}': {}", interval, e)))?;
        }

        if let Ok(tunnel_id) = std::env::var("AUTO_TEST_TUNNEL_ID") {
            self.auto_tunnel_id = tunnel_id.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid AUTO_TEST_TUNNEL_ID value '{}': {}", tunnel_id, e)))?;
        }

        if let Ok(directive) = std::env::var("PROBE_DIRECTIVE") {
            self.probe_directive = directive;
        }

        if let Ok(timeout) = std::env::var("READ_TIMEOUT_MS") {
            self.read_timeout_ms = Some(timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid READ_TIMEOUT_MS value '{}': {}", timeout, e)))?);
        }

        if let Ok(cmd) = std::env::var("TEST_DOUBLE_CMD") {
            self.test_double_cmd = Some(cmd);
        }

        if let Ok(delay) = std::env::var("STARTUP_DELAY_MS") {
            self.startup_delay_ms = delay.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid STARTUP_DELAY_MS value '{}': {}", delay, e)))?;
        }

        if let Ok(launchers) = std::env::var("TUNNEL_LAUNCHERS") {
            self.launchers = launchers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_log_dir() -> String {
    crate::defaults::DEFAULT_LOG_DIR.to_string()
}

fn default_auto_duration_secs() -> f64 {
    crate::defaults::DEFAULT_AUTO_DURATION_SECS
}

fn default_auto_interval_secs() -> f64 {
    crate::defaults::DEFAULT_AUTO_INTERVAL_SECS
}

fn default_auto_tunnel_id() -> u32 {
    crate::defaults::DEFAULT_AUTO_TUNNEL_ID
}

fn default_probe_directive() -> String {
    crate::defaults::DEFAULT_PROBE_DIRECTIVE.to_string()
}

fn default_startup_delay_ms() -> u64 {
    crate::defaults::DEFAULT_STARTUP_DELAY_MS
}

fn default_launchers() -> Vec<String> {
    crate::defaults::DEFAULT_LAUNCHERS
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auto_duration(), Duration::from_secs(60));
        assert_eq!(config.auto_interval(), Duration::from_millis(100));
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_zero_interval_is_valid() {
        let mut config = Config::default();
        config.auto_interval_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_duration_invalid() {
        let mut config = Config::default();
        config.auto_duration_secs = 0.0;
        assert!(config.validate().is_err());

        config.auto_duration_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_interval_invalid() {
        let mut config = Config::default();
        config.auto_interval_secs = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tunnel_id_invalid() {
        let mut config = Config::default();
        config.auto_tunnel_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiline_directive_invalid() {
        let mut config = Config::default();
        config.probe_directive = "send_packet\nhalt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_read_timeout_invalid() {
        let mut config = Config::default();
        config.read_timeout_ms = Some(0);
        assert!(config.validate().is_err());

        config.read_timeout_ms = Some(250);
        assert!(config.validate().is_ok());
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_launcher_names_validated() {
        let mut config = Config::default();
        config.launchers = vec![];
        assert!(config.validate().is_err());

        config.launchers = vec!["mm tunnel".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_paths_follow_log_dir() {
        let mut config = Config::default();
        config.log_dir = "/tmp/run-7".to_string();

        let paths = config.log_paths();
        assert_eq!(paths.sent, PathBuf::from("/tmp/run-7/sent.log"));
        assert_eq!(paths.recv, PathBuf::from("/tmp/run-7/recv.log"));
        assert_eq!(paths.rtt, PathBuf::from("/tmp/run-7/rttevents.log"));
    }
}
