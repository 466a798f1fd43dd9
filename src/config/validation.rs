//! Configuration validation utilities and rules

use crate::{
    error::{AppError, Result},
    models::Config,
};
use colored::*;
use std::path::Path;

/// Probe count above which the event logs get large
const LARGE_SESSION_PROBES: f64 = 100_000.0;
/// Read timeouts below this are shorter than a typical emulated RTT
const SHORT_READ_TIMEOUT_MS: u64 = 50;

/// Configuration validator with advanced validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration with comprehensive checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        config.validate()?;

        warnings.extend(Self::validate_log_dir(Path::new(&config.log_dir))?);
        warnings.extend(Self::validate_probe_settings(config));
        warnings.extend(Self::validate_read_timeout(config));

        Ok(warnings)
    }

    /// The log directory may be missing (it is created) but must not be a file
    fn validate_log_dir(dir: &Path) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        if dir.exists() {
            if !dir.is_dir() {
                return Err(AppError::config(format!(
                    "Log directory '{}' exists and is not a directory",
                    dir.display()
                )));
            }
            let has_logs = [
                crate::defaults::SENT_LOG_NAME,
                crate::defaults::RECV_LOG_NAME,
                crate::defaults::RTT_LOG_NAME,
            ]
            .iter()
            .any(|name| dir.join(name).exists());
            if has_logs {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Appending to existing event logs in '{}'", dir.display()),
                ));
            }
        } else {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Log directory '{}' will be created", dir.display()),
            ));
        }

        Ok(warnings)
    }

    /// Validate auto-test pacing
    fn validate_probe_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        if !config.auto_test {
            return warnings;
        }

        if config.auto_interval_secs == 0.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Probe interval is 0: packets are sent back to back".to_string(),
            ));
        } else {
            let expected = config.auto_duration_secs / config.auto_interval_secs;
            if expected > LARGE_SESSION_PROBES {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Session may send up to {:.0} probes; event logs will be large", expected),
                ));
            }
        }

        if config.auto_duration_secs > 3600.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Auto-test will run for {:.0} seconds", config.auto_duration_secs),
            ));
        }

        if config.probe_directive != crate::defaults::DEFAULT_PROBE_DIRECTIVE {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Using custom probe directive '{}'", config.probe_directive),
            ));
        }

        if config.test_double_cmd.is_some() && config.startup_delay_ms == 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "No settle delay after launching the test double".to_string(),
            ));
        }

        warnings
    }

    fn validate_read_timeout(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        match config.read_timeout_ms {
            None if config.auto_test => warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Acknowledgement reads are unbounded; a silent tunnel stalls the session".to_string(),
            )),
            Some(ms) if ms < SHORT_READ_TIMEOUT_MS => warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Read timeout of {}ms may count slow acknowledgements as missing", ms),
            )),
            _ => {}
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
