//! Output formatting and display system
//!
//! Renders probe session summaries, per-second loss timelines and shutdown
//! reports, either colored for a terminal or as plain text for scripts.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, LatencyLevel};
pub use formatter::{
    format_duration_ms, format_percentage, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter,
    RowData,
};

use crate::{
    error::Result,
    probe::ProbeSession,
    stats::SessionAnalysis,
    tunnel::TerminationReport,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    /// Full report printed when an auto-test finishes
    pub fn display_session(&self, session: &ProbeSession, analysis: &SessionAnalysis) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Auto-test Results")?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_session_summary(session, analysis)?);

        Ok(output)
    }

    pub fn display_termination(&self, report: &TerminationReport) -> Result<String> {
        if report.is_clean() {
            self.formatter.format_termination_report(report)
        } else {
            Ok(format!(
                "{}\n{}",
                self.formatter.format_termination_report(report)?,
                self.formatter
                    .format_warning(&format!("{} tunnel(s) could not be terminated", report.failures.len()))?
            ))
        }
    }

    pub fn display_error(&self, error: &str) -> Result<String> {
        self.formatter.format_error(error)
    }

    pub fn display_warning(&self, warning: &str) -> Result<String> {
        self.formatter.format_warning(warning)
    }
}
