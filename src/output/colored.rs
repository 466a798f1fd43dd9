//! Colored formatter implementation with terminal color support

use super::formatter::{format_duration_ms, format_percentage, FormattingOptions, OutputFormatter, PlainFormatter};
use crate::{
    error::{AppError, Result},
    probe::{ProbeSession, ProbeState},
    stats::{LossBucket, SessionAnalysis},
    tunnel::TerminationReport,
};
use colored::*;
use std::fmt::Write as _;

/// Latency classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyLevel {
    Excellent, // < 10ms
    Good,      // 10-50ms
    Fair,      // 50-150ms
    Poor,      // 150-500ms
    VeryPoor,  // >= 500ms
}

impl LatencyLevel {
    pub fn from_rtt_ms(rtt_ms: f64) -> Self {
        if rtt_ms < 10.0 {
            Self::Excellent
        } else if rtt_ms < 50.0 {
            Self::Good
        } else if rtt_ms < 150.0 {
            Self::Fair
        } else if rtt_ms < 500.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn heading(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold().color(self.color_scheme.header)
        } else {
            text.normal()
        }
    }

    fn loss_color(&self, loss_pct: f64) -> Color {
        if loss_pct <= 0.0 {
            self.color_scheme.success
        } else if loss_pct < 5.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }

    fn rtt_colored(&self, rtt_ms: f64) -> ColoredString {
        self.colorize(&format_duration_ms(rtt_ms), LatencyLevel::from_rtt_ms(rtt_ms).color())
    }

    /// Check if terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }

    /// Enable or disable colors at runtime
    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.options.enable_color = enabled && Self::supports_color();
    }
}

fn io_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format colored output: {}", e))
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.muted)).map_err(io_err)?;
        writeln!(output, "  {}  ", self.heading(title)).map_err(io_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.muted)).map_err(io_err)?;

        Ok(output)
    }

    fn format_session_summary(&self, session: &ProbeSession, analysis: &SessionAnalysis) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.heading("Probe Session Summary")).map_err(io_err)?;

        let state_color = match session.state {
            ProbeState::StoppedOnSendFailure => self.color_scheme.error,
            _ => self.color_scheme.info,
        };
        writeln!(
            output,
            "  tunnel {}  stopped: {}",
            self.colorize(&session.tunnel.to_string(), self.color_scheme.info),
            self.colorize(session.state.as_str(), state_color)
        )
        .map_err(io_err)?;
        writeln!(
            output,
            "  sent {}  acked {}",
            self.colorize(&session.sent.to_string(), self.color_scheme.info),
            self.colorize(&session.acked.to_string(), self.color_scheme.success)
        )
        .map_err(io_err)?;

        let loss = match analysis.loss_pct {
            Some(loss) => self.colorize(&format_percentage(loss), self.loss_color(loss)),
            None => self.colorize("N/A", self.color_scheme.muted),
        };
        writeln!(output, "  loss {}", loss).map_err(io_err)?;

        match &analysis.rtt {
            Some(rtt) => write!(
                output,
                "  rtt  mean {} / p95 {} ({})",
                self.rtt_colored(rtt.mean_ms),
                self.rtt_colored(rtt.p95_ms),
                LatencyLevel::from_rtt_ms(rtt.mean_ms).description()
            )
            .map_err(io_err)?,
            None => write!(output, "  rtt  {}", self.colorize("N/A", self.color_scheme.muted)).map_err(io_err)?,
        }

        if let Some(failure) = &session.failure {
            write!(output, "\n  {}", self.colorize(failure, self.color_scheme.error)).map_err(io_err)?;
        }

        if self.options.verbose_mode && !analysis.timeline.is_empty() {
            write!(output, "\n\n{}", self.format_loss_timeline(&analysis.timeline)?).map_err(io_err)?;
        }

        Ok(output)
    }

    fn format_loss_timeline(&self, timeline: &[LossBucket]) -> Result<String> {
        // Table cells stay uncolored so the column widths line up.
        self.plain_formatter.format_loss_timeline(timeline)
    }

    fn format_termination_report(&self, report: &TerminationReport) -> Result<String> {
        let mut output = String::new();

        let ids: Vec<String> = report.terminated.iter().map(|id| id.to_string()).collect();
        if ids.is_empty() {
            write!(output, "{}", self.colorize("No tunnels to terminate", self.color_scheme.muted)).map_err(io_err)?;
        } else {
            write!(
                output,
                "{} {}",
                self.colorize("✓ terminated tunnels", self.color_scheme.success),
                ids.join(", ")
            )
            .map_err(io_err)?;
        }
        for (id, error) in &report.failures {
            write!(
                output,
                "\n{}",
                self.colorize(&format!("✗ tunnel {}: {}", id, error), self.color_scheme.error)
            )
            .map_err(io_err)?;
        }

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("✗ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("! {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✓ {}", self.colorize(message, self.color_scheme.success)))
    }
}
