//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    probe::ProbeSession,
    stats::{LossBucket, SessionAnalysis},
    tunnel::TerminationReport,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the end-of-session summary
    fn format_session_summary(&self, session: &ProbeSession, analysis: &SessionAnalysis) -> Result<String>;

    /// Format the per-second loss timeline as a table
    fn format_loss_timeline(&self, timeline: &[LossBucket]) -> Result<String>;

    /// Format the outcome of a registry-wide termination
    fn format_termination_report(&self, report: &TerminationReport) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Include the per-second timeline in summaries
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Timeline rows shown before eliding the middle
    pub max_timeline_rows: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_timeline_rows: 120,
        }
    }
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Render a table; rows shorter than the column list are padded
    pub(crate) fn create_table(&self, columns: &[Column], rows: &[RowData]) -> String {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .chain([col.min_width, col.header.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let borders = self.options.table_borders;
        let mut output = String::new();
        let headers: RowData = columns.iter().map(|c| c.header.clone()).collect();

        if borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }
        output.push_str(&create_row(&headers, &widths, columns, borders));
        output.push('\n');
        if borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }
        for row in rows {
            output.push_str(&create_row(row, &widths, columns, borders));
            output.push('\n');
        }
        if borders {
            output.push_str(&horizontal_border(&widths));
        }

        output.trim_end().to_string()
    }

    /// Timeline rows, eliding the middle of very long sessions
    pub(crate) fn timeline_rows(&self, timeline: &[LossBucket]) -> Vec<RowData> {
        let row = |b: &LossBucket| {
            vec![
                b.second.to_string(),
                b.sent.to_string(),
                b.received.to_string(),
                format_percentage(b.loss_pct),
            ]
        };

        let max = self.options.max_timeline_rows.max(2);
        if timeline.len() <= max {
            return timeline.iter().map(row).collect();
        }

        let head = max / 2;
        let tail = max - head;
        let skipped = timeline.len() - max;
        let mut rows: Vec<RowData> = timeline[..head].iter().map(row).collect();
        rows.push(vec![
            "...".to_string(),
            String::new(),
            String::new(),
            format!("{} more", skipped),
        ]);
        rows.extend(timeline[timeline.len() - tail..].iter().map(row));
        rows
    }

    pub(crate) fn timeline_columns() -> Vec<Column> {
        vec![
            Column::new("Second", Alignment::Right, 6),
            Column::new("Sent", Alignment::Right, 5),
            Column::new("Recv", Alignment::Right, 5),
            Column::new("Loss", Alignment::Right, 7),
        ]
    }
}

fn create_row(data: &[String], widths: &[usize], columns: &[Column], borders: bool) -> String {
    let mut row = String::new();
    if borders {
        row.push('|');
    }

    for (idx, &width) in widths.iter().enumerate() {
        let cell = data.get(idx).map(String::as_str).unwrap_or("");
        let alignment = columns.get(idx).map(|c| c.alignment).unwrap_or(Alignment::Left);

        if borders {
            row.push(' ');
        }
        row.push_str(&align_text(cell, width, alignment));
        if borders {
            row.push_str(" |");
        } else {
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn horizontal_border(widths: &[usize]) -> String {
    let mut border = String::from("+");
    for &width in widths {
        border.push_str(&"-".repeat(width + 2));
        border.push('+');
    }
    border
}

fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    match alignment {
        Alignment::Left => format!("{:<width$}", text, width = width),
        Alignment::Right => format!("{:>width$}", text, width = width),
    }
}

/// Milliseconds in a human-readable unit
pub fn format_duration_ms(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{:.0}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.2}ms", duration_ms)
    } else {
        format!("{:.2}s", duration_ms / 1000.0)
    }
}

/// Percentage with one decimal
pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

fn io_err(what: &str) -> impl Fn(std::fmt::Error) -> AppError + '_ {
    move |e| AppError::io(format!("Failed to format {}: {}", what, e))
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.chars().count() + 4);

        writeln!(output, "{}", border).map_err(io_err("header"))?;
        writeln!(output, "  {}  ", title).map_err(io_err("header"))?;
        write!(output, "{}", border).map_err(io_err("header"))?;

        Ok(output)
    }

    fn format_session_summary(&self, session: &ProbeSession, analysis: &SessionAnalysis) -> Result<String> {
        let mut output = String::new();
        let err = io_err("session summary");

        writeln!(output, "Probe Session Summary:").map_err(&err)?;
        writeln!(output, "----------------------").map_err(&err)?;
        writeln!(output, "Tunnel:           {}", session.tunnel).map_err(&err)?;
        writeln!(output, "Stopped:          {}", session.state.as_str()).map_err(&err)?;
        writeln!(output, "Sent:             {}", session.sent).map_err(&err)?;
        writeln!(output, "Acknowledged:     {}", session.acked).map_err(&err)?;

        let loss = match analysis.loss_pct {
            Some(loss) => format_percentage(loss),
            None => "N/A".to_string(),
        };
        writeln!(output, "Loss:             {}", loss).map_err(&err)?;

        let rtt = match &analysis.rtt {
            Some(rtt) => write!(
                output,
                "RTT:              mean {} / p95 {} (min {}, max {})",
                format_duration_ms(rtt.mean_ms),
                format_duration_ms(rtt.p95_ms),
                format_duration_ms(rtt.min_ms),
                format_duration_ms(rtt.max_ms)
            ),
            None => write!(output, "RTT:              N/A"),
        };
        rtt.map_err(&err)?;

        if let Some(failure) = &session.failure {
            write!(output, "\nFailure:          {}", failure).map_err(&err)?;
        }

        if self.options.verbose_mode && !analysis.timeline.is_empty() {
            write!(output, "\n\n{}", self.format_loss_timeline(&analysis.timeline)?).map_err(&err)?;
        }

        Ok(output)
    }

    fn format_loss_timeline(&self, timeline: &[LossBucket]) -> Result<String> {
        if timeline.is_empty() {
            return Ok("No loss data available.".to_string());
        }
        let rows = self.timeline_rows(timeline);
        Ok(format!(
            "Per-second loss:\n{}",
            self.create_table(&Self::timeline_columns(), &rows)
        ))
    }

    fn format_termination_report(&self, report: &TerminationReport) -> Result<String> {
        let mut output = String::new();
        let err = io_err("termination report");

        let ids: Vec<String> = report.terminated.iter().map(|id| id.to_string()).collect();
        if ids.is_empty() {
            write!(output, "No tunnels to terminate").map_err(&err)?;
        } else {
            write!(output, "Terminated tunnels: {}", ids.join(", ")).map_err(&err)?;
        }
        for (id, error) in &report.failures {
            write!(output, "\nFailed to terminate tunnel {}: {}", id, error).map_err(&err)?;
        }

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("OK: {}", message))
    }
}
