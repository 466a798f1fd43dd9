//! Structured diagnostic logging for the tunnel harness
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Session correlation IDs shared by every logger of a run
//! - Process lifecycle and probe event loggers
//! - JSON structured output for debug runs
//!
//! Everything is written to stderr. Stdout carries `readline` results and
//! probe reports and must stay parseable.

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::types::{ShutdownSignal, TunnelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - events that end the run
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
    /// File and line information
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a logger with level and format derived from the configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Fatal, message)
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = self.render(&entry);
        let _ = writeln!(io::stderr().lock(), "{}", output);
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}",
                entry.message
            ),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add location information
    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Tag the entry with a tunnel
    pub fn tunnel(self, id: TunnelId) -> Self {
        self.field("tunnel_id", id.get())
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for tunnel process lifecycle events
pub struct ProcessLogger {
    logger: Logger,
}

impl ProcessLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("PROC".to_string(), config),
        }
    }

    /// Log a tunnel spawn attempt and its outcome
    pub async fn log_spawn(&self, id: TunnelId, command: &str, pgid: Option<u32>, error: Option<&AppError>) {
        match (pgid, error) {
            (Some(pgid), _) => {
                self.logger
                    .info(&format!("Spawned tunnel {}: {}", id, command))
                    .tunnel(id)
                    .field("command", command)
                    .field("pgid", pgid)
                    .log()
                    .await
            }
            (None, Some(err)) => {
                self.logger
                    .warn(&format!("Failed to spawn tunnel {}: {}", id, err))
                    .tunnel(id)
                    .field("command", command)
                    .error_info(err)
                    .log()
                    .await
            }
            (None, None) => {
                self.logger
                    .warn(&format!("Tunnel {} spawn reported no pid", id))
                    .tunnel(id)
                    .log()
                    .await
            }
        }
    }

    /// Log a line forwarded to or read from a tunnel
    pub async fn log_io(&self, id: TunnelId, direction: &str, line: &str) {
        self.logger
            .debug(&format!("tunnel {} {} {:?}", id, direction, line))
            .tunnel(id)
            .field("direction", direction)
            .field("bytes", line.len())
            .log()
            .await;
    }

    /// Log a registry-wide termination
    pub async fn log_terminate_all(&self, reason: &str, terminated: &[TunnelId], failures: &[(TunnelId, AppError)]) {
        let level = if failures.is_empty() { LogLevel::Info } else { LogLevel::Error };
        let ids: Vec<u32> = terminated.iter().map(|id| id.get()).collect();

        let mut builder = self
            .logger
            .log(level, &format!("Terminated {} tunnel group(s) on {}", terminated.len(), reason))
            .field("reason", reason)
            .field("terminated", ids);

        if !failures.is_empty() {
            let failed: Vec<String> = failures.iter().map(|(id, e)| format!("{}: {}", id, e)).collect();
            builder = builder.field("failures", failed);
        }

        builder.log().await;
    }

    /// Log a delivered shutdown signal
    pub async fn log_signal(&self, signal: ShutdownSignal) {
        self.logger
            .warn(&format!("Caught {}", signal.name()))
            .field("signal", signal.name())
            .log()
            .await;
    }
}

/// Logger for probe session events
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("PROBE".to_string(), config),
        }
    }

    /// Log the start of a session
    pub async fn log_session_start(&self, session_id: &str, id: TunnelId, duration_secs: f64, interval_secs: f64) {
        self.logger
            .info(&format!("Probe session started against tunnel {}", id))
            .correlation_id(session_id)
            .tunnel(id)
            .field("duration_secs", duration_secs)
            .field("interval_secs", interval_secs)
            .log()
            .await;
    }

    /// Log one acknowledged probe
    pub async fn log_ack(&self, session_id: &str, seq: u64, rtt_ms: f64) {
        self.logger
            .debug(&format!("probe {} acked in {:.3}ms", seq, rtt_ms))
            .correlation_id(session_id)
            .field("seq", seq)
            .field("rtt_ms", rtt_ms)
            .log()
            .await;
    }

    /// Log a probe that got no acknowledgement
    pub async fn log_missing_ack(&self, session_id: &str, seq: u64, error: &AppError) {
        self.logger
            .warn(&format!("probe {}: {}", seq, error))
            .correlation_id(session_id)
            .field("seq", seq)
            .error_info(error)
            .log()
            .await;
    }

    /// Log that per-probe reports can no longer be written
    pub async fn log_output_failure(&self, session_id: &str, error: &str) {
        self.logger
            .warn(&format!("probe reports not delivered: {}", error))
            .correlation_id(session_id)
            .field("stream", "stdout")
            .log()
            .await;
    }

    /// Log the end of a session
    pub async fn log_session_end(&self, session_id: &str, state: &str, sent: u64, acked: u64) {
        self.logger
            .info(&format!("Probe session finished ({}): sent={}, acked={}", state, sent, acked))
            .correlation_id(session_id)
            .field("state", state)
            .field("sent", sent)
            .field("acked", acked)
            .log()
            .await;
    }
}

/// Error event logger with enhanced context
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    /// Log an application error with full context.
    ///
    /// Internal errors are logged as fatal.
    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };

        let builder = match error {
            AppError::Internal(_) => self.logger.fatal(&message),
            _ => self.logger.error(&message),
        };
        let mut builder = builder.error_info(error);
        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }
        builder.log().await;
    }
}

/// Hands out loggers sharing one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_process_logger(&self) -> ProcessLogger {
        let logger = ProcessLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        let logger = ProbeLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    /// Error events also carry the run mode
    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        let logger = ErrorEventLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        let mode = if self.config.auto_test { "auto-test" } else { "interactive" };
        logger.logger.add_context_field("mode".to_string(), mode).await;
        logger
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Debug-level entry tagged with the call site
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}
