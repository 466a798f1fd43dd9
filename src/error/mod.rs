//! Error handling for the tunnel harness

use crate::types::TunnelId;
use thiserror::Error;

/// Custom error types for the tunnel harness
#[derive(Error, Debug)]
pub enum AppError {
    /// A tunnel process could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// A tunnel id is already bound to a live process
    #[error("tunnel {0} is already running")]
    DuplicateId(TunnelId),

    /// No live tunnel is registered under the id
    #[error("tunnel {0} not found: run tunnel client or server first")]
    NotFound(TunnelId),

    /// A control line could not be parsed into a command
    #[error("usage: {0}")]
    MalformedCommand(String),

    /// Writing to a tunnel's input stream failed
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// A tunnel answered a probe with an empty line
    #[error("No ACK received for packet from tunnel {0}")]
    MissingAck(TunnelId),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (log files, control stream, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (numbers, durations, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// A bounded read did not complete in time
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new spawn error
    pub fn spawn<S: Into<String>>(message: S) -> Self {
        Self::Spawn(message.into())
    }

    /// Create a new malformed command error carrying the expected usage
    pub fn malformed<S: Into<String>>(usage: S) -> Self {
        Self::MalformedCommand(usage.into())
    }

    /// Create a new send failure
    pub fn send_failure<S: Into<String>>(message: S) -> Self {
        Self::SendFailure(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "SPAWN",
            Self::DuplicateId(_) => "DUPLICATE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MalformedCommand(_) => "COMMAND",
            Self::SendFailure(_) => "SEND",
            Self::MissingAck(_) => "ACK",
            Self::Config(_) => "CONFIG",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if the orchestrator can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DuplicateId(_)
            | Self::NotFound(_)
            | Self::MalformedCommand(_)
            | Self::MissingAck(_)
            | Self::Timeout(_)
            | Self::Spawn(_) => true,
            Self::SendFailure(_) | Self::Config(_) | Self::Io(_) | Self::Parse(_) | Self::Internal(_) => false,
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Parse(_) | Self::MalformedCommand(_) => 1, // Invalid configuration/usage
            Self::Spawn(_) | Self::DuplicateId(_) | Self::NotFound(_) => 2,    // No usable tunnel
            Self::Timeout(_) => 3,
            Self::SendFailure(_) | Self::MissingAck(_) => 4,
            Self::Io(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Parse(_) | Self::MalformedCommand(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Spawn(_) | Self::SendFailure(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::MissingAck(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::DuplicateId(_) | Self::NotFound(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }

    /// One-line hint printed under the error in verbose mode
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Spawn(_) => Some("Check that the tunnel binary is on PATH and executable."),
            Self::NotFound(_) => Some("Create the tunnel first with `tunnel ID mm-tunnelclient ...`."),
            Self::DuplicateId(_) => Some("Pick an unused tunnel id or halt the running tunnel."),
            Self::Config(_) => Some("Check your .env file or command line arguments."),
            Self::Io(_) => Some("Check file permissions and disk space for the log directory."),
            Self::Timeout(_) => Some("Raise --read-timeout-ms or check that the tunnel is responding."),
            _ => None,
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::timeout(error.to_string())
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error, keeping I/O failures in the I/O category
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            AppError::Io(msg) => AppError::io(format!("{}: {}", f(), msg)),
            other => AppError::internal(format!("{}: {}", f(), other)),
        })
    }
}

/// Error reporter for user-facing error output on stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Render an error the way `report_error` prints it
    pub fn render(&self, error: &AppError) -> String {
        let mut out = error.format_for_console(self.use_color);
        if self.verbose {
            if let Some(hint) = error.suggestion() {
                out.push_str("\n  hint: ");
                out.push_str(hint);
            }
        }
        out
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
