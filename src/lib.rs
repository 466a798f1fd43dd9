//! Tunnel Harness
//!
//! Launches and supervises network-emulation tunnel processes, drives them
//! through a line-oriented control protocol, and measures probe round-trip
//! latency and delivery against a tunnel endpoint.

pub mod app;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod eventlog;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod shutdown;
pub mod stats;
pub mod tunnel;
pub mod types;

// Re-export commonly used types
pub use app::App;
pub use error::{AppError, Result};
pub use models::Config;
pub use types::{TunnelId, TunnelState};
pub use tunnel::{ProcessRegistry, SpawnSpec, TunnelProcess};
pub use command::{Command, CommandParser, Dispatcher, Flow};
pub use probe::{ProbeHarness, ProbeSession, ProbeState};
pub use eventlog::{EventLogWriter, LogPaths};
pub use stats::{LossBucket, RttSummary, SessionAnalysis};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata stamped by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_LOG_DIR: &str = "experiment_logs";
    pub const SENT_LOG_NAME: &str = "sent.log";
    pub const RECV_LOG_NAME: &str = "recv.log";
    pub const RTT_LOG_NAME: &str = "rttevents.log";

    pub const DEFAULT_AUTO_DURATION_SECS: f64 = 60.0;
    pub const DEFAULT_AUTO_INTERVAL_SECS: f64 = 0.1;
    pub const DEFAULT_AUTO_TUNNEL_ID: u32 = 1;
    pub const DEFAULT_PROBE_DIRECTIVE: &str = "send_packet";
    pub const DEFAULT_STARTUP_DELAY_MS: u64 = 1000;

    pub const DEFAULT_LAUNCHERS: &[&str] = &["mm-tunnelclient", "mm-tunnelserver"];
    /// Options whose `=VALUE` part gets a leading `~` expanded
    pub const LOG_PATH_OPTIONS: &[&str] = &["--ingress-log", "--egress-log"];

    /// Test-double binary shipped next to the orchestrator
    pub const TEST_DOUBLE_BIN: &str = "dummy-tunnel";
    pub const DEFAULT_ACK_DELAY_MS: u64 = 200;

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
