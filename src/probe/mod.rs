//! Probe harness: timed send/acknowledge loop against one tunnel
//!
//! Each iteration logs a send timestamp, writes the probe directive, blocks for
//! one acknowledgement line and, when one arrives, logs the ack timestamp and
//! the round-trip sample. The session stops when its deadline passes or on the
//! first failed send.

use crate::error::{AppError, Result};
use crate::eventlog::{wall_clock_secs, EventLogWriter, RttRecord};
use crate::logging::ProbeLogger;
use crate::models::Config;
use crate::tunnel::TunnelProcess;
use crate::types::TunnelId;
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Line-level access to a tunnel, as needed by the harness
#[async_trait]
pub trait ProbeLink: Send + Sync {
    /// Tunnel being probed
    fn tunnel_id(&self) -> TunnelId;

    /// Write one line to the tunnel's input
    async fn send_line(&self, line: &str) -> Result<()>;

    /// Read one line from the tunnel's output; empty at end of stream
    async fn read_line(&self, limit: Option<Duration>) -> Result<String>;
}

#[async_trait]
impl ProbeLink for TunnelProcess {
    fn tunnel_id(&self) -> TunnelId {
        self.id()
    }

    async fn send_line(&self, line: &str) -> Result<()> {
        TunnelProcess::send_line(self, line).await
    }

    async fn read_line(&self, limit: Option<Duration>) -> Result<String> {
        self.read_line_within(limit).await
    }
}

/// Parameters of one probe session
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub interval: Duration,
    pub duration: Duration,
    pub directive: String,
    /// Bound on each acknowledgement wait; unbounded when `None`
    pub read_timeout: Option<Duration>,
}

impl ProbeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.auto_interval(),
            duration: config.auto_duration(),
            directive: config.probe_directive.clone(),
            read_timeout: config.read_timeout(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeState {
    Idle,
    Running,
    StoppedOnTimeout,
    StoppedOnSendFailure,
}

impl ProbeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::StoppedOnTimeout => "timeout",
            Self::StoppedOnSendFailure => "send-failure",
        }
    }
}

/// Counters and samples of one probe session
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSession {
    /// Correlation id shared with the session's log entries
    pub id: String,
    pub tunnel: TunnelId,
    /// Probes whose send was attempted after the sent record was logged
    pub sent: u64,
    /// Probes answered with a non-empty line
    pub acked: u64,
    pub interval: Duration,
    pub duration: Duration,
    pub state: ProbeState,
    pub sent_at: Vec<f64>,
    pub acked_at: Vec<f64>,
    pub rtt_ms: Vec<f64>,
    /// Why the session stopped early, if it did
    pub failure: Option<String>,
}

impl ProbeSession {
    pub fn new(tunnel: TunnelId, config: &ProbeConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tunnel,
            sent: 0,
            acked: 0,
            interval: config.interval,
            duration: config.duration,
            state: ProbeState::Idle,
            sent_at: Vec::new(),
            acked_at: Vec::new(),
            rtt_ms: Vec::new(),
            failure: None,
        }
    }

    /// Probes that got no acknowledgement
    pub fn missing(&self) -> u64 {
        self.sent.saturating_sub(self.acked)
    }
}

/// Drives one probe session.
///
/// Per-probe reports go to `out`; missing-ack and send-failure diagnostics go
/// to `diag`.
pub struct ProbeHarness {
    config: ProbeConfig,
    logger: ProbeLogger,
    out: Box<dyn Write + Send>,
    diag: Box<dyn Write + Send>,
    /// First failure writing to `out`, and whether it has been logged
    out_error: Option<String>,
    out_error_logged: bool,
}

impl ProbeHarness {
    pub fn new(config: ProbeConfig, logger: ProbeLogger) -> Self {
        Self {
            config,
            logger,
            out: Box::new(std::io::stdout()),
            diag: Box::new(std::io::stderr()),
            out_error: None,
            out_error_logged: false,
        }
    }

    /// Redirect the report and diagnostic streams
    pub fn with_output(mut self, out: Box<dyn Write + Send>, diag: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self.diag = diag;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Why per-probe reports stopped reaching `out`, if they did
    pub fn output_error(&self) -> Option<&str> {
        self.out_error.as_deref()
    }

    /// Run a session until the deadline or a failed send.
    ///
    /// Missing acknowledgements are reported and skipped. A failed log append
    /// aborts the session with an I/O error.
    pub async fn run<L>(&mut self, link: &L, log: &mut EventLogWriter) -> Result<ProbeSession>
    where
        L: ProbeLink + ?Sized,
    {
        let tunnel = link.tunnel_id();
        let mut session = ProbeSession::new(tunnel, &self.config);
        session.state = ProbeState::Running;

        let duration_secs = self.config.duration.as_secs_f64();
        let interval_secs = self.config.interval.as_secs_f64();
        self.report(format_args!(
            "Starting auto-test for {} seconds, sending a packet every {:.2} seconds...",
            duration_secs, interval_secs
        ));
        self.logger
            .log_session_start(&session.id, tunnel, duration_secs, interval_secs)
            .await;
        self.log_output_failure(&session.id).await;

        let deadline = Instant::now() + self.config.duration;
        let mut stale_acks: u64 = 0;
        while Instant::now() < deadline {
            let t_send = wall_clock_secs();
            let started = Instant::now();
            log.record_sent(t_send)?;
            session.sent += 1;
            session.sent_at.push(t_send);

            if let Err(e) = link.send_line(&self.config.directive).await {
                self.diagnose(format_args!("Error sending packet command: {}", e));
                session.state = ProbeState::StoppedOnSendFailure;
                session.failure = Some(e.to_string());
                break;
            }

            // Acks abandoned by earlier timeouts are still in the pipe and
            // must be consumed before this probe's own ack.
            let ack_deadline = self.config.read_timeout.map(|limit| started + limit);
            let reply = match discard_stale_acks(link, &mut stale_acks, ack_deadline).await {
                Ok(()) => link.read_line(remaining(ack_deadline)).await,
                Err(e) => Err(e),
            };

            match reply {
                Ok(line) if !line.trim().is_empty() => {
                    // Monotonic elapsed time keeps the sample non-negative
                    // even if the wall clock steps.
                    let t_ack = t_send + started.elapsed().as_secs_f64();
                    let record = RttRecord::new(t_send, t_ack);
                    log.record_received(t_ack)?;
                    log.record_rtt(&record)?;

                    session.acked += 1;
                    session.acked_at.push(t_ack);
                    session.rtt_ms.push(record.rtt_ms);

                    self.report(format_args!("RTT for packet: {:.2} ms", record.rtt_ms));
                    self.logger.log_ack(&session.id, session.sent, record.rtt_ms).await;
                    self.log_output_failure(&session.id).await;
                }
                Ok(_) => {
                    let missing = AppError::MissingAck(tunnel);
                    self.diagnose(&missing);
                    self.logger.log_missing_ack(&session.id, session.sent, &missing).await;
                }
                Err(e) => {
                    if matches!(e, AppError::Timeout(_)) {
                        stale_acks += 1;
                    }
                    let missing = AppError::MissingAck(tunnel);
                    self.diagnose(format_args!("{} ({})", missing, e));
                    self.logger.log_missing_ack(&session.id, session.sent, &e).await;
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }

        if session.state == ProbeState::Running {
            session.state = ProbeState::StoppedOnTimeout;
        }

        self.report(format_args!(
            "Auto-test completed. Total packets sent: {}, ACKed: {}",
            session.sent, session.acked
        ));
        self.logger
            .log_session_end(&session.id, session.state.as_str(), session.sent, session.acked)
            .await;
        self.log_output_failure(&session.id).await;

        Ok(session)
    }

    fn report<T: std::fmt::Display>(&mut self, message: T) {
        if self.out_error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", message).and_then(|_| self.out.flush()) {
            self.out_error = Some(e.to_string());
        }
    }

    /// Log the first report write failure, once per harness
    async fn log_output_failure(&mut self, session_id: &str) {
        if self.out_error_logged {
            return;
        }
        if let Some(error) = &self.out_error {
            self.logger.log_output_failure(session_id, error).await;
            self.out_error_logged = true;
        }
    }

    fn diagnose<T: std::fmt::Display>(&mut self, message: T) {
        let _ = writeln!(self.diag, "{}", message);
        let _ = self.diag.flush();
    }
}

/// Read and drop `stale` late acknowledgements, giving up at `deadline`.
///
/// A closed stream leaves nothing to drain.
async fn discard_stale_acks<L>(link: &L, stale: &mut u64, deadline: Option<Instant>) -> Result<()>
where
    L: ProbeLink + ?Sized,
{
    while *stale > 0 {
        let line = link.read_line(remaining(deadline)).await?;
        if line.is_empty() {
            *stale = 0;
        } else {
            *stale -= 1;
        }
    }
    Ok(())
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}
