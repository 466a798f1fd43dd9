//! Supervised tunnel processes
//!
//! A [`TunnelProcess`] owns one child started in its own process group with
//! piped stdin/stdout. The [`ProcessRegistry`] is the only place handles are
//! created or terminated; everything else just sends and reads lines.

mod registry;

pub use registry::{ProcessRegistry, TerminationReport};

use crate::error::{AppError, Result};
use crate::types::{TunnelId, TunnelState};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Program and arguments for a tunnel process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl SpawnSpec {
    /// Create a spawn spec from a program and its arguments
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// First element is the program, the rest are its arguments
    pub fn from_argv(mut argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(AppError::spawn("empty command line"));
        }
        let program = argv.remove(0);
        Ok(Self::new(program, argv))
    }

    /// Split a command line on whitespace
    pub fn from_command_line(line: &str) -> Result<Self> {
        Self::from_argv(line.split_whitespace().map(String::from).collect())
    }

    /// Command line as a single string, for diagnostics
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Handle on one running tunnel process
#[derive(Debug)]
pub struct TunnelProcess {
    id: TunnelId,
    command: String,
    /// Child pid, which is also its process group id
    pgid: u32,
    state: Mutex<TunnelState>,
    child: Mutex<Child>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    stdout: tokio::sync::Mutex<BufReader<ChildStdout>>,
}

impl TunnelProcess {
    /// Start the process in a fresh process group
    pub(crate) fn spawn(id: TunnelId, spec: &SpawnSpec) -> Result<Self> {
        let mut child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .process_group(0)
            .spawn()
            .map_err(|e| AppError::spawn(format!("{}: {}", spec.program, e)))?;

        let pgid = child
            .id()
            .ok_or_else(|| AppError::spawn(format!("{}: exited before it could be registered", spec.program)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::spawn(format!("{}: stdin not captured", spec.program)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::spawn(format!("{}: stdout not captured", spec.program)))?;

        Ok(Self {
            id,
            command: spec.display(),
            pgid,
            state: Mutex::new(TunnelState::Spawned),
            child: Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
            stdout: tokio::sync::Mutex::new(BufReader::new(stdout)),
        })
    }

    /// Registry key of this tunnel
    pub fn id(&self) -> TunnelId {
        self.id
    }

    /// Command line the tunnel was started with
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Process group id used for termination
    pub fn pgid(&self) -> u32 {
        self.pgid
    }

    /// Current lifecycle state
    pub fn state(&self) -> TunnelState {
        *lock(&self.state)
    }

    /// Refresh the state from the child and report whether it is still Spawned
    pub fn is_alive(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == TunnelState::Terminated {
            return false;
        }
        match lock(&self.child).try_wait() {
            Ok(None) => true,
            Ok(Some(_)) | Err(_) => {
                *state = TunnelState::Terminated;
                false
            }
        }
    }

    /// Write one newline-terminated line to the tunnel's input
    pub async fn send_line(&self, line: &str) -> Result<()> {
        if self.state() == TunnelState::Terminated {
            return Err(AppError::send_failure(format!("tunnel {} is terminated", self.id)));
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(buf.as_bytes())
            .await
            .map_err(|e| AppError::send_failure(format!("tunnel {}: {}", self.id, e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| AppError::send_failure(format!("tunnel {}: {}", self.id, e)))
    }

    /// Read one line from the tunnel's output, newline included.
    ///
    /// Returns an empty string once the stream is closed, which is also what an
    /// in-flight read observes when the group is terminated underneath it.
    pub async fn read_line(&self) -> Result<String> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();
        stdout.read_line(&mut line).await?;
        Ok(line)
    }

    /// [`read_line`](Self::read_line), bounded by `limit` when one is given
    pub async fn read_line_within(&self, limit: Option<Duration>) -> Result<String> {
        match limit {
            None => self.read_line().await,
            Some(limit) => tokio::time::timeout(limit, self.read_line())
                .await
                .map_err(|_| {
                    AppError::timeout(format!("no output from tunnel {} within {}ms", self.id, limit.as_millis()))
                })?,
        }
    }

    /// Send SIGTERM to the whole process group. Idempotent.
    pub(crate) fn terminate(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state == TunnelState::Terminated {
            return Ok(());
        }
        *state = TunnelState::Terminated;

        // SAFETY: `pgid` is the pid of a child we spawned with `process_group(0)`,
        // so it names that child's own group and never ours. A group that is
        // already gone yields ESRCH, which is not an error here.
        let rc = unsafe { libc::killpg(self.pgid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(AppError::io(format!(
                    "failed to terminate tunnel {} (pgid {}): {}",
                    self.id, self.pgid, err
                )));
            }
        }

        // Reap if it already went away; otherwise the runtime reaps it later.
        let _ = lock(&self.child).try_wait();
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
