//! Signal-driven shutdown of every supervised tunnel
//!
//! The controller runs as its own task so it fires while the dispatcher or
//! the probe harness is blocked reading a pipe. Termination goes through the
//! same idempotent [`ProcessRegistry::terminate_all`] as `halt`.

use crate::error::{AppError, Result};
use crate::logging::ProcessLogger;
use crate::tunnel::{ProcessRegistry, TerminationReport};
use crate::types::ShutdownSignal;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;

/// Exit status after a signal-triggered shutdown
pub const SIGNAL_EXIT_CODE: i32 = 1;

/// Registered SIGINT and SIGTERM streams.
///
/// Registration replaces the default disposition, so a signal arriving after
/// `new` returns is queued rather than killing the process.
pub struct ShutdownListener {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownListener {
    pub fn new() -> Result<Self> {
        let interrupt = signal(SignalKind::interrupt())
            .map_err(|e| AppError::internal(format!("Failed to install SIGINT handler: {}", e)))?;
        let terminate = signal(SignalKind::terminate())
            .map_err(|e| AppError::internal(format!("Failed to install SIGTERM handler: {}", e)))?;
        Ok(Self { interrupt, terminate })
    }

    /// Wait for the next shutdown signal
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
        }
    }
}

/// Terminate every registered tunnel on behalf of `signal`
pub async fn shutdown(registry: &ProcessRegistry, signal: ShutdownSignal, logger: &ProcessLogger) -> TerminationReport {
    logger.log_signal(signal).await;
    let report = registry.terminate_all();
    logger
        .log_terminate_all(signal.name(), &report.terminated, &report.failures)
        .await;
    report
}

pub fn signal_message(signal: ShutdownSignal) -> String {
    format!("tunnel_manager: caught signal {} and cleaned up", signal.name())
}

/// Install the shutdown controller.
///
/// Handlers are registered before this returns. On the first signal the task
/// terminates all tunnels, prints the cleanup message to stderr and exits the
/// process with [`SIGNAL_EXIT_CODE`].
pub fn spawn_controller(registry: ProcessRegistry, logger: ProcessLogger) -> Result<JoinHandle<()>> {
    let mut listener = ShutdownListener::new()?;

    Ok(tokio::spawn(async move {
        let signal = listener.recv().await;
        let report = shutdown(&registry, signal, &logger).await;
        for (id, error) in &report.failures {
            eprintln!("error: tunnel {}: {}", id, error);
        }
        eprintln!("{}", signal_message(signal));
        std::process::exit(SIGNAL_EXIT_CODE);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::tunnel::SpawnSpec;
    use crate::types::TunnelId;
    use std::time::Duration;

    #[test]
    fn test_signal_message() {
        assert_eq!(
            signal_message(ShutdownSignal::Interrupt),
            "tunnel_manager: caught signal SIGINT and cleaned up"
        );
        assert_eq!(
            signal_message(ShutdownSignal::Terminate),
            "tunnel_manager: caught signal SIGTERM and cleaned up"
        );
    }

    #[tokio::test]
    async fn test_shutdown_terminates_every_tunnel() {
        let registry = ProcessRegistry::new();
        let logger = ProcessLogger::new(&Config::default());
        let spec = SpawnSpec::new("sleep", vec!["30".to_string()]);
        let first = registry.create(TunnelId::new(1).unwrap(), &spec).unwrap();
        registry.create(TunnelId::new(2).unwrap(), &spec).unwrap();

        let report = shutdown(&registry, ShutdownSignal::Terminate, &logger).await;
        assert!(report.is_clean());
        assert_eq!(report.terminated.len(), 2);
        assert!(registry.is_empty());
        assert!(!first.is_alive());

        // A second signal finds nothing left to do.
        let again = shutdown(&registry, ShutdownSignal::Interrupt, &logger).await;
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_listener_receives_sigterm() {
        let mut listener = ShutdownListener::new().unwrap();

        // SAFETY: signalling our own pid; SIGTERM is handled by the listener.
        let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        assert_eq!(rc, 0);

        let received = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .unwrap();
        assert_eq!(received, ShutdownSignal::Terminate);
    }
}
