//! Main application orchestration and execution

use crate::{
    command::{CommandParser, Dispatcher},
    config::{display_config_summary, validate_config},
    error::{AppError, ErrorContext, Result},
    eventlog::EventLogWriter,
    logging::LoggerFactory,
    models::Config,
    output::{OutputCoordinator, OutputFormatterFactory},
    probe::{ProbeConfig, ProbeHarness, ProbeSession},
    shutdown,
    stats::SessionAnalysis,
    tunnel::{ProcessRegistry, SpawnSpec, TerminationReport, TunnelProcess},
    types::TunnelId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    registry: ProcessRegistry,
    loggers: LoggerFactory,
}

impl App {
    /// Create a new application instance from a validated configuration
    pub fn new(config: Config) -> Self {
        Self {
            loggers: LoggerFactory::new(config.clone()),
            registry: ProcessRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Run in the configured mode until halt, end of input or session end
    pub async fn run(self) -> Result<()> {
        println!("tunnel manager is running");

        if self.config.debug {
            eprintln!(
                "{} v{} ({}, built {})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::TARGET_TRIPLE,
                crate::BUILD_TIME
            );
            if let Some(commit) = crate::GIT_COMMIT {
                eprintln!("commit {}", commit);
            }
            eprintln!("\nConfiguration Summary:\n{}\n", display_config_summary(&self.config));
        }

        let warnings = validate_config(&self.config)?;
        if self.config.verbose || self.config.debug {
            for warning in &warnings {
                eprintln!("  {}", warning.format(self.config.enable_color));
            }
        }

        shutdown::spawn_controller(self.registry.clone(), self.loggers.create_process_logger().await)?;

        let logger = self.loggers.create_logger("MAIN").await;
        crate::log_debug!(
            logger,
            "starting {} mode, log dir {}",
            if self.config.auto_test { "auto-test" } else { "interactive" },
            self.config.log_dir
        );

        let result = if self.config.auto_test {
            self.run_auto_test().await
        } else {
            self.run_interactive().await
        };

        if let Err(e) = &result {
            self.loggers
                .create_error_logger()
                .await
                .log_error(e, Some("run"))
                .await;
        }
        result
    }

    /// Drive the control protocol from stdin
    pub async fn run_interactive(&self) -> Result<()> {
        let parser = CommandParser::new(self.config.launchers.clone())?;
        let mut dispatcher = Dispatcher::new(
            self.registry.clone(),
            parser,
            self.loggers.create_process_logger().await,
        )
        .with_read_timeout(self.config.read_timeout());

        let report = dispatcher.run(BufReader::new(tokio::io::stdin())).await?;
        self.report_termination(&report);
        Ok(())
    }

    /// Probe one tunnel for the configured duration, then tear everything down
    pub async fn run_auto_test(&self) -> Result<()> {
        let id = self.config.auto_tunnel()?;
        let tunnel = self.ensure_tunnel(id).await?;

        let result = self.probe(&tunnel).await;
        let report = self.registry.terminate_all();
        self.loggers
            .create_process_logger()
            .await
            .log_terminate_all("auto-test finished", &report.terminated, &report.failures)
            .await;
        self.report_termination(&report);

        let session = result?;
        let analysis = SessionAnalysis::from_session(&session);
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(
            self.config.enable_color,
            self.config.verbose,
        ));
        println!("\n{}", coordinator.display_session(&session, &analysis)?);

        Ok(())
    }

    async fn probe(&self, tunnel: &TunnelProcess) -> Result<ProbeSession> {
        let mut log = EventLogWriter::open(&self.config.log_paths())?;
        let mut harness = ProbeHarness::new(
            ProbeConfig::from_config(&self.config),
            self.loggers.create_probe_logger().await,
        );
        harness.run(tunnel, &mut log).await
    }

    /// Look up the probed tunnel, launching the test double when there is none
    async fn ensure_tunnel(&self, id: TunnelId) -> Result<Arc<TunnelProcess>> {
        if let Ok(tunnel) = self.registry.lookup(id) {
            return Ok(tunnel);
        }

        eprintln!("No tunnel process with ID {} found; launching dummy tunnel client...", id);
        let spec = self.test_double_spec()?;
        let logger = self.loggers.create_process_logger().await;
        let tunnel = match self.registry.create(id, &spec) {
            Ok(tunnel) => {
                logger.log_spawn(id, tunnel.command(), Some(tunnel.pgid()), None).await;
                tunnel
            }
            Err(e) => {
                logger.log_spawn(id, &spec.display(), None, Some(&e)).await;
                return Err(e);
            }
        };

        tokio::time::sleep(self.config.startup_delay()).await;
        eprintln!("Tunnel process with ID {} launched using dummy tunnel client.", id);
        Ok(tunnel)
    }

    /// Configured test double, or the `dummy-tunnel` binary next to this one
    pub fn test_double_spec(&self) -> Result<SpawnSpec> {
        match &self.config.test_double_cmd {
            Some(cmd) => SpawnSpec::from_command_line(cmd),
            None => {
                let exe = std::env::current_exe().with_context(|| "locating the running executable".to_string())?;
                let sibling = sibling_binary(exe, crate::defaults::TEST_DOUBLE_BIN)?;
                Ok(SpawnSpec::new(sibling.to_string_lossy().into_owned(), Vec::new()))
            }
        }
    }

    fn report_termination(&self, report: &TerminationReport) {
        for (id, error) in &report.failures {
            eprintln!("error: tunnel {}: {}", id, error);
        }
        if self.config.verbose && report.total() > 0 {
            let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(
                self.config.enable_color,
                false,
            ));
            if let Ok(text) = coordinator.display_termination(report) {
                eprintln!("{}", text);
            }
        }
    }
}

fn sibling_binary(exe: PathBuf, name: &str) -> Result<PathBuf> {
    let dir = exe
        .parent()
        .ok_or_else(|| AppError::spawn(format!("cannot locate {}: executable has no parent directory", name)))?;
    Ok(dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
}
