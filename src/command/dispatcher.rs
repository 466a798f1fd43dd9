//! Command dispatcher: routes control lines to the process registry

use super::{Command, CommandParser};
use crate::error::{AppError, Result};
use crate::logging::ProcessLogger;
use crate::tunnel::{ProcessRegistry, SpawnSpec, TerminationReport};
use crate::types::TunnelId;
use std::fmt::Display;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// What the control loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Every tunnel has been terminated; the caller should exit successfully
    Halt,
}

/// Interactive driver of the control protocol.
///
/// `readline` results go to `out`; echoes and every diagnostic go to `diag`.
pub struct Dispatcher {
    registry: ProcessRegistry,
    parser: CommandParser,
    logger: ProcessLogger,
    prompt: Option<String>,
    read_timeout: Option<Duration>,
    out: Box<dyn Write + Send>,
    diag: Box<dyn Write + Send>,
}

impl Dispatcher {
    /// Dispatcher writing to the process stdout/stderr
    pub fn new(registry: ProcessRegistry, parser: CommandParser, logger: ProcessLogger) -> Self {
        Self {
            registry,
            parser,
            logger,
            prompt: None,
            read_timeout: None,
            out: Box::new(std::io::stdout()),
            diag: Box::new(std::io::stderr()),
        }
    }

    /// Redirect the output and diagnostic streams
    pub fn with_output(mut self, out: Box<dyn Write + Send>, diag: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self.diag = diag;
        self
    }

    /// Bound `readline` waits
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Read control lines until `halt` or end of input.
    ///
    /// End of input is handled like `halt`. A line that is not valid UTF-8 is
    /// reported and skipped. A failure to read the control stream itself still
    /// terminates every tunnel before the error is returned.
    pub async fn run<R>(&mut self, mut input: R) -> Result<TerminationReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = match input.read_until(b'\n', &mut buf).await {
                Ok(read) => read,
                Err(e) => {
                    self.halt("control stream error").await;
                    return Err(AppError::io(format!("reading control stream: {}", e)));
                }
            };
            if read == 0 {
                return Ok(self.halt("end of input").await);
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    let error = AppError::parse("control line is not valid UTF-8");
                    self.report(&error);
                    continue;
                }
            };
            if self.handle_line(line).await == Flow::Halt {
                return Ok(self.halt("halt").await);
            }
        }
    }

    /// Echo, parse and execute one control line
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Flow::Continue;
        }

        let echo = match &self.prompt {
            Some(prompt) => format!("{} {}", prompt, trimmed),
            None => trimmed.to_string(),
        };
        self.diag(echo);

        match self.parser.parse(trimmed) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Flow::Continue,
            Err(e) => {
                self.report(&e);
                Flow::Continue
            }
        }
    }

    /// Execute one parsed command
    pub async fn execute(&mut self, command: Command) -> Flow {
        let result = match command {
            Command::Spawn { id, argv } => self.spawn(id, argv).await,
            Command::Python { id, statement } => self.forward(id, &statement).await,
            Command::ReadLine { id } => self.read_line(id).await,
            Command::Prompt { text } => {
                self.prompt = Some(text);
                Ok(())
            }
            Command::Halt => return Flow::Halt,
            Command::UnknownTunnelCommand { rest } => {
                self.diag(format_args!("unknown command after \"tunnel ID\": {}", rest));
                Ok(())
            }
            Command::Unrecognized { line } => {
                self.diag(format_args!("unknown command: {}", line));
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report(&e);
        }
        Flow::Continue
    }

    /// Terminate every tunnel, logging the outcome
    pub async fn halt(&mut self, reason: &str) -> TerminationReport {
        let report = self.registry.terminate_all();
        for (id, error) in &report.failures {
            self.diag(format_args!("error: tunnel {}: {}", id, error));
        }
        self.logger
            .log_terminate_all(reason, &report.terminated, &report.failures)
            .await;
        report
    }

    async fn spawn(&mut self, id: TunnelId, argv: Vec<String>) -> Result<()> {
        let spec = SpawnSpec::from_argv(argv)?;
        match self.registry.create(id, &spec) {
            Ok(process) => {
                self.logger
                    .log_spawn(id, process.command(), Some(process.pgid()), None)
                    .await;
                Ok(())
            }
            Err(e) => {
                self.logger.log_spawn(id, &spec.display(), None, Some(&e)).await;
                Err(e)
            }
        }
    }

    async fn forward(&mut self, id: TunnelId, statement: &str) -> Result<()> {
        let process = self.registry.lookup(id)?;
        process.send_line(statement).await?;
        self.logger.log_io(id, "->", statement).await;
        Ok(())
    }

    async fn read_line(&mut self, id: TunnelId) -> Result<()> {
        let process = self.registry.lookup(id)?;
        let line = process.read_line_within(self.read_timeout).await?;

        if line.is_empty() {
            self.diag(format_args!("tunnel {}: output closed", id));
            return Ok(());
        }

        self.logger.log_io(id, "<-", &line).await;
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| AppError::io(format!("writing readline output: {}", e)))
    }

    fn report(&mut self, error: &AppError) {
        self.diag(format_args!("error: {}", error));
    }

    fn diag<T: Display>(&mut self, message: T) {
        let _ = writeln!(self.diag, "{}", message);
        let _ = self.diag.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use std::sync::{Arc, Mutex};

    /// Writer whose contents tests can inspect afterwards
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn dispatcher(launchers: &[&str]) -> (Dispatcher, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let diag = SharedBuf::default();
        let parser = CommandParser::new(launchers.iter().map(|s| s.to_string()).collect()).unwrap();
        let dispatcher = Dispatcher::new(ProcessRegistry::new(), parser, ProcessLogger::new(&Config::default()))
            .with_output(Box::new(out.clone()), Box::new(diag.clone()));
        (dispatcher, out, diag)
    }

    fn id(raw: u32) -> TunnelId {
        TunnelId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_command_reports_once() {
        let (mut d, out, diag) = dispatcher(&["cat"]);

        assert_eq!(d.handle_line("launch the rockets").await, Flow::Continue);

        let diag = diag.contents();
        assert_eq!(diag.matches("unknown command").count(), 1);
        assert!(diag.contains("unknown command: launch the rockets"));
        assert!(out.contents().is_empty());
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn test_blank_lines_are_ignored_silently() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);
        assert_eq!(d.handle_line("   ").await, Flow::Continue);
        assert!(diag.contents().is_empty());
    }

    #[tokio::test]
    async fn test_readline_on_unknown_tunnel_does_not_block() {
        let (mut d, out, diag) = dispatcher(&["cat"]);

        let flow = tokio::time::timeout(Duration::from_secs(2), d.handle_line("tunnel 9 readline"))
            .await
            .expect("readline on an unknown tunnel must return immediately");
        assert_eq!(flow, Flow::Continue);
        assert!(diag
            .contents()
            .contains("error: tunnel 9 not found: run tunnel client or server first"));
        assert!(out.contents().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_forward_and_readline() {
        let (mut d, out, diag) = dispatcher(&["cat"]);

        d.handle_line("tunnel 1 cat").await;
        assert_eq!(d.registry().ids(), vec![id(1)]);

        d.handle_line("tunnel 1 python print('ok')").await;
        d.handle_line("tunnel 1 readline").await;
        assert_eq!(out.contents(), "python print('ok')\n");

        let diag = diag.contents();
        assert!(diag.contains("tunnel 1 cat\n"));
        assert!(!diag.contains("error"));

        assert_eq!(d.halt("test").await.terminated, vec![id(1)]);
    }

    #[tokio::test]
    async fn test_duplicate_spawn_is_reported() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);

        d.handle_line("tunnel 1 cat").await;
        d.handle_line("tunnel 1 cat").await;

        assert!(diag.contents().contains("error: tunnel 1 is already running"));
        assert_eq!(d.registry().len(), 1);
        d.halt("test").await;
    }

    #[tokio::test]
    async fn test_spawn_failure_changes_nothing() {
        let (mut d, _out, diag) = dispatcher(&["no-such-tunnel-launcher"]);

        d.handle_line("tunnel 2 no-such-tunnel-launcher --flag").await;

        assert!(diag.contents().contains("error: Spawn error: no-such-tunnel-launcher"));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_commands_report_usage() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);

        d.handle_line("tunnel x cat").await;
        d.handle_line("prompt").await;
        d.handle_line("tunnel 1 readline extra").await;
        assert_eq!(d.handle_line("halt now").await, Flow::Continue);

        let diag = diag.contents();
        assert!(diag.contains("error: usage: tunnel ID CMD..."));
        assert!(diag.contains("error: usage: prompt PROMPT"));
        assert!(diag.contains("error: usage: tunnel ID readline"));
        assert!(diag.contains("error: usage: halt"));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tunnel_sub_verb() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);
        d.handle_line("tunnel 1 ping host").await;
        assert!(diag
            .contents()
            .contains("unknown command after \"tunnel ID\": ping host"));
    }

    #[tokio::test]
    async fn test_prompt_prefixes_echoes() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);

        d.handle_line("prompt [exp1]").await;
        assert_eq!(d.prompt(), Some("[exp1]"));
        assert_eq!(d.handle_line("halt").await, Flow::Halt);

        assert_eq!(diag.contents(), "prompt [exp1]\n[exp1] halt\n");
    }

    #[tokio::test]
    async fn test_readline_timeout_is_reported() {
        let (d, out, diag) = dispatcher(&["sleep"]);
        let mut d = d.with_read_timeout(Some(Duration::from_millis(50)));

        d.handle_line("tunnel 3 sleep 30").await;
        d.handle_line("tunnel 3 readline").await;

        assert!(diag.contents().contains("error: Timeout error: no output from tunnel 3"));
        assert!(out.contents().is_empty());
        d.halt("test").await;
    }

    #[tokio::test]
    async fn test_run_halts_on_end_of_input() {
        let (mut d, out, _diag) = dispatcher(&["cat"]);
        let script: &[u8] = b"tunnel 1 cat\n\ntunnel 2 cat\ntunnel 2 python x = 1\ntunnel 2 readline\n";

        let report = d.run(script).await.unwrap();

        assert_eq!(report.terminated, vec![id(1), id(2)]);
        assert!(d.registry().is_empty());
        assert_eq!(out.contents(), "python x = 1\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let (mut d, _out, diag) = dispatcher(&["sleep"]);
        let script: &[u8] = b"tunnel 1 sleep 30\n\xff\xfe bogus\ntunnel 2 sleep 30\nhalt\n";

        let report = d.run(script).await.unwrap();

        assert_eq!(report.terminated, vec![id(1), id(2)]);
        assert!(d.registry().is_empty());
        assert!(diag.contents().contains("error: Parsing error: control line is not valid UTF-8"));
    }

    #[tokio::test]
    async fn test_run_stops_at_halt() {
        let (mut d, _out, diag) = dispatcher(&["cat"]);
        let script: &[u8] = b"tunnel 1 cat\nhalt\nnot reached\n";

        let report = d.run(script).await.unwrap();

        assert_eq!(report.terminated, vec![id(1)]);
        assert!(!diag.contents().contains("not reached"));
    }
}
