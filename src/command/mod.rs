//! Control protocol: parsing and dispatch of operator commands
//!
//! Each non-blank control line parses into exactly one [`Command`]. Anything
//! that is not a recognized verb becomes [`Command::Unrecognized`], so the
//! dispatcher never falls through string comparisons.

pub mod dispatcher;
pub mod expand;

pub use dispatcher::{Dispatcher, Flow};

use crate::defaults;
use crate::error::{AppError, Result};
use crate::types::TunnelId;
use expand::EnvExpander;

const TUNNEL_USAGE: &str = "tunnel ID CMD...";
const READLINE_USAGE: &str = "tunnel ID readline";
const PROMPT_USAGE: &str = "prompt PROMPT";
const HALT_USAGE: &str = "halt";

/// One parsed control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a tunnel endpoint; `argv` is already expanded
    Spawn { id: TunnelId, argv: Vec<String> },
    /// Forward a `python ...` statement line to the tunnel's input
    Python { id: TunnelId, statement: String },
    /// Read one line from the tunnel's output
    ReadLine { id: TunnelId },
    /// Set the echo prefix
    Prompt { text: String },
    /// Terminate everything and exit
    Halt,
    /// `tunnel ID` followed by a sub-verb nobody handles
    UnknownTunnelCommand { rest: String },
    /// Not a recognized verb at all
    Unrecognized { line: String },
}

impl Command {
    /// Verb name for logging
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Python { .. } => "python",
            Self::ReadLine { .. } => "readline",
            Self::Prompt { .. } => "prompt",
            Self::Halt => "halt",
            Self::UnknownTunnelCommand { .. } | Self::Unrecognized { .. } => "unknown",
        }
    }
}

/// Turns control lines into [`Command`] values
#[derive(Debug, Clone)]
pub struct CommandParser {
    launchers: Vec<String>,
    expander: EnvExpander,
    home: Option<String>,
}

impl CommandParser {
    /// Parser recognizing the given launcher sub-verbs
    pub fn new(launchers: Vec<String>) -> Result<Self> {
        Ok(Self {
            launchers,
            expander: EnvExpander::new()?,
            home: expand::home_dir(),
        })
    }

    /// Parser with the stock `mm-tunnelclient` / `mm-tunnelserver` launchers
    pub fn with_default_launchers() -> Result<Self> {
        Self::new(defaults::DEFAULT_LAUNCHERS.iter().map(|s| s.to_string()).collect())
    }

    /// Override the home directory used for `~` expansion
    pub fn with_home(mut self, home: Option<String>) -> Self {
        self.home = home;
        self
    }

    pub fn launchers(&self) -> &[String] {
        &self.launchers
    }

    /// Parse one control line.
    ///
    /// Blank lines yield `Ok(None)`. Argument errors are `MalformedCommand`
    /// carrying the expected usage.
    pub fn parse(&self, line: &str) -> Result<Option<Command>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match verb {
            "tunnel" => self.parse_tunnel(args)?,
            "prompt" => match args {
                [text] => Command::Prompt { text: text.to_string() },
                _ => return Err(AppError::malformed(PROMPT_USAGE)),
            },
            "halt" => {
                if !args.is_empty() {
                    return Err(AppError::malformed(HALT_USAGE));
                }
                Command::Halt
            }
            _ => Command::Unrecognized {
                line: line.trim().to_string(),
            },
        };
        Ok(Some(command))
    }

    fn parse_tunnel(&self, args: &[&str]) -> Result<Command> {
        if args.len() < 2 {
            return Err(AppError::malformed(TUNNEL_USAGE));
        }
        let id: TunnelId = args[0]
            .parse()
            .map_err(|_| AppError::malformed(TUNNEL_USAGE))?;

        let rest = &args[1..];
        let joined = rest.join(" ");
        let sub_verb = rest[0];

        if self.launchers.iter().any(|l| l == sub_verb) {
            let argv = expand::prepare_launch_argv(
                &self.expander,
                &joined,
                defaults::LOG_PATH_OPTIONS,
                expand::process_env,
                self.home.as_deref(),
            );
            return Ok(Command::Spawn { id, argv });
        }

        match sub_verb {
            "python" => Ok(Command::Python { id, statement: joined }),
            "readline" => {
                if rest.len() != 1 {
                    return Err(AppError::malformed(READLINE_USAGE));
                }
                Ok(Command::ReadLine { id })
            }
            _ => Ok(Command::UnknownTunnelCommand { rest: joined }),
        }
    }
}
