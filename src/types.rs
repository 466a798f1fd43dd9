//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Operator-assigned tunnel identifier, always a positive integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TunnelId(u32);

impl TunnelId {
    /// Create a tunnel id, rejecting zero
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Raw numeric value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TunnelId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let raw: u32 = s
            .parse()
            .map_err(|_| AppError::parse(format!("Invalid tunnel id: {}", s)))?;
        Self::new(raw).ok_or_else(|| AppError::parse("Tunnel id must be a positive integer"))
    }
}

/// Lifecycle of a supervised tunnel process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelState {
    /// Process started and registered
    Spawned,
    /// Process group killed or process exited; never leaves this state
    Terminated,
}

/// Signals that trigger an orchestrator shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    /// Conventional signal name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}
