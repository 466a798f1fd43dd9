//! Data models and structures for the tunnel harness

pub mod config;

// Re-export main model types
pub use config::Config;
