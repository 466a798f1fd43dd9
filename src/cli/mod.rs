//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use clap::Parser;

/// Tunnel Manager - supervise emulation tunnels and measure probe round trips
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tunnel-manager")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Run the automatic latency test against one tunnel, then exit
    #[arg(long)]
    pub auto_test: bool,

    /// Auto-test duration in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_positive_secs)]
    pub duration: Option<f64>,

    /// Seconds between probe packets (0 sends back to back)
    #[arg(long, value_name = "SECS", value_parser = parse_interval_secs)]
    pub interval: Option<f64>,

    /// Tunnel probed in auto-test mode
    #[arg(long, value_name = "ID", value_parser = clap::value_parser!(u32).range(1..))]
    pub tunnel_id: Option<u32>,

    /// Directory for sent.log, recv.log and rttevents.log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<String>,

    /// Bound on readline and acknowledgement reads (unbounded by default)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_ms: Option<u64>,

    /// Command line of the tunnel launched when auto-test finds none
    #[arg(long, value_name = "CMD")]
    pub test_double: Option<String>,

    /// Line written to the tunnel for every probe
    #[arg(long, value_name = "LINE")]
    pub directive: Option<String>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for specific topic (commands, auto-test, config, logs)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if !self.auto_test {
            let auto_only = [
                ("--duration", self.duration.is_some()),
                ("--interval", self.interval.is_some()),
                ("--tunnel-id", self.tunnel_id.is_some()),
                ("--test-double", self.test_double.is_some()),
                ("--directive", self.directive.is_some()),
            ];
            if let Some((flag, _)) = auto_only.iter().find(|(_, set)| *set) {
                return Err(format!("{} requires --auto-test to be specified", flag));
            }
        }

        if let Some(directive) = &self.directive {
            if directive.trim().is_empty() {
                return Err("--directive cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Check if help should be displayed for a specific topic
    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Color preference from flags; `None` leaves it to configuration
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        self.color_override().unwrap_or_else(supports_color)
    }

    /// Display help for the specified topic or main help
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        if let Some(topic) = &self.help_topic {
            help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                    topic,
                    HelpSystem::topics().join(", "),
                    help_system.display_main_help(use_colors)
                )
            })
        } else {
            help_system.display_main_help(use_colors)
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Configuration Summary:\n");
        summary.push_str(&format!("  Mode: {}\n", if self.auto_test { "auto-test" } else { "interactive" }));
        if let Some(duration) = self.duration {
            summary.push_str(&format!("  Duration: {}s\n", duration));
        }
        if let Some(interval) = self.interval {
            summary.push_str(&format!("  Interval: {}s\n", interval));
        }
        if let Some(id) = self.tunnel_id {
            summary.push_str(&format!("  Tunnel id: {}\n", id));
        }
        if let Some(dir) = &self.log_dir {
            summary.push_str(&format!("  Log directory: {}\n", dir));
        }
        if let Some(ms) = self.read_timeout_ms {
            summary.push_str(&format!("  Read timeout: {}ms\n", ms));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

fn parse_secs(s: &str) -> Result<f64, String> {
    let secs: f64 = s.trim().parse().map_err(|_| format!("Invalid number of seconds: {}", s))?;
    if !secs.is_finite() {
        return Err(format!("Invalid number of seconds: {}", s));
    }
    Ok(secs)
}

/// Duration in fractional seconds, strictly positive
fn parse_positive_secs(s: &str) -> Result<f64, String> {
    let secs = parse_secs(s)?;
    if secs <= 0.0 {
        return Err("Duration must be greater than 0".to_string());
    }
    Ok(secs)
}

/// Interval in fractional seconds, zero allowed
fn parse_interval_secs(s: &str) -> Result<f64, String> {
    let secs = parse_secs(s)?;
    if secs < 0.0 {
        return Err("Interval cannot be negative".to_string());
    }
    Ok(secs)
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    true
}
