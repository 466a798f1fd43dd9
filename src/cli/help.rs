//! Command-line help system with control-protocol reference and examples
//!
//! Topic pages cover the interactive command set, the auto-test mode, the
//! configuration variables and the event log formats.

use crate::config::env::EnvManager;
use colored::*;

const TOPICS: &[&str] = &["commands", "auto-test", "config", "logs", "examples"];

/// Help system for the CLI application
pub struct HelpSystem {
    platform: String,
}

impl HelpSystem {
    /// Create a new help system
    pub fn new() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
        }
    }

    /// Names accepted by `--help-topic`
    pub fn topics() -> &'static [&'static str] {
        TOPICS
    }

    /// Display the main help message with all available options
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();

        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_usage_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_options_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_commands_help(use_colors));
        help.push('\n');
        help.push_str(&self.format_footer(use_colors));

        help
    }

    /// Display help for one topic; `None` for an unknown topic
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "commands" | "protocol" => Some(self.format_commands_help(use_colors)),
            "auto-test" | "autotest" | "probe" => Some(self.format_auto_test_help(use_colors)),
            "config" | "env" | "environment" => Some(self.format_configuration_help(use_colors)),
            "logs" | "log" => Some(self.format_logs_help(use_colors)),
            "examples" => Some(self.format_examples_section(use_colors)),
            _ => None,
        }
    }

    fn section(&self, title: &str, use_colors: bool) -> String {
        if use_colors {
            title.bright_green().bold().to_string()
        } else {
            title.to_string()
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "Tunnel Manager";
        let subtitle = "Supervise network-emulation tunnels and measure probe round trips";
        let version = env!("CARGO_PKG_VERSION");

        if use_colors {
            format!(
                "{}\n{}\nVersion: {} | Platform: {}\n",
                title.bright_cyan().bold(),
                subtitle.bright_blue(),
                version.green(),
                self.platform.yellow()
            )
        } else {
            format!("{}\n{}\nVersion: {} | Platform: {}\n", title, subtitle, version, self.platform)
        }
    }

    fn format_usage_section(&self, use_colors: bool) -> String {
        let patterns = [
            "tunnel-manager [OPTIONS] < commands.txt",
            "tunnel-manager --auto-test [--duration SECS] [--interval SECS] [OPTIONS]",
            "tunnel-manager --help-topic <TOPIC>",
        ];

        let mut usage = format!("{}\n", self.section("USAGE:", use_colors));
        for pattern in patterns {
            if use_colors {
                usage.push_str(&format!("  {}\n", pattern.bright_white()));
            } else {
                usage.push_str(&format!("  {}\n", pattern));
            }
        }
        usage
    }

    fn format_options_section(&self, use_colors: bool) -> String {
        let options = [
            OptionHelp::new("auto-test", "", "Probe one tunnel for a fixed duration, then exit"),
            OptionHelp::new("duration", "<SECS>", "Auto-test duration (default 60)"),
            OptionHelp::new("interval", "<SECS>", "Delay between probes (default 0.1, 0 allowed)"),
            OptionHelp::new("tunnel-id", "<ID>", "Tunnel probed in auto-test mode (default 1)"),
            OptionHelp::new("log-dir", "<DIR>", "Event log directory (default experiment_logs)"),
            OptionHelp::new("read-timeout-ms", "<MS>", "Bound readline and ack reads (default: none)"),
            OptionHelp::new("test-double", "<CMD>", "Tunnel launched when auto-test finds none")
                .with_example("--test-double 'dummy-tunnel --delay-ms 50'"),
            OptionHelp::new("directive", "<LINE>", "Probe line sent to the tunnel (default send_packet)"),
            OptionHelp::new("color", "", "Force colored output"),
            OptionHelp::new("no-color", "", "Disable colored output"),
            OptionHelp::new("verbose", "", "Info-level diagnostics and per-second loss table"),
            OptionHelp::new("debug", "", "Debug diagnostics as JSON, build info"),
            OptionHelp::new("help-topic", "<TOPIC>", "Detailed help: commands, auto-test, config, logs, examples"),
        ];

        let mut output = format!("{}\n", self.section("OPTIONS:", use_colors));
        for option in &options {
            output.push_str(&option.format(use_colors));
            output.push('\n');
        }
        output
    }

    /// Control protocol reference
    fn format_commands_help(&self, use_colors: bool) -> String {
        let commands = [
            (
                "tunnel ID LAUNCHER ARGS...",
                "Start a tunnel endpoint under ID. LAUNCHER is one of the configured launchers \
                 (mm-tunnelclient, mm-tunnelserver). $VAR references are expanded and a leading ~ \
                 in --ingress-log=/--egress-log= values is replaced by the home directory.",
            ),
            ("tunnel ID python STMT...", "Forward 'python STMT...' as one line to tunnel ID."),
            ("tunnel ID readline", "Read one line from tunnel ID and print it on stdout."),
            ("prompt TEXT", "Prefix echoed before every following command."),
            ("halt", "Terminate every tunnel and exit 0. End of input does the same."),
        ];

        let mut help = format!("{}\n", self.section("CONTROL COMMANDS:", use_colors));
        help.push_str("One command per line on stdin. Each line is echoed to stderr before it runs.\n\n");
        for (syntax, description) in commands {
            if use_colors {
                help.push_str(&format!("  {}\n      {}\n", syntax.bright_cyan(), description));
            } else {
                help.push_str(&format!("  {}\n      {}\n", syntax, description));
            }
        }
        help.push_str("\nErrors are reported as 'error: ...' on stderr and never stop the manager.\n");
        help
    }

    fn format_auto_test_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", self.section("AUTO-TEST MODE:", use_colors));

        help.push_str("Every interval the manager:\n");
        help.push_str("  1. records the send time in sent.log\n");
        help.push_str("  2. writes the probe directive to the tunnel\n");
        help.push_str("  3. waits for one acknowledgement line\n");
        help.push_str("  4. records the ack time in recv.log and the round trip in rttevents.log\n\n");

        help.push_str("An empty or timed-out acknowledgement is reported and the session continues.\n");
        help.push_str("A failed write ends the session early.\n\n");

        help.push_str(&format!(
            "When no tunnel is registered under the probed id, '{}' is started next to\n",
            crate::defaults::TEST_DOUBLE_BIN
        ));
        help.push_str("the manager binary (override with --test-double) and given a short settle delay.\n");
        help.push_str("Launch failures exit with status 2.\n");

        help
    }

    fn format_configuration_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", self.section("CONFIGURATION REFERENCE:", use_colors));

        help.push_str("CONFIGURATION PRIORITY (highest to lowest):\n");
        help.push_str("1. Command-line arguments\n");
        help.push_str("2. Environment variables\n");
        help.push_str("3. .env file in the current directory\n");
        help.push_str("4. Default values\n\n");

        help.push_str("SUPPORTED VARIABLES:\n");
        for (var_name, description, example) in EnvManager::get_supported_env_vars() {
            if use_colors {
                help.push_str(&format!(
                    "{}:\n  {}\n  Example: {}\n\n",
                    var_name.bright_yellow().bold(),
                    description,
                    example.bright_blue().italic()
                ));
            } else {
                help.push_str(&format!("{}:\n  {}\n  Example: {}\n\n", var_name, description, example));
            }
        }

        help.push_str("EXAMPLE .env FILE:\n");
        help.push_str(&EnvManager::create_example_env_content());
        help
    }

    fn format_logs_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", self.section("EVENT LOGS:", use_colors));

        help.push_str("Files are appended to and created when missing.\n\n");
        help.push_str(&format!(
            "  {:<14} send timestamp per probe            e.g. 1700000000.123456\n",
            crate::defaults::SENT_LOG_NAME
        ));
        help.push_str(&format!(
            "  {:<14} ack timestamp per acknowledgement   e.g. 1700000000.145678\n",
            crate::defaults::RECV_LOG_NAME
        ));
        help.push_str(&format!(
            "  {:<14} send_ts ack_ts rtt_ms               e.g. 1700000000.123456 1700000000.145678 22.2220\n",
            crate::defaults::RTT_LOG_NAME
        ));
        help.push_str("\nTimestamps are Unix seconds with six decimals; RTTs are milliseconds with four.\n");
        help.push_str("Readers skip blank lines and lines starting with '#'.\n");
        help
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Scripted session",
                command: "printf 'tunnel 1 mm-tunnelclient --ingress-log=~/in.log\\ntunnel 1 readline\\nhalt\\n' | tunnel-manager",
                description: "Start a tunnel client, print its first output line, shut down",
            },
            ExampleHelp {
                title: "Ten-second latency probe",
                command: "tunnel-manager --auto-test --duration 10 --interval 0.05",
                description: "Probe the built-in test double every 50 ms",
            },
            ExampleHelp {
                title: "Bounded reads with a custom endpoint",
                command: "tunnel-manager --auto-test --test-double ./my-endpoint --read-timeout-ms 500 --verbose",
                description: "Count acks slower than 500 ms as missing and show per-second loss",
            },
        ];

        let mut output = format!("{}\n", self.section("EXAMPLES:", use_colors));
        for example in &examples {
            output.push_str(&example.format(use_colors));
            output.push('\n');
        }
        output
    }

    fn format_footer(&self, use_colors: bool) -> String {
        let mut footer = format!("{}\n", self.section("ADDITIONAL HELP:", use_colors));
        for topic in TOPICS {
            let command = format!("--help-topic {}", topic);
            if use_colors {
                footer.push_str(&format!("  {}\n", command.bright_yellow()));
            } else {
                footer.push_str(&format!("  {}\n", command));
            }
        }
        footer
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for formatting individual options
struct OptionHelp {
    long: &'static str,
    value: &'static str,
    description: &'static str,
    example: Option<&'static str>,
}

impl OptionHelp {
    fn new(long: &'static str, value: &'static str, description: &'static str) -> Self {
        Self {
            long,
            value,
            description,
            example: None,
        }
    }

    fn with_example(mut self, example: &'static str) -> Self {
        self.example = Some(example);
        self
    }

    fn format(&self, use_colors: bool) -> String {
        let long_with_value = if self.value.is_empty() {
            format!("--{}", self.long)
        } else {
            format!("--{} {}", self.long, self.value)
        };

        let mut option_str = if use_colors {
            format!("  {:<28} {}", long_with_value.bright_cyan(), self.description)
        } else {
            format!("  {:<28} {}", long_with_value, self.description)
        };

        if let Some(example) = self.example {
            if use_colors {
                option_str.push_str(&format!(
                    "\n{}{}",
                    " ".repeat(31),
                    format!("Example: {}", example).bright_blue().italic()
                ));
            } else {
                option_str.push_str(&format!("\n{}Example: {}", " ".repeat(31), example));
            }
        }

        option_str
    }
}

/// Helper struct for formatting examples
struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}:\n    {}\n    {}\n",
                self.title.bright_yellow().bold(),
                self.command.bright_white(),
                self.description.bright_blue().italic()
            )
        } else {
            format!("  {}:\n    {}\n    {}\n", self.title, self.command, self.description)
        }
    }
}
