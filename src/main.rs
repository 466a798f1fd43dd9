//! Tunnel Manager - Main CLI Application
//!
//! Supervises network-emulation tunnel processes driven by a line-oriented
//! control protocol on stdin, or runs the automatic latency probe.

use clap::Parser;
use std::process;
use tunnel_harness::{cli::Cli, config::parser::load_config, error::ErrorReporter, App};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        process::exit(0);
    }

    if let Err(message) = cli.validate() {
        eprintln!("error: {}", message);
        process::exit(1);
    }

    let use_color = cli.use_colors();
    let verbose = cli.verbose || cli.debug;

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            ErrorReporter::new(use_color, verbose).report_error(&e);
            process::exit(e.exit_code());
        }
    };

    let reporter = ErrorReporter::new(config.enable_color, verbose);
    let code = match App::new(config).run().await {
        Ok(()) => 0,
        Err(e) => {
            reporter.report_error(&e);
            e.exit_code()
        }
    };

    // Exit explicitly: the stdin reader may still be parked on a blocking read.
    process::exit(code);
}
