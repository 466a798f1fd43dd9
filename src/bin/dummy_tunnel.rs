//! Dummy tunnel endpoint
//!
//! Answers every line on stdin with one acknowledgement line after a fixed
//! delay and exits at end of input. Stands in for a real tunnel client in
//! auto-test mode.

use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "dummy-tunnel")]
#[command(version, about = "Test-double tunnel endpoint that acknowledges every line")]
struct Args {
    /// Delay before each acknowledgement, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = tunnel_harness::defaults::DEFAULT_ACK_DELAY_MS)]
    delay_ms: u64,

    /// Acknowledgement text
    #[arg(long, value_name = "TEXT", default_value = "ACK")]
    reply: String,

    /// Answer every Nth line with an empty line instead
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    drop_every: Option<u64>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let delay = Duration::from_millis(args.delay_ms);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut seen: u64 = 0;

    while lines.next_line().await?.is_some() {
        seen += 1;
        tokio::time::sleep(delay).await;

        let dropped = args.drop_every.is_some_and(|n| seen % n == 0);
        let reply = if dropped { "" } else { args.reply.as_str() };
        stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
