//! JSON stdin/stdout bridge for interactive front ends.
//!
//! Reads one command object per line from stdin and writes response
//! objects to stdout. Diagnostics go to stderr so the protocol stream
//! stays clean.

use std::io::{BufRead, Write};

use clap::Parser;

use tickmatch::bridge::Bridge;
use tickmatch::engine::pin_to_core;

#[derive(Parser, Debug)]
#[command(name = "bridge", about = "Line-oriented JSON bridge to the matching engine")]
struct Args {
    /// Pin the bridge to a CPU core
    #[arg(long)]
    pin_core: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Some(core) = args.pin_core {
        pin_to_core(core);
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut bridge = Bridge::new();
    serde_json::to_writer(&mut out, &Bridge::ready())?;
    out.write_all(b"\n")?;
    out.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        for response in bridge.handle_line(&line) {
            serde_json::to_writer(&mut out, &response)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    Ok(())
}
