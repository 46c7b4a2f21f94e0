//! Entry point for the `sender` executable.
//!
//! Parses the five positional arguments, validates them, and hands off to
//! [`stp::sender::run`].  All protocol work lives in the library; this file
//! owns only process setup (logging, argument validation, exit status).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use stp::sender::{self, SenderConfig};

/// Reliable file sender over lossy UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// UDP port the sender binds on (49152-65535).
    sender_port: u16,
    /// UDP port the receiver listens on (49152-65535).
    receiver_port: u16,
    /// File to transfer (at most 800 KB).
    filename: PathBuf,
    /// Sender window size in bytes; a positive multiple of 1000.
    max_win: u32,
    /// Retransmission timeout in milliseconds.
    rto: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let args = Args::parse();
    for port in [args.sender_port, args.receiver_port] {
        if port < 49152 {
            bail!("port {port} outside the private range 49152-65535");
        }
    }
    if args.max_win == 0 || args.max_win % 1000 != 0 {
        bail!("max_win must be a positive multiple of 1000, got {}", args.max_win);
    }

    let config = SenderConfig {
        local_port: args.sender_port,
        peer_port: args.receiver_port,
        file: args.filename,
        max_win: args.max_win,
        rto: Duration::from_millis(args.rto),
        log_path: PathBuf::from("sender_log.txt"),
        isn: None,
    };

    let stats = sender::run(config).await.context("transfer failed")?;
    log::info!(
        "transfer complete: {} bytes in {} segments ({} retransmitted)",
        stats.bytes_sent,
        stats.segments_sent,
        stats.retransmissions
    );
    Ok(())
}
