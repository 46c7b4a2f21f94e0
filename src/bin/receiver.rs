//! Entry point for the `receiver` executable.
//!
//! Parses the five positional arguments, validates them, and hands off to
//! [`stp::receiver::run`].  All protocol work lives in the library; this
//! file owns only process setup (logging, argument validation, exit status).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use stp::loss::LossChannel;
use stp::receiver::{self, ReceiverConfig};

/// Receiving endpoint with an emulated lossy channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// UDP port the receiver binds on (49152-65535).
    receiver_port: u16,
    /// UDP port the sender transmits from (49152-65535).
    sender_port: u16,
    /// File the received bytes are written to.
    filename: PathBuf,
    /// Forward loss probability for DATA/SYN/FIN segments, in [0, 1].
    flp: f64,
    /// Reverse loss probability for ACK segments, in [0, 1].
    rlp: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let args = Args::parse();
    for port in [args.receiver_port, args.sender_port] {
        if port < 49152 {
            bail!("port {port} outside the private range 49152-65535");
        }
    }
    for (name, p) in [("flp", args.flp), ("rlp", args.rlp)] {
        if !(0.0..=1.0).contains(&p) {
            bail!("{name} must lie in [0, 1], got {p}");
        }
    }

    let config = ReceiverConfig {
        local_port: args.receiver_port,
        peer_port: args.sender_port,
        file: args.filename,
        log_path: PathBuf::from("receiver_log.txt"),
    };

    let stats = receiver::run(config, LossChannel::new(args.flp, args.rlp))
        .await
        .context("reception failed")?;
    log::info!(
        "reception complete: {} bytes in {} segments ({} dropped, {} duplicates)",
        stats.bytes_received,
        stats.segments_received,
        stats.data_dropped,
        stats.dup_segments
    );
    Ok(())
}
