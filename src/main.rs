//! Entry point for `rudp-sender`.
//!
//! Parses CLI arguments, sets up logging, and runs one transfer.  All protocol
//! work is delegated to the library; `main.rs` owns only process setup
//! (logging, signal handling, argument parsing).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use rudp_sender::config::{
    DEFAULT_ADDRESS, DEFAULT_MAX_PAYLOAD, DEFAULT_PORT, DEFAULT_TIMEOUT, DEFAULT_WINDOW_SIZE,
};
use rudp_sender::{AckMode, InputSource, Sender, SenderConfig, TransferConfig, UdpChannel};

/// Reliable file sender over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// The file to transfer; reads standard input when absent.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Destination port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Receiver address or hostname.
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Print debug messages.
    #[arg(short, long)]
    debug: bool,

    /// Enable selective acknowledgement mode.
    #[arg(short = 'k', long)]
    sack: bool,

    /// Number of packets in flight.
    #[arg(short, long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window: u32,

    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Payload bytes per packet.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    max_payload: usize,
}

impl Cli {
    fn into_config(self) -> SenderConfig {
        SenderConfig {
            address: self.address,
            port: self.port,
            input: InputSource::from_path(self.file),
            debug: self.debug,
            transfer: TransferConfig {
                window_size: self.window,
                max_payload: self.max_payload,
                ..TransferConfig::with_mode(AckMode::from_sack_flag(self.sack))
            }
            .with_timeout(Duration::from_millis(self.timeout_ms)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();

    // RUST_LOG wins; otherwise --debug picks the default level.
    let level = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    tokio::select! {
        result = run(config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            log::warn!("interrupted; transfer abandoned");
            ExitCode::from(130)
        }
    }
}

async fn run(config: SenderConfig) -> Result<()> {
    let destination = config.destination();
    let channel = UdpChannel::connect(&destination)
        .await
        .with_context(|| format!("connecting to {destination}"))?;
    log::info!("Sending {} to {}", config.input, channel.peer);

    let mut sender = Sender::new(channel, config.transfer)?;
    let report = sender.send_input(&config.input).await?;
    log::info!(
        "Transfer complete: {} bytes in {} packets, {} transmissions ({} retransmitted)",
        report.bytes,
        report.packets,
        report.transmissions,
        report.retransmissions
    );
    Ok(())
}
