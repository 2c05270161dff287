//! Sender configuration.
//!
//! [`SenderConfig`] is the process-level surface (where to send, what to
//! send, how chatty to be).  [`TransferConfig`] is the part the reliability
//! engine consumes; it is the only piece [`crate::sender::Sender`] sees.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::packet::{FRAME_OVERHEAD, MAX_DATAGRAM};

/// Receiver port used when none is given.
pub const DEFAULT_PORT: u16 = 33122;

/// Receiver host used when none is given.
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Number of packets that may be outstanding at once.
pub const DEFAULT_WINDOW_SIZE: u32 = 5;

/// Fixed retransmission timeout (not adapted to measured RTT).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Bounded wait for one inbound datagram per loop iteration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Payload bytes per packet.
pub const DEFAULT_MAX_PAYLOAD: usize = 1400;

// ---------------------------------------------------------------------------
// AckMode
// ---------------------------------------------------------------------------

/// How the receiver acknowledges, and therefore how the sender recovers loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Cumulative acks; a timeout resends the whole outstanding run.
    #[default]
    GoBackN,
    /// Cumulative acks plus a selective list; a timeout resends only the
    /// packets the receiver has not confirmed.
    Selective,
}

impl AckMode {
    pub fn from_sack_flag(sack: bool) -> Self {
        if sack {
            AckMode::Selective
        } else {
            AckMode::GoBackN
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckMode::GoBackN => f.write_str("go-back-n"),
            AckMode::Selective => f.write_str("sack"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferConfig
// ---------------------------------------------------------------------------

/// Tuning for one transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub mode: AckMode,
    pub window_size: u32,
    /// Age after which an unacknowledged packet is resent.
    pub timeout: Duration,
    /// Upper bound on one channel poll.  Must be shorter than `timeout` so
    /// timeouts are checked several times per RTO.
    pub poll_interval: Duration,
    pub max_payload: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            mode: AckMode::GoBackN,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl TransferConfig {
    /// Defaults with the given acknowledgement mode.
    pub fn with_mode(mode: AckMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Replace the retransmission timeout, shrinking the poll interval so it
    /// stays below a fifth of the timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL.min(timeout / 5),
            ..self
        }
    }

    /// Reject settings the sender loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.max_payload == 0 {
            return Err(ConfigError::ZeroPayload);
        }
        if self.max_payload.saturating_add(FRAME_OVERHEAD) > MAX_DATAGRAM {
            return Err(ConfigError::PayloadTooLarge(self.max_payload));
        }
        if self.poll_interval >= self.timeout {
            return Err(ConfigError::PollNotShorter {
                poll: self.poll_interval,
                timeout: self.timeout,
            });
        }
        Ok(())
    }
}

/// Invalid [`TransferConfig`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("max payload must be at least 1 byte")]
    ZeroPayload,
    #[error("max payload of {0} bytes does not fit in a {MAX_DATAGRAM}-byte datagram")]
    PayloadTooLarge(usize),
    #[error("poll interval {poll:?} must be shorter than the retransmission timeout {timeout:?}")]
    PollNotShorter { poll: Duration, timeout: Duration },
}

// ---------------------------------------------------------------------------
// InputSource
// ---------------------------------------------------------------------------

/// Where the byte stream to transfer comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputSource {
    #[default]
    Stdin,
    File(PathBuf),
}

impl InputSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(InputSource::Stdin, InputSource::File)
    }

    /// Read the whole stream into memory.
    ///
    /// Segmentation happens once, up front, so the sender needs every byte
    /// before the first packet goes out.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            InputSource::Stdin => {
                let mut buf = Vec::new();
                tokio::io::stdin().read_to_end(&mut buf).await?;
                Ok(buf)
            }
            InputSource::File(path) => tokio::fs::read(path).await,
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => f.write_str("<stdin>"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// SenderConfig
// ---------------------------------------------------------------------------

/// Everything the `rudp-sender` binary needs to run one transfer.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Receiver host name or IP literal.
    pub address: String,
    pub port: u16,
    pub input: InputSource,
    /// Lower the default log level to `debug`.
    pub debug: bool,
    pub transfer: TransferConfig,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            input: InputSource::Stdin,
            debug: false,
            transfer: TransferConfig::default(),
        }
    }
}

impl SenderConfig {
    /// `host:port` form suitable for address resolution.
    pub fn destination(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            // Bare IPv6 literal.
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}
