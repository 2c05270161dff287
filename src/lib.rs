//! `rudp-sender`: the sending half of a reliable transport over UDP.
//!
//! # Architecture
//!
//! ```text
//!   input bytes
//!       │
//!  ┌────▼──────┐  packets  ┌──────────────────────────────────────┐
//!  │ Segmenter │──────────▶│               Sender                 │
//!  └───────────┘           │  ┌────────────────────┐              │
//!                          │  │ TransmissionWindow │◀─ interpret ─┼── acks
//!                          │  │  send times, sacks │              │
//!                          │  └─────────▲──────────┘              │
//!                          │            └── due ── Retransmit     │
//!                          │                       Scheduler      │
//!                          └──────────────────┬───────────────────┘
//!                                             │ datagrams
//!                                      ┌──────▼──────┐
//!                                      │   Channel   │  (UDP, or a lossy
//!                                      └─────────────┘   wrapper in tests)
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format, checksum, control-message parsing
//! - [`segmenter`]: input bytes → packet sequence
//! - [`window`]: send_base / next_seqno, send times, selective acks
//! - [`ack`]: applies cumulative and selective acks to the window
//! - [`retransmit`]: per-tick timeout detection (Go-Back-N or selective)
//! - [`sender`]: the loop tying it all together
//! - [`state`]: sender state machine
//! - [`channel`]: datagram channel trait and tokio UDP implementation
//! - [`simulator`]: fault-injecting channel wrapper
//! - [`config`]: configuration and defaults

pub mod ack;
pub mod channel;
pub mod config;
pub mod packet;
pub mod retransmit;
pub mod segmenter;
pub mod sender;
pub mod simulator;
pub mod state;
pub mod window;

pub use channel::{Channel, ChannelError, UdpChannel};
pub use config::{AckMode, InputSource, SenderConfig, TransferConfig};
pub use packet::{ControlMessage, Packet, PacketError, PacketType};
pub use sender::{Sender, SenderError, TransferReport};
