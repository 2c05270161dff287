//! The sender loop.
//!
//! [`Sender`] drives one transfer from raw bytes to a fully acknowledged
//! packet sequence:
//!
//! ```text
//!  SEGMENTING   segment input once, encode every packet
//!      │
//!      ▼
//!  TRANSMITTING / DRAINING   repeat while send_base < packet_count:
//!      │   1. send every open slot
//!      │   2. poll the channel once (bounded by poll_interval)
//!      │   3. valid ack → interpreter; corrupted / malformed → discard
//!      │   4. resend whatever the scheduler reports as timed out
//!      ▼
//!  DONE
//! ```
//!
//! All state lives in this one task.  An ack received in an iteration is
//! applied before that iteration's timeout check, so a packet acknowledged
//! in the same tick is never resent.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::ack::{self, AckOutcome};
use crate::channel::{Channel, ChannelError};
use crate::config::{ConfigError, InputSource, TransferConfig};
use crate::packet::{ControlMessage, PacketError, PacketType};
use crate::retransmit::RetransmitScheduler;
use crate::segmenter::segment;
use crate::state::SenderState;
use crate::window::TransmissionWindow;

// ---------------------------------------------------------------------------
// Errors and report
// ---------------------------------------------------------------------------

/// Fatal sender errors.  Lossy-network conditions never end up here.
#[derive(Debug, Error)]
pub enum SenderError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot read input {input}: {error}")]
    Input {
        input: String,
        #[source]
        error: std::io::Error,
    },
    #[error("input of {0} bytes needs more packets than seqnos can address")]
    TooLarge(usize),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub packets: u32,
    pub bytes: usize,
    /// Every datagram handed to the channel, first sends included.
    pub transmissions: u64,
    pub retransmissions: u64,
    pub fresh_acks: u64,
    pub duplicate_acks: u64,
    /// Cumulative acks below the base.
    pub ignored_acks: u64,
    /// SACKs that only added selective information.
    pub selective_only: u64,
    pub corrupted: u64,
    pub malformed: u64,
    pub elapsed: Duration,
}

/// A pre-encoded packet, ready to hand to the channel any number of times.
struct Frame {
    kind: PacketType,
    datagram: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Reliable sender over an unreliable [`Channel`].
pub struct Sender<C> {
    channel: C,
    config: TransferConfig,
    scheduler: RetransmitScheduler,
    state: SenderState,
    report: TransferReport,
}

impl<C: Channel> Sender<C> {
    /// Build a sender after checking `config`.
    pub fn new(channel: C, config: TransferConfig) -> Result<Self, SenderError> {
        config.validate()?;
        let scheduler = RetransmitScheduler::new(config.mode, config.timeout);
        Ok(Self {
            channel,
            config,
            scheduler,
            state: SenderState::Segmenting,
            report: TransferReport::default(),
        })
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Read `input` completely, then transfer it.
    ///
    /// An unreadable input fails here, before any packet is sent.
    pub async fn send_input(&mut self, input: &InputSource) -> Result<TransferReport, SenderError> {
        self.state = SenderState::Segmenting;
        let data = input.read().await.map_err(|error| SenderError::Input {
            input: input.to_string(),
            error,
        })?;
        log::info!("[sender] read {} byte(s) from {input}", data.len());
        self.run(&data).await
    }

    /// Deliver `data` and return once every packet is acknowledged.
    ///
    /// Never gives up on its own: retransmission continues until the window
    /// drains.  Drop the future to abort.
    pub async fn run(&mut self, data: &[u8]) -> Result<TransferReport, SenderError> {
        let started = Instant::now();
        self.report = TransferReport {
            bytes: data.len(),
            ..TransferReport::default()
        };
        self.transition(SenderState::Segmenting);

        let frames: Vec<Frame> = segment(data, self.config.max_payload)
            .into_iter()
            .map(|p| Frame {
                kind: p.kind,
                datagram: p.encode(),
            })
            .collect();
        let count = u32::try_from(frames.len()).map_err(|_| SenderError::TooLarge(data.len()))?;
        self.report.packets = count;
        log::info!(
            "[sender] {} byte(s) → {count} packet(s); window={} mode={} timeout={:?}",
            data.len(),
            self.config.window_size,
            self.config.mode,
            self.config.timeout
        );

        let mut window = TransmissionWindow::new(count, self.config.window_size);
        self.transition(SenderState::Transmitting);

        while !window.is_drained() {
            self.fill_window(&mut window, &frames).await?;
            if window.all_sent() {
                self.transition(SenderState::Draining);
            }
            self.poll(&mut window).await?;
            self.retransmit_expired(&mut window, &frames).await?;
        }

        self.transition(SenderState::Done);
        self.report.elapsed = started.elapsed();
        log::info!(
            "[sender] all {count} packet(s) acknowledged in {:?} ({} retransmission(s))",
            self.report.elapsed,
            self.report.retransmissions
        );
        Ok(self.report.clone())
    }

    // -----------------------------------------------------------------------
    // Loop steps
    // -----------------------------------------------------------------------

    /// Step 1: first transmission of every slot the window allows.
    async fn fill_window(
        &mut self,
        window: &mut TransmissionWindow,
        frames: &[Frame],
    ) -> Result<(), SenderError> {
        for seqno in window.open_slots() {
            self.transmit(window, frames, seqno).await?;
            window.mark_sent(seqno);
            log::debug!(
                "[sender] → {} seqno={seqno} in_flight={}",
                frames[seqno as usize].kind,
                window.outstanding()
            );
        }
        Ok(())
    }

    /// Steps 2 and 3: wait briefly for one control message and apply it.
    async fn poll(&mut self, window: &mut TransmissionWindow) -> Result<(), SenderError> {
        let Some(raw) = self.channel.receive(self.config.poll_interval).await? else {
            return Ok(());
        };

        match ControlMessage::parse(&raw, self.config.mode) {
            Ok(msg) => self.on_control(window, &msg),
            Err(PacketError::Corrupted) => {
                self.report.corrupted += 1;
                log::debug!("[sender] ← corrupted control message discarded ({} bytes)", raw.len());
            }
            Err(PacketError::Malformed(reason)) => {
                self.report.malformed += 1;
                log::warn!("[sender] ← malformed control message discarded: {reason}");
            }
        }
        Ok(())
    }

    fn on_control(&mut self, window: &mut TransmissionWindow, msg: &ControlMessage) {
        match ack::interpret(window, msg) {
            AckOutcome::Advanced { from, to } => {
                self.report.fresh_acks += 1;
                if msg.cumulative() > to {
                    log::warn!(
                        "[sender] ← ack {} past next seqno; window slid {from} → {to}",
                        msg.cumulative()
                    );
                } else {
                    log::debug!("[sender] ← ack {to}; window slid {from} → {to}");
                }
            }
            AckOutcome::Duplicate(n) => {
                self.report.duplicate_acks += 1;
                log::debug!("[sender] ← duplicate ack {n}");
            }
            AckOutcome::Stale(n) => {
                self.report.ignored_acks += 1;
                log::debug!("[sender] ← stale ack {n} (base {})", window.send_base());
            }
            AckOutcome::SelectiveOnly { cum_ack, added } => {
                self.report.selective_only += 1;
                log::debug!("[sender] ← sack {cum_ack} (+{added} selective)");
            }
        }
    }

    /// Step 4: resend whatever has timed out.
    async fn retransmit_expired(
        &mut self,
        window: &mut TransmissionWindow,
        frames: &[Frame],
    ) -> Result<(), SenderError> {
        let due = self.scheduler.due(window, Instant::now());
        if due.is_empty() {
            return Ok(());
        }

        log::debug!(
            "[sender] {:?} timeout at base {} ({}); resending {:?}",
            self.scheduler.timeout(),
            window.send_base(),
            self.scheduler.mode(),
            due
        );
        for seqno in due {
            self.transmit(window, frames, seqno).await?;
            self.report.retransmissions += 1;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn transmit(
        &mut self,
        window: &mut TransmissionWindow,
        frames: &[Frame],
        seqno: u32,
    ) -> Result<(), SenderError> {
        debug_assert!(self.state.is_active(), "transmit in state {}", self.state);
        self.channel.send(&frames[seqno as usize].datagram).await?;
        window.record_send(seqno, Instant::now());
        self.report.transmissions += 1;
        Ok(())
    }

    fn transition(&mut self, next: SenderState) {
        if self.state != next {
            log::info!("[sender] {} → {}", self.state, next);
            self.state = next;
        }
    }
}
