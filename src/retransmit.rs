//! Timeout-driven retransmission.
//!
//! The sender loop calls [`RetransmitScheduler::due`] once per iteration,
//! after any acknowledgement received in that iteration has been applied.
//! The scheduler only decides *what* to resend; the loop transmits the
//! returned seqnos and records their new send times, which restarts their
//! timers.
//!
//! - **Go-Back-N**: only the timer of `send_base` matters.  Once it expires
//!   the whole outstanding run `send_base..next_seqno` is resent.
//! - **Selective**: every tracked seqno in `send_base..send_base + window_size`
//!   has its own timer.  Expired seqnos are resent unless a selective ack has
//!   already confirmed them.
//!
//! The timeout is fixed (default 500 ms).  There is no RTT estimation, no
//! back-off, and no retry limit: retransmission continues until the window
//! drains or the process is stopped.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::AckMode;
use crate::window::TransmissionWindow;

/// Decides which packets to resend on each tick.
#[derive(Debug, Clone)]
pub struct RetransmitScheduler {
    mode: AckMode,
    timeout: Duration,
}

impl RetransmitScheduler {
    pub fn new(mode: AckMode, timeout: Duration) -> Self {
        Self { mode, timeout }
    }

    pub fn mode(&self) -> AckMode {
        self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Seqnos whose timers have expired at `now`, in ascending order.
    pub fn due(&self, window: &TransmissionWindow, now: Instant) -> Vec<u32> {
        match self.mode {
            AckMode::GoBackN => self.due_go_back_n(window, now),
            AckMode::Selective => self.due_selective(window, now),
        }
    }

    fn expired(&self, sent_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(sent_at) > self.timeout
    }

    fn due_go_back_n(&self, window: &TransmissionWindow, now: Instant) -> Vec<u32> {
        match window.sent_at(window.send_base()) {
            Some(sent_at) if self.expired(sent_at, now) => {
                (window.send_base()..window.next_seqno()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn due_selective(&self, window: &TransmissionWindow, now: Instant) -> Vec<u32> {
        (window.send_base()..window.limit())
            .filter(|&seqno| !window.is_selectively_acked(seqno))
            .filter(|&seqno| {
                window
                    .sent_at(seqno)
                    .is_some_and(|sent_at| self.expired(sent_at, now))
            })
            .collect()
    }
}
