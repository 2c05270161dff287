//! Acknowledgement interpretation.
//!
//! Every validated control message passes through [`interpret`], which
//! classifies it against the current window and applies its effect:
//!
//! | message                 | condition                 | effect                 |
//! |-------------------------|---------------------------|------------------------|
//! | `Ack { num }`           | `num > send_base`         | slide to `num`*        |
//! | `Ack { num }`           | `num == send_base`        | none (duplicate)       |
//! | `Ack { num }`           | `num < send_base`         | none (stale)           |
//! | `Sack { cum, list }`    | always                    | union `list` into set  |
//! | `Sack { cum, list }`    | `cum > send_base`         | slide to `cum`         |
//!
//! Duplicates never trigger a fast retransmit; loss recovery is left entirely
//! to the retransmission scheduler.
//!
//! \* The slide target is clamped to `next_seqno`: an ack past anything sent
//! still counts as fresh, but `send_base` never overtakes `next_seqno`.  The
//! reported `to` is the clamped value.

use crate::packet::ControlMessage;
use crate::window::TransmissionWindow;

/// What one control message did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window slid from `from` to `to`.
    Advanced { from: u32, to: u32 },
    /// Cumulative ack equal to `send_base`.
    Duplicate(u32),
    /// Cumulative ack below `send_base`.
    Stale(u32),
    /// SACK whose cumulative part did not move the window; `added` selective
    /// entries were new.
    SelectiveOnly { cum_ack: u32, added: usize },
}

impl AckOutcome {
    pub fn advanced(&self) -> bool {
        matches!(self, AckOutcome::Advanced { .. })
    }
}

/// Apply `msg` to `window` and report what happened.
pub fn interpret(window: &mut TransmissionWindow, msg: &ControlMessage) -> AckOutcome {
    match msg {
        ControlMessage::Ack { num } => cumulative(window, *num),
        ControlMessage::Sack { cum_ack, selective } => {
            // Selective information may run ahead of the cumulative pointer.
            let added = window.add_selective(selective.iter().copied());
            match cumulative(window, *cum_ack) {
                AckOutcome::Duplicate(_) | AckOutcome::Stale(_) => AckOutcome::SelectiveOnly {
                    cum_ack: *cum_ack,
                    added,
                },
                outcome => outcome,
            }
        }
    }
}

fn cumulative(window: &mut TransmissionWindow, ack_num: u32) -> AckOutcome {
    let from = window.send_base();
    let to = ack_num.min(window.next_seqno());
    if ack_num > from && window.slide(to) {
        AckOutcome::Advanced { from, to }
    } else if ack_num >= from {
        AckOutcome::Duplicate(ack_num)
    } else {
        AckOutcome::Stale(ack_num)
    }
}
