//! Sender finite-state machine.
//!
//! ```text
//!  SEGMENTING ──▶ TRANSMITTING ──all sent──▶ DRAINING ──base == count──▶ DONE
//! ```
//!
//! `Transmitting` and `Draining` run the same loop body; the split only marks
//! whether unsent packets remain.  Transitions are driven by
//! [`crate::sender::Sender`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Input is being split into packets.
    #[default]
    Segmenting,
    /// Unsent packets remain; new slots are filled as the window opens.
    Transmitting,
    /// Every packet has been sent at least once; waiting for the window to drain.
    Draining,
    /// Every packet has been cumulatively acknowledged.
    Done,
}

impl SenderState {
    pub fn is_active(self) -> bool {
        matches!(self, SenderState::Transmitting | SenderState::Draining)
    }
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SenderState::Segmenting => "SEGMENTING",
            SenderState::Transmitting => "TRANSMITTING",
            SenderState::Draining => "DRAINING",
            SenderState::Done => "DONE",
        })
    }
}
