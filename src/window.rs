//! Sliding-window bookkeeping for one transfer.
//!
//! [`TransmissionWindow`] owns every piece of mutable sender state: the two
//! window edges, the send-time table, and the selective-ack set.  The
//! acknowledgement interpreter and the retransmission scheduler borrow it;
//! nothing else holds a copy.
//!
//! # Sequence-number layout
//!
//! ```text
//!  send_base        next_seqno      send_base + window_size
//!      │                 │                  │
//!  ────┼─────────────────┼──────────────────┼──────▶ seqno
//!      │ <── in flight ─▶│ <── open slots ─▶│
//! ```
//!
//! Seqnos are packet indices, not byte offsets, and never wrap: a transfer
//! has at most `u32::MAX` packets.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use tokio::time::Instant;

/// Send-side window state for one transfer.
#[derive(Debug)]
pub struct TransmissionWindow {
    /// Oldest unacknowledged seqno (left window edge).  Never decreases.
    send_base: u32,
    /// Smallest seqno not yet transmitted.  Never decreases.
    next_seqno: u32,
    window_size: u32,
    packet_count: u32,
    /// Most recent transmission time of every outstanding seqno.
    send_times: BTreeMap<u32, Instant>,
    /// Seqnos at or above `send_base` confirmed by selective acks.
    selective: BTreeSet<u32>,
}

impl TransmissionWindow {
    /// Create a window over `packet_count` packets.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    pub fn new(packet_count: u32, window_size: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            send_base: 0,
            next_seqno: 0,
            window_size,
            packet_count,
            send_times: BTreeMap::new(),
            selective: BTreeSet::new(),
        }
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn next_seqno(&self) -> u32 {
        self.next_seqno
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    /// Right edge of the window, clipped to the end of the transfer.
    pub fn limit(&self) -> u32 {
        self.send_base
            .saturating_add(self.window_size)
            .min(self.packet_count)
    }

    /// Seqnos that may be transmitted for the first time right now.
    pub fn open_slots(&self) -> Range<u32> {
        self.next_seqno..self.limit().max(self.next_seqno)
    }

    /// Number of packets sent but not cumulatively acknowledged.
    pub fn outstanding(&self) -> u32 {
        self.next_seqno - self.send_base
    }

    /// `true` once every packet has been sent at least once.
    pub fn all_sent(&self) -> bool {
        self.next_seqno >= self.packet_count
    }

    /// `true` once every packet has been cumulatively acknowledged.
    pub fn is_drained(&self) -> bool {
        self.send_base >= self.packet_count
    }

    /// Store (or overwrite) the transmission time of `seqno`.
    ///
    /// Does not move either window edge; see [`mark_sent`](Self::mark_sent).
    pub fn record_send(&mut self, seqno: u32, now: Instant) {
        self.send_times.insert(seqno, now);
    }

    /// Advance `next_seqno` past a first transmission of `seqno`.
    pub fn mark_sent(&mut self, seqno: u32) {
        debug_assert!(
            seqno < self.packet_count,
            "mark_sent({seqno}) beyond packet_count {}",
            self.packet_count
        );
        if seqno >= self.next_seqno {
            self.next_seqno = seqno + 1;
        }
    }

    /// Move the left edge forward to `new_base`.
    ///
    /// Returns `false` without touching anything when `new_base` does not
    /// exceed the current base; stale and duplicate acks end up here.  On a
    /// real slide, send times and selective entries below the new base are
    /// dropped.
    pub fn slide(&mut self, new_base: u32) -> bool {
        if new_base <= self.send_base {
            return false;
        }
        self.send_base = new_base;
        self.next_seqno = self.next_seqno.max(new_base);
        self.send_times = self.send_times.split_off(&new_base);
        self.selective = self.selective.split_off(&new_base);
        true
    }

    /// Most recent transmission time of `seqno`, if it is still tracked.
    pub fn sent_at(&self, seqno: u32) -> Option<Instant> {
        self.send_times.get(&seqno).copied()
    }

    /// Seqnos currently tracked in the send-time table, in order.
    pub fn tracked(&self) -> impl Iterator<Item = (u32, Instant)> + '_ {
        self.send_times.iter().map(|(&s, &t)| (s, t))
    }

    /// Union seqnos confirmed out of order into the selective-ack set.
    ///
    /// Entries below `send_base` (already covered cumulatively) or past the
    /// end of the transfer are dropped.  Returns how many were new.
    pub fn add_selective<I>(&mut self, seqnos: I) -> usize
    where
        I: IntoIterator<Item = u32>,
    {
        let (base, count) = (self.send_base, self.packet_count);
        seqnos
            .into_iter()
            .filter(|&s| s >= base && s < count)
            .filter(|&s| self.selective.insert(s))
            .count()
    }

    pub fn is_selectively_acked(&self, seqno: u32) -> bool {
        self.selective.contains(&seqno)
    }

    pub fn selective_acks(&self) -> impl Iterator<Item = u32> + '_ {
        self.selective.iter().copied()
    }
}
