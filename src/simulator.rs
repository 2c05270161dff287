//! Fault-injecting channel for exercising the reliability engine.
//!
//! Real networks drop, reorder, duplicate, and corrupt datagrams.  To test
//! recovery without depending on actual network conditions, [`LossyChannel`]
//! wraps any [`Channel`] and applies a configurable fault model in both
//! directions:
//!
//! | Fault        | Outbound                           | Inbound                   |
//! |--------------|------------------------------------|---------------------------|
//! | Loss         | datagram never reaches the inner   | datagram discarded        |
//! | Corruption   | one random bit flipped             | one random bit flipped    |
//! | Duplication  | delivered twice                    | returned twice            |
//! | Reordering   | held, overtaken by the next send   | none                      |
//!
//! All randomness comes from a seeded [`StdRng`], so a failing run can be
//! replayed with the same seed.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{Channel, ChannelError};

/// Fault probabilities, each in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    /// Outbound only.
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the wrapper is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    fn rates(&self) -> [f64; 4] {
        [
            self.loss_rate,
            self.corrupt_rate,
            self.duplicate_rate,
            self.reorder_rate,
        ]
    }
}

/// Counters of injected faults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// A [`Channel`] wrapper that misbehaves on purpose.
pub struct LossyChannel<C> {
    inner: C,
    config: SimulatorConfig,
    rng: StdRng,
    /// Outbound datagrams waiting to be overtaken.
    held: Vec<Vec<u8>>,
    /// Inbound duplicates not yet returned.
    pending: VecDeque<Vec<u8>>,
    stats: SimulatorStats,
}

impl<C: Channel> LossyChannel<C> {
    /// # Panics
    ///
    /// Panics if any rate lies outside `[0.0, 1.0]`.
    pub fn new(inner: C, config: SimulatorConfig) -> Self {
        assert!(
            config.rates().iter().all(|r| (0.0..=1.0).contains(r)),
            "fault rates must be within [0.0, 1.0]: {config:?}"
        );
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            held: Vec::new(),
            pending: VecDeque::new(),
            stats: SimulatorStats::default(),
        }
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Apply loss, corruption, and duplication to one datagram.
    ///
    /// Returns the copies that survive (zero, one, or two).
    fn impair(&mut self, datagram: &[u8], direction: &str) -> Vec<Vec<u8>> {
        if self.rng.random_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::debug!("[sim] {direction} drop ({} bytes)", datagram.len());
            return Vec::new();
        }

        let mut copy = datagram.to_vec();
        if !copy.is_empty() && self.rng.random_bool(self.config.corrupt_rate) {
            let idx = self.rng.random_range(0..copy.len());
            let bit: u32 = self.rng.random_range(0..8);
            copy[idx] ^= 1 << bit;
            self.stats.corrupted += 1;
            log::debug!("[sim] {direction} corrupt byte {idx}");
        }

        if self.rng.random_bool(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            log::debug!("[sim] {direction} duplicate");
            vec![copy.clone(), copy]
        } else {
            vec![copy]
        }
    }

    async fn release_held(&mut self) -> Result<(), ChannelError> {
        for datagram in std::mem::take(&mut self.held) {
            self.inner.send(&datagram).await?;
        }
        Ok(())
    }
}

impl<C: Channel> Channel for LossyChannel<C> {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), ChannelError> {
        let batch = self.impair(datagram, "→");
        if batch.is_empty() {
            return Ok(());
        }

        if self.held.is_empty() && self.rng.random_bool(self.config.reorder_rate) {
            self.stats.reordered += 1;
            log::debug!("[sim] → hold for reorder");
            self.held = batch;
            return Ok(());
        }

        for copy in &batch {
            self.inner.send(copy).await?;
        }
        self.release_held().await
    }

    async fn receive(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
        // Nothing sent after a held datagram will overtake it any more.
        self.release_held().await?;

        if let Some(datagram) = self.pending.pop_front() {
            return Ok(Some(datagram));
        }

        let Some(datagram) = self.inner.receive(wait).await? else {
            return Ok(None);
        };
        let mut copies = self.impair(&datagram, "←").into_iter();
        let first = copies.next();
        self.pending.extend(copies);
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records sends and replays a fixed inbound script.
    #[derive(Default)]
    struct Recorder {
        sent: Vec<Vec<u8>>,
        inbound: VecDeque<Vec<u8>>,
    }

    impl Channel for Recorder {
        async fn send(&mut self, datagram: &[u8]) -> Result<(), ChannelError> {
            self.sent.push(datagram.to_vec());
            Ok(())
        }

        async fn receive(&mut self, _wait: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
            Ok(self.inbound.pop_front())
        }
    }

    fn lossy(config: SimulatorConfig) -> LossyChannel<Recorder> {
        LossyChannel::new(Recorder::default(), config)
    }

    #[tokio::test]
    async fn default_config_is_transparent() {
        let mut chan = lossy(SimulatorConfig::default());
        for i in 0..20u8 {
            chan.send(&[i]).await.unwrap();
        }
        assert_eq!(chan.stats(), &SimulatorStats::default());
        let sent = chan.into_inner().sent;
        assert_eq!(sent, (0..20u8).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn total_loss_drops_everything() {
        let mut chan = lossy(SimulatorConfig {
            loss_rate: 1.0,
            ..SimulatorConfig::default()
        });
        chan.send(b"gone").await.unwrap();
        assert_eq!(chan.stats().dropped, 1);
        assert!(chan.into_inner().sent.is_empty());
    }

    #[tokio::test]
    async fn duplication_delivers_twice_both_ways() {
        let mut inner = Recorder::default();
        inner.inbound.push_back(b"ack".to_vec());
        let mut chan = LossyChannel::new(
            inner,
            SimulatorConfig {
                duplicate_rate: 1.0,
                ..SimulatorConfig::default()
            },
        );

        chan.send(b"x").await.unwrap();
        let wait = Duration::from_millis(1);
        assert_eq!(chan.receive(wait).await.unwrap().as_deref(), Some(&b"ack"[..]));
        assert_eq!(chan.receive(wait).await.unwrap().as_deref(), Some(&b"ack"[..]));
        assert_eq!(chan.receive(wait).await.unwrap(), None);
        assert_eq!(chan.into_inner().sent, vec![b"x".to_vec(), b"x".to_vec()]);
    }

    #[tokio::test]
    async fn corruption_changes_exactly_one_bit() {
        let mut chan = lossy(SimulatorConfig {
            corrupt_rate: 1.0,
            seed: 3,
            ..SimulatorConfig::default()
        });
        let original = b"data|1|hello|12345".to_vec();
        chan.send(&original).await.unwrap();
        let sent = chan.into_inner().sent;
        let flipped: u32 = sent[0]
            .iter()
            .zip(&original)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn reordered_datagram_is_overtaken() {
        let mut chan = lossy(SimulatorConfig {
            reorder_rate: 1.0,
            ..SimulatorConfig::default()
        });
        chan.send(b"first").await.unwrap();
        chan.send(b"second").await.unwrap();
        assert_eq!(chan.stats().reordered, 1);
        assert_eq!(
            chan.into_inner().sent,
            vec![b"second".to_vec(), b"first".to_vec()]
        );
    }

    #[tokio::test]
    async fn receive_flushes_held_datagram() {
        let mut chan = lossy(SimulatorConfig {
            reorder_rate: 1.0,
            ..SimulatorConfig::default()
        });
        chan.send(b"lonely").await.unwrap();
        chan.receive(Duration::from_millis(1)).await.unwrap();
        assert_eq!(chan.into_inner().sent, vec![b"lonely".to_vec()]);
    }

    #[test]
    #[should_panic(expected = "fault rates")]
    fn out_of_range_rate_panics() {
        lossy(SimulatorConfig {
            loss_rate: 1.5,
            ..SimulatorConfig::default()
        });
    }
}
