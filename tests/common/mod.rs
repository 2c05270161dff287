//! Shared helpers for the integration tests: an in-memory datagram link and a
//! minimal receiver that acknowledges the way the real one does.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rudp_sender::{AckMode, Channel, ChannelError, ControlMessage, Packet, PacketType};

// ---------------------------------------------------------------------------
// In-memory link
// ---------------------------------------------------------------------------

/// Sender half of an in-memory link.  Every datagram it sends is also kept in
/// `log` so tests can inspect the exact transmission order.
pub struct MemoryChannel {
    to_peer: mpsc::UnboundedSender<Vec<u8>>,
    from_peer: mpsc::UnboundedReceiver<Vec<u8>>,
    pub log: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Receiver half of an in-memory link.
pub struct PeerEnd {
    pub inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
}

pub fn memory_link() -> (MemoryChannel, PeerEnd) {
    let (to_peer, inbound) = mpsc::unbounded_channel();
    let (outbound, from_peer) = mpsc::unbounded_channel();
    let chan = MemoryChannel {
        to_peer,
        from_peer,
        log: Arc::default(),
    };
    (chan, PeerEnd { inbound, outbound })
}

impl MemoryChannel {
    /// Seqnos of every datagram sent so far, in order.
    pub fn sent_seqnos(&self) -> Vec<u32> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|raw| Packet::decode(raw).expect("sender emits valid packets").seqno)
            .collect()
    }
}

impl Channel for MemoryChannel {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), ChannelError> {
        self.log.lock().unwrap().push(datagram.to_vec());
        self.to_peer
            .send(datagram.to_vec())
            .map_err(|_| ChannelError::Closed)
    }

    async fn receive(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
        match tokio::time::timeout(wait, self.from_peer.recv()).await {
            Ok(Some(raw)) => Ok(Some(raw)),
            Ok(None) => Err(ChannelError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference receiver
// ---------------------------------------------------------------------------

/// Buffers out-of-order packets and acknowledges with the next expected seqno.
#[derive(Debug)]
pub struct ReferenceReceiver {
    mode: AckMode,
    expected: u32,
    buffered: BTreeMap<u32, Vec<u8>>,
    delivered: Vec<u8>,
    end_seqno: Option<u32>,
    /// Seqnos of every intact packet, duplicates included.
    pub seen: Vec<u32>,
    pub corrupted: u64,
}

impl ReferenceReceiver {
    pub fn new(mode: AckMode) -> Self {
        Self {
            mode,
            expected: 0,
            buffered: BTreeMap::new(),
            delivered: Vec::new(),
            end_seqno: None,
            seen: Vec::new(),
            corrupted: 0,
        }
    }

    /// Handle one datagram; returns the encoded reply, if any.
    ///
    /// Corrupted packets are dropped silently.
    pub fn on_datagram(&mut self, raw: &[u8]) -> Option<Vec<u8>> {
        let Ok(packet) = Packet::decode(raw) else {
            self.corrupted += 1;
            return None;
        };
        self.seen.push(packet.seqno);
        if packet.kind == PacketType::End {
            self.end_seqno = Some(packet.seqno);
        }
        if packet.seqno >= self.expected {
            self.buffered.entry(packet.seqno).or_insert(packet.payload);
        }
        while let Some(payload) = self.buffered.remove(&self.expected) {
            self.delivered.extend_from_slice(&payload);
            self.expected += 1;
        }
        Some(self.reply().encode())
    }

    pub fn reply(&self) -> ControlMessage {
        match self.mode {
            AckMode::GoBackN => ControlMessage::Ack { num: self.expected },
            AckMode::Selective => ControlMessage::Sack {
                cum_ack: self.expected,
                selective: self.buffered.keys().copied().collect(),
            },
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn end_seqno(&self) -> Option<u32> {
        self.end_seqno
    }

    pub fn delivered(&self) -> &[u8] {
        &self.delivered
    }

    /// How many times `seqno` arrived intact.
    pub fn arrivals(&self, seqno: u32) -> usize {
        self.seen.iter().filter(|&&s| s == seqno).count()
    }
}

/// Run `receiver` against `peer` until the sender side of the link is
/// dropped.  `drop_rule(seqno, attempt)` discards a data packet before the
/// receiver sees it; `attempt` counts from 1 per seqno.
pub fn serve<F>(
    mut peer: PeerEnd,
    mut receiver: ReferenceReceiver,
    mut drop_rule: F,
) -> JoinHandle<ReferenceReceiver>
where
    F: FnMut(u32, u32) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut attempts: HashMap<u32, u32> = HashMap::new();
        while let Some(raw) = peer.inbound.recv().await {
            if let Ok(packet) = Packet::decode(&raw) {
                let attempt = attempts.entry(packet.seqno).or_insert(0);
                *attempt += 1;
                if drop_rule(packet.seqno, *attempt) {
                    continue;
                }
            }
            if let Some(reply) = receiver.on_datagram(&raw) {
                if peer.outbound.send(reply).is_err() {
                    break;
                }
            }
        }
        receiver
    })
}

/// Never drop anything.
pub fn lossless(_seqno: u32, _attempt: u32) -> bool {
    false
}

// ---------------------------------------------------------------------------
// UDP receiver
// ---------------------------------------------------------------------------

/// Bind a loopback socket on an OS-assigned port.
pub async fn ephemeral() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.expect("bind failed")
}

/// Serve `receiver` on `socket` forever; abort the handle to stop it.
pub fn serve_udp(
    socket: UdpSocket,
    receiver: Arc<Mutex<ReferenceReceiver>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                continue;
            };
            let reply = receiver.lock().unwrap().on_datagram(&buf[..n]);
            if let Some(reply) = reply {
                let _ = socket.send_to(&reply, from).await;
            }
        }
    })
}

/// Deterministic, non-repeating test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}
