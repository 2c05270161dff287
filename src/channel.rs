//! Datagram channel abstraction.
//!
//! The sender only needs two primitives from the network: fire-and-forget
//! [`Channel::send`] and a bounded [`Channel::receive`] that gives control
//! back after `wait` even when nothing arrived.  [`UdpChannel`] implements
//! them over a tokio `UdpSocket`; tests substitute in-memory or
//! fault-injecting implementations.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};

use crate::packet::MAX_DATAGRAM;

// ---------------------------------------------------------------------------
// Channel trait
// ---------------------------------------------------------------------------

/// An unreliable, unordered datagram path to the receiver.
///
/// Implementations may drop, duplicate, reorder, or corrupt datagrams; the
/// sender tolerates all of it.
#[allow(async_fn_in_trait)]
pub trait Channel {
    /// Hand one datagram to the network.  Success says nothing about delivery.
    async fn send(&mut self, datagram: &[u8]) -> Result<(), ChannelError>;

    /// Wait at most `wait` for one inbound datagram.
    ///
    /// `Ok(None)` means nothing arrived in time.
    async fn receive(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, ChannelError>;
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying I/O error from the OS.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The destination did not resolve to any address.
    #[error("could not resolve destination {0:?}")]
    Resolve(String),
    /// The other end of an in-process channel went away.
    #[error("channel closed")]
    Closed,
}

/// Errors a connected UDP socket reports for conditions that are really just
/// "the datagram was lost" (ICMP port unreachable, signal interruption).
fn is_transient_io_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}

// ---------------------------------------------------------------------------
// UdpChannel
// ---------------------------------------------------------------------------

/// A UDP socket connected to a single receiver.
#[derive(Debug)]
pub struct UdpChannel {
    /// Address this socket is bound to (filled in after the OS assigns a port).
    pub local_addr: SocketAddr,
    /// Resolved receiver address.
    pub peer: SocketAddr,
    socket: UdpSocket,
}

impl UdpChannel {
    /// Resolve `destination` (`host:port`) and connect an ephemeral socket to it.
    ///
    /// Connecting makes the kernel drop datagrams from any other source.
    pub async fn connect(destination: &str) -> Result<Self, ChannelError> {
        let peer = lookup_host(destination)
            .await?
            .next()
            .ok_or_else(|| ChannelError::Resolve(destination.to_string()))?;
        Self::connect_addr(peer).await
    }

    /// Connect an ephemeral socket to an already-resolved `peer`.
    pub async fn connect_addr(peer: SocketAddr) -> Result<Self, ChannelError> {
        let bind = if peer.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(peer).await?;
        let local_addr = socket.local_addr()?;
        log::debug!("[udp] bound {local_addr} → {peer}");
        Ok(Self {
            local_addr,
            peer,
            socket,
        })
    }
}

impl Channel for UdpChannel {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), ChannelError> {
        match self.socket.send(datagram).await {
            Ok(_) => Ok(()),
            Err(e) if is_transient_io_error(&e) => {
                log::debug!("[udp] send dropped: {e}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn receive(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
        let deadline = Instant::now() + wait;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match timeout_at(deadline, self.socket.recv(&mut buf)).await {
                Err(_elapsed) => return Ok(None),
                Ok(Ok(n)) => {
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                // An ICMP error is not a reply; keep waiting until the deadline.
                Ok(Err(e)) if is_transient_io_error(&e) => {
                    log::debug!("[udp] receive: {e}");
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}
