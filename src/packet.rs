//! Wire-format definitions for protocol datagrams.
//!
//! Every datagram exchanged with the receiver is a single delimiter-separated
//! record.  This module is responsible for:
//! - Encoding outbound data packets ([`Packet`]) into bytes ready for the
//!   channel.
//! - Validating the trailing checksum of any raw datagram ([`validate`]).
//! - Parsing inbound control datagrams into a tagged [`ControlMessage`],
//!   reporting corruption and structural problems as distinct errors.
//!
//! Pure data transformation; no I/O happens here.
//!
//! # Wire format
//!
//! ```text
//!  type | seqno | payload ... | checksum
//!  ─────┼───────┼─────────────┼─────────
//!  start  0       <bytes>       decimal CRC-32 of everything up to and
//!  data   1       <bytes>       including the last `|`
//!  end    4       <bytes>
//!  ack    5       (empty)
//!  sack   2;3,5   (empty)
//! ```
//!
//! `type` ends at the first `|`, `seqno` at the second, and the checksum
//! starts after the last one.  Everything in between is payload, so payload
//! bytes may themselves contain `|`.

use std::fmt;

use thiserror::Error;

use crate::config::AckMode;

/// Largest datagram the receiver accepts (1500-byte MTU minus IP/UDP headers).
pub const MAX_DATAGRAM: usize = 1472;

/// Worst-case framing bytes around a data payload:
/// `start` + 3 delimiters + 10-digit seqno + 10-digit checksum.
pub const FRAME_OVERHEAD: usize = 5 + 3 + 10 + 10;

const DELIM: u8 = b'|';

/// Separator between the cumulative ack and the selective list of a `sack`.
const SACK_SEP: char = ';';

/// Separator between entries of the selective list.
const LIST_SEP: char = ',';

// ---------------------------------------------------------------------------
// Data packets
// ---------------------------------------------------------------------------

/// Role of a data packet within a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// First packet of a transfer (always seqno 0).
    Start,
    /// Any packet strictly between the first and the last.
    Data,
    /// Final packet of a multi-packet transfer.
    End,
}

impl PacketType {
    /// Token used for this type on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Start => "start",
            PacketType::Data => "data",
            PacketType::End => "end",
        }
    }

    fn from_wire(token: &str) -> Option<Self> {
        match token {
            "start" => Some(PacketType::Start),
            "data" => Some(PacketType::Data),
            "end" => Some(PacketType::End),
            _ => None,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One segment of the outbound stream.
///
/// Packets are built once by [`crate::segmenter::segment`] and never mutated;
/// the checksum is derived at encode time so it can never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub seqno: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketType, seqno: u32, payload: Vec<u8>) -> Self {
        Self {
            kind,
            seqno,
            payload,
        }
    }

    /// Serialise this packet into a newly allocated datagram.
    pub fn encode(&self) -> Vec<u8> {
        frame(self.kind.as_str(), &self.seqno.to_string(), &self.payload)
    }

    /// Parse a data packet from a raw datagram.
    ///
    /// Receivers use this; the sender only ever decodes control messages.
    pub fn decode(raw: &[u8]) -> Result<Self, PacketError> {
        let fields = split_fields(raw)?;
        let kind = PacketType::from_wire(fields.kind)
            .ok_or_else(|| malformed(format!("not a data packet type: {:?}", fields.kind)))?;
        let seqno = parse_seqno(fields.seq)?;
        Ok(Self::new(kind, seqno, fields.payload.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Control messages
// ---------------------------------------------------------------------------

/// An acknowledgement sent by the receiver.
///
/// The variant is fixed once at parse time; the rest of the sender matches on
/// it rather than re-inspecting the wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Cumulative acknowledgement: every seqno below `num` has arrived.
    Ack { num: u32 },
    /// Cumulative acknowledgement plus seqnos received out of order.
    Sack { cum_ack: u32, selective: Vec<u32> },
}

impl ControlMessage {
    /// Cumulative acknowledgement number carried by either variant.
    pub fn cumulative(&self) -> u32 {
        match self {
            ControlMessage::Ack { num } => *num,
            ControlMessage::Sack { cum_ack, .. } => *cum_ack,
        }
    }

    /// Serialise into the receiver's wire format.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlMessage::Ack { num } => frame("ack", &num.to_string(), b""),
            ControlMessage::Sack { cum_ack, selective } => {
                let list = selective
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                frame("sack", &format!("{cum_ack}{SACK_SEP}{list}"), b"")
            }
        }
    }

    /// Parse an inbound control datagram.
    ///
    /// Returns [`PacketError::Corrupted`] when the checksum does not verify
    /// and [`PacketError::Malformed`] when the checksum is fine but the
    /// content cannot be understood under `mode`.
    pub fn parse(raw: &[u8], mode: AckMode) -> Result<Self, PacketError> {
        let fields = split_fields(raw)?;
        match (fields.kind, mode) {
            ("ack", _) => Ok(ControlMessage::Ack {
                num: parse_seqno(fields.seq)?,
            }),
            ("sack", AckMode::Selective) => parse_sack(fields.seq),
            ("sack", AckMode::GoBackN) => Err(malformed("sack received in go-back-n mode")),
            (other, _) => Err(malformed(format!("not a control message type: {other:?}"))),
        }
    }
}

fn parse_sack(field: &str) -> Result<ControlMessage, PacketError> {
    let (cum, list) = match field.split_once(SACK_SEP) {
        Some((cum, list)) => (cum, list),
        None => (field, ""),
    };
    let cum_ack = parse_seqno(cum)?;
    let selective = if list.is_empty() {
        Vec::new()
    } else {
        list.split(LIST_SEP)
            .map(parse_seqno)
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(ControlMessage::Sack { cum_ack, selective })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Trailing checksum missing or not matching the datagram contents.
    #[error("checksum verification failed")]
    Corrupted,
    /// Checksum verified but the fields cannot be interpreted.
    #[error("malformed datagram: {0}")]
    Malformed(String),
}

fn malformed(reason: impl Into<String>) -> PacketError {
    PacketError::Malformed(reason.into())
}

// ---------------------------------------------------------------------------
// Framing helpers
// ---------------------------------------------------------------------------

/// `true` when `raw` ends in a checksum matching the rest of the datagram.
pub fn validate(raw: &[u8]) -> bool {
    verified_trailer(raw).is_ok()
}

fn frame(kind: &str, seq_field: &str, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(kind.len() + seq_field.len() + payload.len() + 13);
    buf.extend_from_slice(kind.as_bytes());
    buf.push(DELIM);
    buf.extend_from_slice(seq_field.as_bytes());
    buf.push(DELIM);
    buf.extend_from_slice(payload);
    buf.push(DELIM);

    let checksum = crc32(&buf);
    buf.extend_from_slice(checksum.to_string().as_bytes());
    buf
}

/// Borrowed view of a verified datagram's fields.
struct Fields<'a> {
    kind: &'a str,
    seq: &'a str,
    payload: &'a [u8],
}

fn split_fields(raw: &[u8]) -> Result<Fields<'_>, PacketError> {
    let last = verified_trailer(raw)?;
    let body = &raw[..last];

    let first = body
        .iter()
        .position(|&b| b == DELIM)
        .ok_or_else(|| malformed("missing type delimiter"))?;
    let second = body[first + 1..]
        .iter()
        .position(|&b| b == DELIM)
        .map(|i| first + 1 + i)
        .ok_or_else(|| malformed("missing seqno delimiter"))?;

    let kind = std::str::from_utf8(&body[..first]).map_err(|_| malformed("type is not UTF-8"))?;
    let seq = std::str::from_utf8(&body[first + 1..second])
        .map_err(|_| malformed("seqno is not UTF-8"))?;

    Ok(Fields {
        kind,
        seq,
        payload: &body[second + 1..],
    })
}

/// Verify the checksum and return the index of the last delimiter.
fn verified_trailer(raw: &[u8]) -> Result<usize, PacketError> {
    let last = raw
        .iter()
        .rposition(|&b| b == DELIM)
        .ok_or(PacketError::Corrupted)?;
    let reported = std::str::from_utf8(&raw[last + 1..])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(PacketError::Corrupted)?;

    if crc32(&raw[..=last]) != reported {
        return Err(PacketError::Corrupted);
    }
    Ok(last)
}

fn parse_seqno(field: &str) -> Result<u32, PacketError> {
    field
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("invalid sequence number {field:?}")))
}

/// CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`) over `data`.
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
