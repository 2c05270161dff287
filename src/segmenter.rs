//! Splits the input stream into the packet sequence.
//!
//! The sequence is built once, before anything is transmitted, and indexed by
//! seqno afterwards.  Chunk `i` covers bytes `[i*M, min((i+1)*M, len))`.
//!
//! Labels: seqno 0 is always `start`.  The last chunk is `end` unless it is
//! also the first, in which case `start` wins and the transfer has no `end`
//! packet.  An empty stream still produces a single empty `start` packet so
//! the receiver sees the transfer begin and complete.

use crate::packet::{Packet, PacketType};

/// Segment `data` into packets carrying at most `max_payload` bytes each.
///
/// # Panics
///
/// Panics if `max_payload` is zero; [`crate::config::TransferConfig::validate`]
/// rejects that before a sender is built.
pub fn segment(data: &[u8], max_payload: usize) -> Vec<Packet> {
    assert!(max_payload >= 1, "max_payload must be at least 1");

    if data.is_empty() {
        return vec![Packet::new(PacketType::Start, 0, Vec::new())];
    }

    let last = (data.len() - 1) / max_payload;
    data.chunks(max_payload)
        .enumerate()
        .map(|(i, chunk)| {
            let kind = if i == 0 {
                PacketType::Start
            } else if i == last {
                PacketType::End
            } else {
                PacketType::Data
            };
            Packet::new(kind, i as u32, chunk.to_vec())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(packets: &[Packet]) -> Vec<PacketType> {
        packets.iter().map(|p| p.kind).collect()
    }

    fn reassemble(packets: &[Packet]) -> Vec<u8> {
        packets.iter().flat_map(|p| p.payload.clone()).collect()
    }

    #[test]
    fn seven_thousand_bytes_make_five_packets() {
        let data = vec![7u8; 7000];
        let packets = segment(&data, 1400);
        assert_eq!(packets.len(), 5);
        assert_eq!(
            kinds(&packets),
            vec![
                PacketType::Start,
                PacketType::Data,
                PacketType::Data,
                PacketType::Data,
                PacketType::End
            ]
        );
        assert!(packets.iter().all(|p| p.payload.len() == 1400));
        for (i, p) in packets.iter().enumerate() {
            assert_eq!(p.seqno, i as u32);
        }
    }

    #[test]
    fn short_final_chunk() {
        let data: Vec<u8> = (0..2001u32).map(|i| i as u8).collect();
        let packets = segment(&data, 1000);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[2].payload.len(), 1);
        assert_eq!(packets[2].kind, PacketType::End);
        assert_eq!(reassemble(&packets), data);
    }

    #[test]
    fn two_packets_are_start_and_end() {
        let packets = segment(b"abcdef", 3);
        assert_eq!(kinds(&packets), vec![PacketType::Start, PacketType::End]);
    }

    #[test]
    fn single_packet_is_labelled_start() {
        let packets = segment(b"tiny", 1400);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].kind, PacketType::Start);
        assert_eq!(packets[0].payload, b"tiny");
    }

    #[test]
    fn empty_stream_still_yields_start() {
        let packets = segment(b"", 1400);
        assert_eq!(packets, vec![Packet::new(PacketType::Start, 0, vec![])]);
    }

    #[test]
    fn round_trip_for_many_sizes() {
        let data: Vec<u8> = (0..997u32).map(|i| (i * 31) as u8).collect();
        for m in [1, 2, 3, 7, 64, 996, 997, 998, 5000] {
            let packets = segment(&data, m);
            assert_eq!(reassemble(&packets), data, "M = {m}");
            assert!(packets.iter().all(|p| p.payload.len() <= m));

            let starts = packets.iter().filter(|p| p.kind == PacketType::Start).count();
            let ends = packets.iter().filter(|p| p.kind == PacketType::End).count();
            assert_eq!(starts, 1, "M = {m}");
            assert_eq!(ends, usize::from(packets.len() > 1), "M = {m}");
            if packets.len() > 1 {
                assert_eq!(packets.last().unwrap().kind, PacketType::End);
            }
        }
    }

    #[test]
    #[should_panic(expected = "max_payload")]
    fn zero_payload_panics() {
        segment(b"x", 0);
    }
}
