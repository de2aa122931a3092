//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only the **expected** packet (`seq == expected_seq`) is accepted.
//! - Anything else, ahead or behind, is discarded without an ACK and without
//!   buffering.
//! - An accepted packet is acknowledged with `ack = seq`.
//! - A one-shot discard directive can drop a chosen sequence number once to
//!   exercise the sender's retransmission path.
//!
//! This module only manages state; all socket and file I/O is the caller's
//! responsibility (see [`crate::gbn_connection`]).

use crate::packet::Packet;

/// Window advertised in every ACK and FIN-ACK the receiver sends.
pub const RECEIVER_WINDOW: u16 = 15;

/// What the receiver decided about one inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Dropped by the discard directive; no further action.
    Dropped { seq: u16 },
    /// FIN received; the transfer is over.
    Fin,
    /// In-order packet: write its payload and acknowledge `seq`.
    Accepted { seq: u16 },
    /// Not the expected packet: discard silently.
    OutOfOrder { seq: u16, expected: u16 },
}

/// Go-Back-N receive-side state for one transfer.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next sequence number that will be accepted.
    pub expected_seq: u16,

    /// Bytes of accepted packets, headers included.
    pub received_bytes: u64,

    /// Number of accepted packets.
    pub accepted: u64,

    /// Sequence number to drop once, cleared when it fires.
    discard: Option<u16>,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl GbnReceiver {
    pub fn new(discard: Option<u16>) -> Self {
        Self {
            expected_seq: 1,
            received_bytes: 0,
            accepted: 0,
            discard,
        }
    }

    /// `true` while the discard directive has not fired yet.
    pub fn discard_pending(&self) -> bool {
        self.discard.is_some()
    }

    /// Classify an inbound packet and update state accordingly.
    ///
    /// The discard directive is checked first, then FIN, then ordering.
    pub fn on_packet(&mut self, packet: &Packet) -> Delivery {
        let seq = packet.header.seq;

        if self.discard == Some(seq) {
            self.discard = None;
            return Delivery::Dropped { seq };
        }

        if packet.flags().fin {
            return Delivery::Fin;
        }

        if seq != self.expected_seq {
            return Delivery::OutOfOrder {
                seq,
                expected: self.expected_seq,
            };
        }

        self.received_bytes += packet.wire_len() as u64;
        self.accepted += 1;
        self.expected_seq = self.expected_seq.wrapping_add(1);
        Delivery::Accepted { seq }
    }

    /// ACK for an accepted packet.
    pub fn ack_for(&self, seq: u16) -> Packet {
        Packet::ack(seq, RECEIVER_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{flags, HEADER_LEN};

    fn data(seq: u16, payload: &[u8]) -> Packet {
        Packet::data(seq.into(), 3, payload.to_vec()).unwrap()
    }

    #[test]
    fn initial_state() {
        let r = GbnReceiver::default();
        assert_eq!(r.expected_seq, 1);
        assert_eq!(r.received_bytes, 0);
        assert!(!r.discard_pending());
    }

    #[test]
    fn in_order_packets_accepted() {
        let mut r = GbnReceiver::default();
        assert_eq!(r.on_packet(&data(1, b"abc")), Delivery::Accepted { seq: 1 });
        assert_eq!(r.on_packet(&data(2, b"de")), Delivery::Accepted { seq: 2 });
        assert_eq!(r.expected_seq, 3);
        assert_eq!(r.accepted, 2);
    }

    #[test]
    fn received_bytes_include_header() {
        let mut r = GbnReceiver::default();
        r.on_packet(&data(1, &[0u8; 100]));
        assert_eq!(r.received_bytes, (HEADER_LEN + 100) as u64);
    }

    #[test]
    fn packet_ahead_is_discarded() {
        let mut r = GbnReceiver::default();
        assert_eq!(
            r.on_packet(&data(3, b"future")),
            Delivery::OutOfOrder {
                seq: 3,
                expected: 1
            }
        );
        assert_eq!(r.expected_seq, 1);
        assert_eq!(r.received_bytes, 0);
    }

    #[test]
    fn duplicate_is_discarded() {
        let mut r = GbnReceiver::default();
        r.on_packet(&data(1, b"x"));
        assert_eq!(
            r.on_packet(&data(1, b"x")),
            Delivery::OutOfOrder {
                seq: 1,
                expected: 2
            }
        );
        assert_eq!(r.accepted, 1);
    }

    #[test]
    fn advances_only_after_expected_arrives() {
        let mut r = GbnReceiver::default();
        r.on_packet(&data(1, b"a"));
        // 2 is missing; 3 and 4 stall.
        assert!(matches!(r.on_packet(&data(3, b"c")), Delivery::OutOfOrder { .. }));
        assert!(matches!(r.on_packet(&data(4, b"d")), Delivery::OutOfOrder { .. }));
        assert_eq!(r.expected_seq, 2);
        // Retransmission of 2 then 3 succeeds.
        assert_eq!(r.on_packet(&data(2, b"b")), Delivery::Accepted { seq: 2 });
        assert_eq!(r.on_packet(&data(3, b"c")), Delivery::Accepted { seq: 3 });
    }

    #[test]
    fn discard_fires_once() {
        let mut r = GbnReceiver::new(Some(2));
        r.on_packet(&data(1, b"a"));
        assert_eq!(r.on_packet(&data(2, b"b")), Delivery::Dropped { seq: 2 });
        assert!(!r.discard_pending());
        assert_eq!(r.expected_seq, 2);
        assert_eq!(r.on_packet(&data(2, b"b")), Delivery::Accepted { seq: 2 });
    }

    #[test]
    fn fin_ends_transfer() {
        let mut r = GbnReceiver::default();
        assert_eq!(r.on_packet(&Packet::fin()), Delivery::Fin);
        assert_eq!(r.expected_seq, 1);
    }

    #[test]
    fn ack_echoes_sequence_with_fixed_window() {
        let r = GbnReceiver::default();
        let ack = r.ack_for(5);
        assert_eq!(ack.header.ack, 5);
        assert_eq!(ack.header.seq, 0);
        assert_eq!(ack.header.flags, flags::ACK);
        assert_eq!(ack.header.window, RECEIVER_WINDOW);
        assert!(ack.payload.is_empty());
    }
}
