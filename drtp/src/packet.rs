//! Wire-format definitions for DRTP datagrams.
//!
//! Every datagram exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (four header fields + payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for truncated input.
//! - Interpreting the flag bitmask, both as independent bits ([`Flags`]) and
//!   as a tagged packet role ([`PacketKind`]).
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Sequence Number        |     Acknowledgment Number     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Flags             |            Window             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Payload (0..=992 bytes) ...                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 8 bytes.  There is no length field or
//! checksum; the payload is whatever follows the header in the datagram.

use thiserror::Error;

/// Bit-flag constants for the `flags` header field.
///
/// Flags are independent bits and may be combined (`SYN | ACK`, `FIN | ACK`).
pub mod flags {
    /// Synchronise: connection request (bit 3).
    pub const SYN: u16 = 1 << 3;
    /// Acknowledgement field is valid (bit 2).
    pub const ACK: u16 = 1 << 2;
    /// Finish: the sender has no more data (bit 1).
    pub const FIN: u16 = 1 << 1;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 8;

/// Largest payload carried by a single datagram.
pub const MAX_PAYLOAD: usize = 992;

/// Largest datagram on the wire (header + payload).
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 2;
const OFF_FLAGS: usize = 4;
const OFF_WINDOW: usize = 6;

/// Fixed-size protocol header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// 1-based chunk index for data packets, 0 for control packets.
    pub seq: u16,
    /// Cumulative acknowledgement number; meaningful only with [`flags::ACK`].
    pub ack: u16,
    /// Bitmask of [`flags`] constants.
    pub flags: u16,
    /// Advertised window.  Proposed size in SYN, negotiated size in SYN-ACK
    /// and the final ACK, the sender's window in data packets.
    pub window: u16,
}

/// Independent view of the three flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
}

/// Split a flag bitmask into its SYN / ACK / FIN bits.
///
/// Each bit is tested on its own, so any combination (including all three)
/// is reported faithfully.  Undefined bits are ignored.
pub fn decode_flags(bits: u16) -> Flags {
    Flags {
        syn: bits & flags::SYN != 0,
        ack: bits & flags::ACK != 0,
        fin: bits & flags::FIN != 0,
    }
}

/// Role of a packet, derived from its flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Syn,
    Ack,
    Fin,
    SynAck,
    FinAck,
    /// No flags set: a data packet.
    Data,
    /// Any other combination, carrying the raw bits.
    Other(u16),
}

/// A complete DRTP datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    fn control(seq: u16, ack: u16, flags: u16, window: u16) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags,
                window,
            },
            payload: Vec::new(),
        }
    }

    /// Connection request carrying the client's proposed window.
    pub fn syn(window: u16) -> Self {
        Self::control(0, 0, flags::SYN, window)
    }

    /// Server reply to a SYN carrying the negotiated window.
    pub fn syn_ack(window: u16) -> Self {
        Self::control(0, 0, flags::SYN | flags::ACK, window)
    }

    /// Pure acknowledgement.
    pub fn ack(ack: u16, window: u16) -> Self {
        Self::control(0, ack, flags::ACK, window)
    }

    /// Teardown request.
    pub fn fin() -> Self {
        Self::control(0, 0, flags::FIN, 0)
    }

    /// Teardown confirmation.
    pub fn fin_ack(window: u16) -> Self {
        Self::control(0, 0, flags::FIN | flags::ACK, window)
    }

    /// Data packet for chunk `seq` with no flags and zero ACK.
    ///
    /// Returns [`PacketError::FieldOverflow`] if `seq` does not fit in the
    /// 16-bit sequence field, and [`PacketError::PayloadTooLarge`] if the
    /// chunk exceeds [`MAX_PAYLOAD`].
    pub fn data(seq: usize, window: u16, payload: Vec<u8>) -> Result<Self, PacketError> {
        let seq = u16::try_from(seq).map_err(|_| PacketError::FieldOverflow {
            field: "sequence",
            value: seq,
        })?;
        if payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                len: payload.len(),
            });
        }
        Ok(Self {
            header: Header {
                seq,
                ack: 0,
                flags: 0,
                window,
            },
            payload,
        })
    }

    /// Flag bits of this packet as independent booleans.
    pub fn flags(&self) -> Flags {
        decode_flags(self.header.flags)
    }

    /// Tagged role of this packet.
    pub fn kind(&self) -> PacketKind {
        let f = self.flags();
        match (f.syn, f.ack, f.fin) {
            (true, false, false) => PacketKind::Syn,
            (false, true, false) => PacketKind::Ack,
            (false, false, true) => PacketKind::Fin,
            (true, true, false) => PacketKind::SynAck,
            (false, true, true) => PacketKind::FinAck,
            (false, false, false) => PacketKind::Data,
            _ => PacketKind::Other(self.header.flags),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                len: self.payload.len(),
            });
        }

        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 2].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.header.flags.to_be_bytes());
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.header.window.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Everything after the first [`HEADER_LEN`] bytes is payload.  Input
    /// longer than [`MAX_DATAGRAM`] is rejected.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort { len: buf.len() });
        }
        if buf.len() > MAX_DATAGRAM {
            return Err(PacketError::DatagramTooLarge { len: buf.len() });
        }

        let field = |off: usize| u16::from_be_bytes([buf[off], buf[off + 1]]);

        Ok(Packet {
            header: Header {
                seq: field(OFF_SEQ),
                ack: field(OFF_ACK),
                flags: field(OFF_FLAGS),
                window: field(OFF_WINDOW),
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// Length of this packet on the wire.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Framing errors.  Callers treat these as an unusable datagram, never as a
/// fatal fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {len} bytes is shorter than the {}-byte header", HEADER_LEN)]
    BufferTooShort { len: usize },
    #[error("payload of {len} bytes exceeds the {}-byte limit", MAX_PAYLOAD)]
    PayloadTooLarge { len: usize },
    #[error("datagram of {len} bytes exceeds the {}-byte limit", MAX_DATAGRAM)]
    DatagramTooLarge { len: usize },
    #[error("{field} value {value} does not fit in 16 bits")]
    FieldOverflow { field: &'static str, value: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_packet(seq: u16, ack: u16, flags: u16, window: u16, payload: &[u8]) -> Packet {
        Packet {
            header: Header {
                seq,
                ack,
                flags,
                window,
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let pkt = make_packet(42, 7, flags::ACK, 15, b"hello");
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn roundtrip_at_field_bounds() {
        let payload = vec![0xab; MAX_PAYLOAD];
        let pkt = make_packet(u16::MAX, u16::MAX, u16::MAX, u16::MAX, &payload);
        let bytes = pkt.encode().unwrap();
        assert_eq!(bytes.len(), MAX_DATAGRAM);
        assert_eq!(Packet::decode(&bytes).unwrap(), pkt);
    }

    #[test]
    fn empty_payload_roundtrip() {
        let pkt = Packet::ack(3, 15);
        let bytes = pkt.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded = Packet::decode(&bytes).unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.header.ack, 3);
    }

    #[test]
    fn fields_big_endian_on_wire() {
        let bytes = make_packet(0x0102, 0x0304, 0x0506, 0x0708, b"")
            .encode()
            .unwrap();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(
            Packet::decode(&[]),
            Err(PacketError::BufferTooShort { len: 0 })
        );
    }

    #[test]
    fn decode_short_header_returns_error() {
        assert_eq!(
            Packet::decode(&[0u8; HEADER_LEN - 1]),
            Err(PacketError::BufferTooShort { len: HEADER_LEN - 1 })
        );
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let pkt = make_packet(1, 0, 0, 3, &[0u8; MAX_PAYLOAD + 1]);
        assert_eq!(
            pkt.encode(),
            Err(PacketError::PayloadTooLarge {
                len: MAX_PAYLOAD + 1
            })
        );
    }

    #[test]
    fn data_rejects_sequence_overflow() {
        let err = Packet::data(u16::MAX as usize + 1, 3, vec![1]).unwrap_err();
        assert_eq!(
            err,
            PacketError::FieldOverflow {
                field: "sequence",
                value: 65_536
            }
        );
    }

    #[test]
    fn data_packet_has_no_flags_and_zero_ack() {
        let pkt = Packet::data(5, 3, b"chunk".to_vec()).unwrap();
        assert_eq!(pkt.header.seq, 5);
        assert_eq!(pkt.header.ack, 0);
        assert_eq!(pkt.header.flags, 0);
        assert_eq!(pkt.header.window, 3);
        assert_eq!(pkt.kind(), PacketKind::Data);
    }

    #[test]
    fn flag_bit_values() {
        assert_eq!(flags::SYN, 0x8);
        assert_eq!(flags::ACK, 0x4);
        assert_eq!(flags::FIN, 0x2);
    }

    #[test]
    fn decode_flags_every_combination() {
        for bits in 0u16..16 {
            let f = decode_flags(bits);
            assert_eq!(f.syn, bits & 0x8 != 0, "syn for {bits:#06b}");
            assert_eq!(f.ack, bits & 0x4 != 0, "ack for {bits:#06b}");
            assert_eq!(f.fin, bits & 0x2 != 0, "fin for {bits:#06b}");
        }
    }

    #[test]
    fn decode_flags_all_three_set() {
        let f = decode_flags(flags::SYN | flags::ACK | flags::FIN);
        assert_eq!(
            f,
            Flags {
                syn: true,
                ack: true,
                fin: true
            }
        );
    }

    #[test]
    fn decode_flags_ignores_undefined_bits() {
        let f = decode_flags(0xfff0 | flags::SYN | flags::ACK);
        assert_eq!(
            f,
            Flags {
                syn: true,
                ack: true,
                fin: false
            }
        );
        assert_eq!(decode_flags(0xfff1), Flags::default());
    }

    #[test]
    fn kind_of_control_packets() {
        assert_eq!(Packet::syn(3).kind(), PacketKind::Syn);
        assert_eq!(Packet::syn_ack(3).kind(), PacketKind::SynAck);
        assert_eq!(Packet::ack(1, 15).kind(), PacketKind::Ack);
        assert_eq!(Packet::fin().kind(), PacketKind::Fin);
        assert_eq!(Packet::fin_ack(15).kind(), PacketKind::FinAck);
        let all = make_packet(0, 0, flags::SYN | flags::FIN, 0, b"");
        assert_eq!(all.kind(), PacketKind::Other(flags::SYN | flags::FIN));
    }

    #[test]
    fn decode_rejects_oversized_datagram() {
        let buf = vec![0u8; MAX_DATAGRAM + 1];
        assert_eq!(
            Packet::decode(&buf),
            Err(PacketError::DatagramTooLarge { len: MAX_DATAGRAM + 1 })
        );
        assert!(Packet::decode(&buf[..MAX_DATAGRAM]).is_ok());
    }
}
