//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] owns the file's chunk sequence and the sliding window over
//! it.  Chunk `i` (1-based) travels as the packet with sequence number `i`.
//!
//! # Protocol contract
//!
//! - Packets with sequence numbers in `[base, base + window_size)` may be in
//!   flight at once.
//! - ACKs are **cumulative**: `ack = N` confirms every packet `<= N`, so
//!   `base` jumps to `N + 1`.  ACKs below `base` change nothing.
//! - On timeout, `next_seq` goes back to `base` and every packet still inside
//!   the window is sent again (go back N).
//! - There is no limit on consecutive timeouts.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility (see [`crate::gbn_connection`]).
//!
//! # Sequence-number layout
//!
//! ```text
//!        base          next_seq       base + window_size
//!          │               │                 │
//!  ────────┼───────────────┼─────────────────┼──────────▶ seq
//!   acked  │ <─ in flight ─▶ <── sendable ──▶ │ not yet
//! ```

use std::ops::Range;

use crate::packet::{Packet, PacketError, MAX_PAYLOAD};

/// Split `data` into the ordered chunk sequence, each at most
/// [`MAX_PAYLOAD`] bytes.  An empty input yields no chunks.
pub fn chunk_bytes(data: &[u8]) -> Vec<Vec<u8>> {
    data.chunks(MAX_PAYLOAD).map(<[u8]>::to_vec).collect()
}

/// A data packet ready for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub packet: Packet,
    /// `true` when this sequence number has been sent before.
    pub retransmit: bool,
}

/// Go-Back-N send-side state for one transfer.
#[derive(Debug)]
pub struct GbnSender {
    /// Oldest unacknowledged sequence number (left window edge).
    pub base: usize,

    /// Sequence number of the next packet to put on the wire.
    pub next_seq: usize,

    /// Highest sequence number transmitted so far (0 before the first send).
    highest_sent: usize,

    /// Negotiated window size N.
    window_size: u16,

    /// File content, chunk `i` at index `i - 1`.
    chunks: Vec<Vec<u8>>,
}

impl GbnSender {
    /// Create a sender over `chunks` using the negotiated `window_size`.
    ///
    /// A window of 0 is treated as 1 so the transfer can make progress.
    pub fn new(chunks: Vec<Vec<u8>>, window_size: u16) -> Self {
        Self {
            base: 1,
            next_seq: 1,
            highest_sent: 0,
            window_size: window_size.max(1),
            chunks,
        }
    }

    /// Number of chunks (and therefore the last sequence number).
    pub fn total(&self) -> usize {
        self.chunks.len()
    }

    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    /// `true` once every chunk has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base > self.total()
    }

    /// Sequence numbers currently inside the sliding window, clipped to the
    /// last chunk.
    pub fn window(&self) -> Range<usize> {
        let end = (self.base + usize::from(self.window_size)).min(self.total() + 1);
        self.base..end
    }

    /// Build the next packet inside the window and advance `next_seq`.
    ///
    /// Returns `Ok(None)` when the window is exhausted.  Fails only if a
    /// sequence number does not fit the 16-bit header field.
    pub fn next_transmission(&mut self) -> Result<Option<Transmission>, PacketError> {
        if self.next_seq >= self.window().end {
            return Ok(None);
        }

        let seq = self.next_seq;
        let packet = Packet::data(seq, self.window_size, self.chunks[seq - 1].clone())?;
        let retransmit = seq <= self.highest_sent;

        self.highest_sent = self.highest_sent.max(seq);
        self.next_seq += 1;
        Ok(Some(Transmission { packet, retransmit }))
    }

    /// Process a cumulative ACK.
    ///
    /// Returns the number of newly acknowledged packets; `0` for a stale or
    /// duplicate ACK, or for one that claims data never sent.
    pub fn on_ack(&mut self, ack: u16) -> usize {
        let ack = usize::from(ack);
        if ack < self.base || ack > self.highest_sent {
            return 0;
        }

        let acked = ack + 1 - self.base;
        self.base = ack + 1;
        self.next_seq = self.next_seq.max(self.base);
        acked
    }

    /// Retransmission timeout: rewind `next_seq` to `base`.
    ///
    /// Returns the sequence numbers that will be sent again, which is the
    /// whole outstanding window.
    pub fn on_timeout(&mut self) -> Range<usize> {
        let outstanding = self.base..self.next_seq.min(self.window().end);
        self.next_seq = self.base;
        outstanding
    }
}
