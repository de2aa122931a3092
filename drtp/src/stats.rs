//! Transfer instrumentation: timestamped event log and throughput.
//!
//! Every transfer-phase event is stamped with the local wall-clock time at
//! microsecond resolution, written to the `log` facade at `info` level, and
//! kept in an [`EventLog`] so callers (and tests) can inspect what happened.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::time::Duration;

use chrono::{DateTime, Local};

/// `HH:MM:SS.ffffff` in local time.
const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.6f";

/// Something observable that happened during data transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// First transmission of a data packet; `window` is the sliding window
    /// at the time of sending.
    Sent { seq: u16, window: Range<usize> },
    /// A data packet sent again after an RTO.
    Retransmitted { seq: u16 },
    /// An ACK that advanced the window.
    AckReceived { ack: u16 },
    /// An ACK below the window base; observed, no state change.
    DuplicateAck { ack: u16 },
    /// The RTO fired; `retransmit` is the range about to be resent.
    Timeout { retransmit: Range<usize> },
    /// Receiver accepted an in-order packet.
    Accepted { seq: u16 },
    /// Receiver acknowledged an accepted packet.
    AckSent { ack: u16 },
    /// Receiver discarded a packet that was not the expected one.
    OutOfOrder { seq: u16, expected: u16 },
    /// Receiver dropped a packet on purpose (test hook).
    Dropped { seq: u16 },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent { seq, window } => write!(
                f,
                "packet with seq = {seq} is sent, sliding window = {:?}",
                window.clone().collect::<Vec<_>>()
            ),
            Self::Retransmitted { seq } => write!(f, "retransmitting packet with seq = {seq}"),
            Self::AckReceived { ack } => write!(f, "ACK for packet = {ack} is received"),
            Self::DuplicateAck { ack } => write!(f, "duplicate ACK for packet = {ack} ignored"),
            Self::Timeout { retransmit } => write!(
                f,
                "RTO occurred, going back to seq = {}",
                retransmit.start
            ),
            Self::Accepted { seq } => write!(f, "packet {seq} is received"),
            Self::AckSent { ack } => write!(f, "sending ack for the received {ack}"),
            Self::OutOfOrder { seq, expected } => write!(
                f,
                "out-of-order packet {seq} is discarded, expected {expected}"
            ),
            Self::Dropped { seq } => write!(f, "packet {seq} is discarded (test case)"),
        }
    }
}

/// A single timestamped event.
#[derive(Debug, Clone)]
pub struct Event {
    pub at: DateTime<Local>,
    pub kind: EventKind,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.at.format(TIMESTAMP_FORMAT), self.kind)
    }
}

/// Events an [`EventLog`] keeps by default before evicting the oldest.
pub const DEFAULT_RETAINED: usize = 100_000;

/// Record of transfer events, newest last.
///
/// Every event goes to the `log` facade.  Only the most recent `limit` are
/// kept in memory; older ones are evicted and counted, so a sender stuck
/// retransmitting to a silent peer does not grow without bound.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
    limit: usize,
    evicted: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_RETAINED)
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` events (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            limit: limit.max(1),
            evicted: 0,
        }
    }

    /// Stamp `kind` with the current local time, log it, and keep it.
    pub fn record(&mut self, kind: EventKind) {
        let event = Event {
            at: Local::now(),
            kind,
        };
        log::info!("{event}");
        if self.events.len() == self.limit {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.events.iter()
    }

    /// Event kinds in the order they were recorded.
    pub fn kinds(&self) -> impl Iterator<Item = &EventKind> {
        self.events.iter().map(|e| &e.kind)
    }

    /// Number of retained events for which `pred` holds.
    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.kinds().filter(|k| pred(k)).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events dropped from memory to honour the limit.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Result of the end-of-transfer throughput computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Throughput {
    Mbps {
        mbps: f64,
        bytes: u64,
        elapsed: Duration,
    },
    /// Nothing was received (or no time elapsed), so there is no rate.
    NotComputable,
}

impl Throughput {
    /// `bytes * 8 / (seconds * 1_000_000)`.
    pub fn compute(bytes: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        if bytes == 0 || secs <= 0.0 {
            return Self::NotComputable;
        }
        Self::Mbps {
            mbps: (bytes as f64 * 8.0) / (secs * 1_000_000.0),
            bytes,
            elapsed,
        }
    }

    /// The rate in Mbps, if one could be computed.
    pub fn mbps(&self) -> Option<f64> {
        match self {
            Self::Mbps { mbps, .. } => Some(*mbps),
            Self::NotComputable => None,
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mbps {
                mbps,
                bytes,
                elapsed,
            } => write!(
                f,
                "The throughput is {mbps:.2} Mbps -- {bytes} bytes in {:.2} seconds",
                elapsed.as_secs_f64()
            ),
            Self::NotComputable => {
                f.write_str("Throughput could not be calculated - no data received.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_formula() {
        // 1_000_000 bytes in 2 s = 4 Mbps.
        let t = Throughput::compute(1_000_000, Duration::from_secs(2));
        assert_eq!(t.mbps(), Some(4.0));
    }

    #[test]
    fn zero_bytes_is_not_computable() {
        let t = Throughput::compute(0, Duration::from_secs(3));
        assert_eq!(t, Throughput::NotComputable);
        assert_eq!(
            t.to_string(),
            "Throughput could not be calculated - no data received."
        );
    }

    #[test]
    fn zero_elapsed_is_not_computable() {
        assert_eq!(
            Throughput::compute(1000, Duration::ZERO),
            Throughput::NotComputable
        );
    }

    #[test]
    fn throughput_display() {
        let t = Throughput::compute(250_000, Duration::from_millis(500));
        assert_eq!(
            t.to_string(),
            "The throughput is 4.00 Mbps -- 250000 bytes in 0.50 seconds"
        );
    }

    #[test]
    fn log_keeps_events_in_order() {
        let mut log = EventLog::new();
        log.record(EventKind::Sent {
            seq: 1,
            window: 1..4,
        });
        log.record(EventKind::AckReceived { ack: 1 });
        log.record(EventKind::AckReceived { ack: 2 });

        assert_eq!(log.len(), 3);
        assert_eq!(
            log.count(|k| matches!(k, EventKind::AckReceived { .. })),
            2
        );
        let kinds: Vec<_> = log.kinds().cloned().collect();
        assert_eq!(kinds[1], EventKind::AckReceived { ack: 1 });
    }

    #[test]
    fn event_display_has_microsecond_timestamp() {
        let mut log = EventLog::new();
        log.record(EventKind::Accepted { seq: 7 });
        let line = log.events().next().unwrap().to_string();

        let (stamp, msg) = line.split_once(" -- ").unwrap();
        assert_eq!(msg, "packet 7 is received");
        // HH:MM:SS.ffffff
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'.');
    }

    #[test]
    fn sent_event_lists_window() {
        let kind = EventKind::Sent {
            seq: 2,
            window: 1..4,
        };
        assert_eq!(
            kind.to_string(),
            "packet with seq = 2 is sent, sliding window = [1, 2, 3]"
        );
    }

    #[test]
    fn log_evicts_oldest_beyond_limit() {
        let mut log = EventLog::with_limit(3);
        for seq in 1..=5 {
            log.record(EventKind::Retransmitted { seq });
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.evicted(), 2);
        let kept: Vec<_> = log.kinds().cloned().collect();
        assert_eq!(
            kept,
            vec![
                EventKind::Retransmitted { seq: 3 },
                EventKind::Retransmitted { seq: 4 },
                EventKind::Retransmitted { seq: 5 },
            ]
        );
    }
}
