//! Go-Back-N connection: data transfer and teardown over an established
//! [`Connection`].
//!
//! # Architecture
//!
//! ```text
//!  client::transfer                    server::Server::serve
//!      │ send_chunks(chunks)               │ receive(out)
//!      │ close()                           │   └── FIN ─▶ FIN-ACK
//!      ▼                                   ▼
//!  GbnConnection ──────────────────── GbnConnection
//!    ├── GbnSender   (window, base)       ├── GbnReceiver (expected_seq)
//!    ├── EventLog                         ├── EventLog
//!    └── Socket                           └── Socket
//! ```
//!
//! The state machines in [`crate::gbn_sender`] and [`crate::gbn_receiver`]
//! decide; this module performs the socket and file I/O and records every
//! decision in the [`EventLog`].  One task drives one connection, so no
//! locking is involved.

use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::connection::{ConnError, Connection};
use crate::gbn_receiver::{Delivery, GbnReceiver, RECEIVER_WINDOW};
use crate::gbn_sender::GbnSender;
use crate::packet::Packet;
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;
use crate::stats::{EventKind, EventLog};
use crate::timer::TimerConfig;

/// A DRTP session in the data-transfer phase.
pub struct GbnConnection {
    /// Current FSM state.
    pub state: ConnectionState,

    /// Negotiated window size.
    pub window: u16,

    /// Every transfer-phase event so far.
    pub events: EventLog,

    socket: Socket,
    peer: SocketAddr,
    timers: TimerConfig,
}

impl GbnConnection {
    /// Take over an established [`Connection`].
    pub fn from_connection(conn: Connection, timers: TimerConfig) -> Self {
        let (state, socket, peer, window) = conn.into_parts();
        Self {
            state,
            window,
            events: EventLog::new(),
            socket,
            peer,
            timers,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    // -----------------------------------------------------------------------
    // Sender
    // -----------------------------------------------------------------------

    /// Deliver every chunk of `sender` using Go-Back-N.
    ///
    /// Returns once the last chunk is acknowledged.  Timeouts never end the
    /// transfer; only a socket fault does.
    pub async fn send_chunks(&mut self, sender: &mut GbnSender) -> Result<(), ConnError> {
        self.require(ConnectionState::Established)?;

        while !sender.is_complete() {
            while let Some(tx) = sender.next_transmission().map_err(SocketError::Packet)? {
                self.socket.send_to(&tx.packet, self.peer).await?;
                let seq = tx.packet.header.seq;
                if tx.retransmit {
                    self.events.record(EventKind::Retransmitted { seq });
                } else {
                    self.events.record(EventKind::Sent {
                        seq,
                        window: sender.window(),
                    });
                }
            }

            match self.socket.recv_timeout(self.timers.rto).await {
                Ok(Some((pkt, addr))) => {
                    if addr != self.peer || !pkt.flags().ack {
                        log::debug!("ignoring {:?} from {addr} during transfer", pkt.kind());
                        continue;
                    }
                    let ack = pkt.header.ack;
                    if sender.on_ack(ack) > 0 {
                        self.events.record(EventKind::AckReceived { ack });
                    } else {
                        self.events.record(EventKind::DuplicateAck { ack });
                    }
                }
                Ok(None) => {
                    let retransmit = sender.on_timeout();
                    self.events.record(EventKind::Timeout { retransmit });
                }
                Err(SocketError::Packet(e)) => log::warn!("dropping malformed datagram: {e}"),
                Err(e) => return Err(e.into()),
            }
        }

        log::info!("Data finished: {} chunk(s) acknowledged", sender.total());
        Ok(())
    }

    /// Teardown initiator: send FIN and wait for FIN-ACK.
    ///
    /// Each FIN waits `fin_timeout`; a timeout or any other reply costs one
    /// of `fin_attempts`.  Running out of attempts still closes the
    /// connection.  Returns whether the peer confirmed.
    pub async fn close(&mut self) -> Result<bool, ConnError> {
        if self.state == ConnectionState::Closed {
            return Ok(true);
        }

        let fin = Packet::fin();
        self.state = ConnectionState::FinWait;

        for attempt in 1..=self.timers.fin_attempts {
            self.socket.send_to(&fin, self.peer).await?;
            log::info!("FIN packet is sent (attempt {attempt}/{})", self.timers.fin_attempts);

            match self.socket.recv_timeout(self.timers.fin_timeout).await {
                Ok(Some((pkt, addr))) if addr == self.peer && is_fin_ack(&pkt) => {
                    log::info!("FIN-ACK packet is received");
                    log::info!("Connection closes");
                    self.state = ConnectionState::Closed;
                    return Ok(true);
                }
                Ok(Some((pkt, _))) => {
                    log::warn!("unexpected {:?} during teardown", pkt.kind());
                }
                Ok(None) => log::warn!("timeout waiting for FIN-ACK during teardown"),
                Err(SocketError::Packet(e)) => log::warn!("malformed reply during teardown: {e}"),
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    return Err(e.into());
                }
            }
        }

        log::warn!(
            "teardown failed: no FIN-ACK after {} attempts, closing anyway",
            self.timers.fin_attempts
        );
        self.state = ConnectionState::Closed;
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Receiver
    // -----------------------------------------------------------------------

    /// Accept data in order until the peer sends FIN, writing payloads to
    /// `out`, then answer the FIN with a single FIN-ACK.
    ///
    /// Blocks without a timeout between datagrams; the sender's
    /// retransmissions guarantee traffic.
    pub async fn receive<W>(
        &mut self,
        receiver: &mut GbnReceiver,
        out: &mut W,
    ) -> Result<(), ConnError>
    where
        W: AsyncWrite + Unpin,
    {
        self.require(ConnectionState::Established)?;

        loop {
            let (pkt, addr) = match self.socket.recv_from().await {
                Ok(v) => v,
                Err(SocketError::Packet(e)) => {
                    log::warn!("dropping malformed datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if addr != self.peer {
                log::debug!("ignoring datagram from unknown peer {addr}");
                continue;
            }

            match receiver.on_packet(&pkt) {
                Delivery::Dropped { seq } => self.events.record(EventKind::Dropped { seq }),
                Delivery::Fin => {
                    log::info!("FIN packet is received");
                    self.acknowledge_fin().await?;
                    break;
                }
                Delivery::Accepted { seq } => {
                    self.events.record(EventKind::Accepted { seq });
                    out.write_all(&pkt.payload).await?;
                    self.socket.send_to(&receiver.ack_for(seq), self.peer).await?;
                    self.events.record(EventKind::AckSent { ack: seq });
                }
                Delivery::OutOfOrder { seq, expected } => {
                    self.events.record(EventKind::OutOfOrder { seq, expected });
                }
            }
        }

        out.flush().await?;
        Ok(())
    }

    /// Teardown responder: one FIN-ACK, then closed.
    async fn acknowledge_fin(&mut self) -> Result<(), ConnError> {
        self.socket
            .send_to(&Packet::fin_ack(RECEIVER_WINDOW), self.peer)
            .await?;
        log::info!("FIN-ACK packet is sent");
        self.state = ConnectionState::Closed;
        Ok(())
    }

    fn require(&self, state: ConnectionState) -> Result<(), ConnError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ConnError::BadState(self.state))
        }
    }
}

/// FIN and ACK both set; other bits are ignored.
fn is_fin_ack(pkt: &Packet) -> bool {
    let f = pkt.flags();
    f.ack && f.fin
}
