//! Connection establishment: the three-way handshake.
//!
//! A [`Connection`] is the result of a completed handshake.  It owns the
//! socket, the peer address and the negotiated window, and is handed to
//! [`crate::gbn_connection::GbnConnection`] for data transfer and teardown.
//!
//! ```text
//!  client                               server
//!    │ ── SYN (window = proposal) ──────▶ │  Listen
//!    │                                    │  window = min(default, proposal)
//!    │ ◀────── SYN-ACK (window) ───────── │  SynReceived
//!    │ window = min(proposal, advertised) │
//!    │ ── ACK (window) ─────────────────▶ │
//!  Established                       Established
//! ```
//!
//! The client considers itself established as soon as its final ACK is on
//! the wire; it never learns whether the server saw it.  If that ACK is lost
//! the server abandons the attempt while the client starts sending data.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio::time::Instant;

use crate::packet::Packet;
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;
use crate::timer::TimerConfig;

/// Window the server offers when the client proposes a larger one.
pub const DEFAULT_WINDOW: u16 = 15;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection establishment failed: no SYN-ACK after {attempts} attempts")]
    HandshakeFailed { attempts: u32 },
    #[error("handshake failed: no SYN received in time")]
    HandshakeTimeout,
    #[error("file {} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("file needs {chunks} chunks but sequence numbers stop at 65535")]
    FileTooLarge { chunks: usize },
    #[error("operation not allowed in state {0}")]
    BadState(ConnectionState),
}

/// An established DRTP session.
#[derive(Debug)]
pub struct Connection {
    /// Current FSM state.
    pub state: ConnectionState,
    /// Negotiated window size.
    pub window: u16,
    /// Remote peer address.
    pub peer: SocketAddr,
    socket: Socket,
}

impl Connection {
    /// Active open (client side).
    ///
    /// Sends SYN with `proposed_window` and waits `syn_timeout` for a
    /// SYN-ACK, up to `syn_attempts` SYNs in total.  Other packets are logged
    /// and ignored without consuming an attempt.
    pub async fn connect(
        socket: Socket,
        peer: SocketAddr,
        proposed_window: u16,
        timers: &TimerConfig,
    ) -> Result<Self, ConnError> {
        let syn = Packet::syn(proposed_window);
        let mut state = ConnectionState::Closed;

        for attempt in 1..=timers.syn_attempts {
            socket.send_to(&syn, peer).await?;
            log::info!("SYN packet is sent (attempt {attempt}/{})", timers.syn_attempts);
            enter(&mut state, ConnectionState::SynSent);

            let deadline = Instant::now() + timers.syn_timeout;
            while let Some((pkt, addr)) = recv_until(&socket, deadline).await? {
                let f = pkt.flags();
                if addr != peer || !(f.syn && f.ack) {
                    log::debug!("ignoring {:?} from {addr} while waiting for SYN-ACK", pkt.kind());
                    continue;
                }
                log::info!("SYN-ACK packet is received");

                let window = proposed_window.min(pkt.header.window).max(1);
                socket.send_to(&Packet::ack(0, window), peer).await?;
                log::info!("ACK packet is sent");
                log::info!("Connection established (window = {window})");
                enter(&mut state, ConnectionState::Established);

                return Ok(Self {
                    state,
                    window,
                    peer,
                    socket,
                });
            }
            log::warn!(
                "timeout waiting for SYN-ACK, retrying... ({attempt}/{})",
                timers.syn_attempts
            );
        }

        Err(ConnError::HandshakeFailed {
            attempts: timers.syn_attempts,
        })
    }

    /// Passive open (server side).
    ///
    /// Waits at most `accept_timeout` in total for a SYN.  Each SYN gets one
    /// SYN-ACK and one `final_ack_timeout` wait for the pure ACK; if anything
    /// else arrives, or nothing does, that attempt is abandoned and the server
    /// goes back to waiting for a SYN.
    pub async fn accept(
        socket: Socket,
        default_window: u16,
        timers: &TimerConfig,
    ) -> Result<Self, ConnError> {
        let deadline = Instant::now() + timers.accept_timeout;
        let mut state = ConnectionState::Closed;
        enter(&mut state, ConnectionState::Listen);
        log::info!("waiting for SYN on {}", socket.local_addr);

        loop {
            let Some((pkt, peer)) = recv_until(&socket, deadline).await? else {
                log::error!("handshake failed: no SYN received");
                return Err(ConnError::HandshakeTimeout);
            };
            let f = pkt.flags();
            if !f.syn || f.ack {
                log::debug!("unexpected {:?} from {peer} during handshake", pkt.kind());
                continue;
            }
            log::info!("SYN packet is received from {peer}");

            let window = default_window.min(pkt.header.window).max(1);
            socket.send_to(&Packet::syn_ack(window), peer).await?;
            log::info!("SYN-ACK packet is sent (window = {window})");
            enter(&mut state, ConnectionState::SynReceived);

            match socket.recv_timeout(timers.final_ack_timeout).await {
                Ok(Some((ack, addr))) if addr == peer && is_final_ack(&ack) => {
                    log::info!("ACK packet is received");
                    log::info!("Connection established");
                    enter(&mut state, ConnectionState::Established);
                    return Ok(Self {
                        state,
                        window,
                        peer,
                        socket,
                    });
                }
                Ok(Some((other, _))) => {
                    log::warn!("ACK was not received correctly (got {:?})", other.kind());
                }
                Ok(None) => log::warn!("timeout waiting for ACK, client unresponsive"),
                Err(SocketError::Packet(e)) => log::warn!("malformed final ACK: {e}"),
                Err(e) => return Err(e.into()),
            }
            enter(&mut state, ConnectionState::Listen);
        }
    }

    /// Break the connection into its owned parts.
    pub fn into_parts(self) -> (ConnectionState, Socket, SocketAddr, u16) {
        (self.state, self.socket, self.peer, self.window)
    }
}

/// The handshake's closing ACK: ACK set, SYN clear.  Other bits are ignored.
fn is_final_ack(pkt: &Packet) -> bool {
    let f = pkt.flags();
    f.ack && !f.syn
}

fn enter(state: &mut ConnectionState, next: ConnectionState) {
    if *state != next {
        log::debug!("{state} -> {next}");
        *state = next;
    }
}

/// Receive until `deadline`, skipping datagrams that fail to decode.
///
/// `Ok(None)` means the deadline passed.
async fn recv_until(
    socket: &Socket,
    deadline: Instant,
) -> Result<Option<(Packet, SocketAddr)>, SocketError> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        match socket.recv_timeout(remaining).await {
            Err(SocketError::Packet(e)) => log::debug!("dropping malformed datagram: {e}"),
            other => return other,
        }
    }
}
