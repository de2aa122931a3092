//! Connection finite-state machine (FSM) types.
//!
//! DRTP uses a reduced version of the TCP state diagram: a three-way open
//! and a two-way close initiated by the data sender.  Transitions are driven
//! by [`crate::connection`] (open) and [`crate::gbn_connection`] (close).
//!
//! ```text
//!  client:  Closed ──SYN──▶ SynSent ──SYN-ACK / ACK──▶ Established
//!  server:  Listen ──SYN / SYN-ACK──▶ SynReceived ──ACK──▶ Established
//!
//!  sender:    Established ──FIN──▶ FinWait ──FIN-ACK (or retries spent)──▶ Closed
//!  receiver:  Established ──FIN / FIN-ACK──▶ Closed
//! ```

/// All possible states of a DRTP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; initial and final state.
    #[default]
    Closed,
    /// Server is waiting for a SYN.
    Listen,
    /// Client sent SYN and waits for SYN-ACK.
    SynSent,
    /// Server sent SYN-ACK and waits for the final ACK.
    SynReceived,
    /// Handshake complete; data may flow.
    Established,
    /// Sender sent FIN and waits for FIN-ACK.
    FinWait,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
            Self::FinWait => "FIN_WAIT",
        };
        f.write_str(name)
    }
}
