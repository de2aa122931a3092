//! `drtp`: reliable file transfer over UDP using Go-Back-N.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   data (seq 1..N)   ┌──────────┐
//!  │  client  │────────────────────▶│  server  │
//!  └────┬─────┘                     └─────┬────┘
//!       │◀──────── ACK (ack = seq) ───────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │  Connection  (3-way handshake)    │
//!  │  GbnConnection (transfer, FIN)    │
//!  └────┬──────────────────────────────┘
//!       │ 8-byte header + ≤992-byte payload
//!  ┌────▼──────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]          wire format (serialise / deserialise, flags)
//! - [`state`]           finite-state-machine types
//! - [`socket`]          async UDP socket abstraction
//! - [`timer`]           protocol timeouts and retry budgets
//! - [`connection`]      three-way handshake, session errors
//! - [`gbn_sender`]      GBN outbound window state machine, file chunking
//! - [`gbn_receiver`]    GBN inbound in-order state machine
//! - [`gbn_connection`]  socket-driven transfer loops and teardown
//! - [`stats`]           timestamped event log and throughput
//! - [`client`]          `run_client` entry point
//! - [`server`]          `run_server` entry point

pub mod client;
pub mod connection;
pub mod gbn_connection;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod server;
pub mod socket;
pub mod state;
pub mod stats;
pub mod timer;

pub use client::{run_client, ClientConfig, TransferReport};
pub use connection::ConnError;
pub use server::{run_server, ReceiveReport, Server, ServerConfig};
