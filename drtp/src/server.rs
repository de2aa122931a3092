//! Server entry point: receive one file from a DRTP client.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Instant;

use tokio::fs::File;
use tokio::io::BufWriter;

use crate::connection::{ConnError, Connection, DEFAULT_WINDOW};
use crate::gbn_connection::GbnConnection;
use crate::gbn_receiver::GbnReceiver;
use crate::socket::Socket;
use crate::stats::{EventLog, Throughput};
use crate::timer::TimerConfig;

/// Where [`run_server`] writes the received file.
pub const DEFAULT_OUTPUT: &str = "received_file.jpg";

/// Everything [`Server`] needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Sequence number to drop once, to exercise retransmission.
    pub discard: Option<u16>,
    pub output: PathBuf,
    /// Largest window the server will agree to.
    pub window: u16,
    pub timers: TimerConfig,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            discard: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            window: DEFAULT_WINDOW,
            timers: TimerConfig::default(),
        }
    }
}

/// Outcome of a completed server session.
#[derive(Debug)]
pub struct ReceiveReport {
    /// Negotiated window.
    pub window: u16,
    /// Bytes of accepted packets, headers included.
    pub received_bytes: u64,
    /// Number of accepted packets.
    pub packets: u64,
    pub throughput: Throughput,
    /// Transfer-phase events.
    pub events: EventLog,
    pub output: PathBuf,
}

/// A bound server socket waiting to serve one session.
pub struct Server {
    socket: Socket,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ConnError> {
        let socket = Socket::bind(config.bind).await?;
        log::info!("Server listening on {}", socket.local_addr);
        Ok(Self { socket, config })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Run one session: handshake, in-order reception until FIN, FIN-ACK.
    ///
    /// The socket is closed when this returns, on success or failure.
    pub async fn serve(self) -> Result<ReceiveReport, ConnError> {
        let Self { socket, config } = self;

        let conn = Connection::accept(socket, config.window, &config.timers).await?;
        let mut gbn = GbnConnection::from_connection(conn, config.timers);
        let mut receiver = GbnReceiver::new(config.discard);

        let mut out = BufWriter::new(File::create(&config.output).await?);
        let start = Instant::now();
        gbn.receive(&mut receiver, &mut out).await?;
        let elapsed = start.elapsed();

        let throughput = Throughput::compute(receiver.received_bytes, elapsed);
        log::info!("{throughput}");
        log::info!("Connection closes");

        Ok(ReceiveReport {
            window: gbn.window,
            received_bytes: receiver.received_bytes,
            packets: receiver.accepted,
            throughput,
            events: gbn.events,
            output: config.output,
        })
    }
}

/// Bind `ip:port` and receive one file into [`DEFAULT_OUTPUT`].
pub async fn run_server(
    ip: IpAddr,
    port: u16,
    discard: Option<u16>,
) -> Result<ReceiveReport, ConnError> {
    let mut config = ServerConfig::new(SocketAddr::new(ip, port));
    config.discard = discard;
    Server::bind(config).await?.serve().await
}
