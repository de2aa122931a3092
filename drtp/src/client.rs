//! Client entry point: send one file to a DRTP server.
//!
//! The file is read and chunked before any packet is sent, so a missing
//! file is reported without touching the network.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::connection::{ConnError, Connection};
use crate::gbn_connection::GbnConnection;
use crate::gbn_sender::{chunk_bytes, GbnSender};
use crate::socket::Socket;
use crate::stats::EventLog;
use crate::timer::TimerConfig;

/// Window the client proposes when the caller does not choose one.
pub const DEFAULT_PROPOSED_WINDOW: u16 = 3;

/// Everything [`transfer`] needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    pub file: PathBuf,
    pub window: u16,
    pub timers: TimerConfig,
}

impl ClientConfig {
    pub fn new(server: SocketAddr, file: impl Into<PathBuf>) -> Self {
        Self {
            server,
            file: file.into(),
            window: DEFAULT_PROPOSED_WINDOW,
            timers: TimerConfig::default(),
        }
    }
}

/// Outcome of a completed client session.
#[derive(Debug)]
pub struct TransferReport {
    /// Negotiated window.
    pub window: u16,
    /// Number of chunks the file was split into.
    pub chunks: usize,
    /// Transfer-phase events.
    pub events: EventLog,
    /// `true` if the server confirmed the teardown.
    pub closed_cleanly: bool,
}

/// Read `path` fully and split it into chunks.
pub async fn load_chunks(path: &Path) -> Result<Vec<Vec<u8>>, ConnError> {
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConnError::FileNotFound(path.to_path_buf()),
        _ => ConnError::Io(e),
    })?;

    let chunks = chunk_bytes(&data);
    if chunks.len() > usize::from(u16::MAX) {
        return Err(ConnError::FileTooLarge {
            chunks: chunks.len(),
        });
    }
    Ok(chunks)
}

/// Send `file` to `ip:port`, proposing `window`.
pub async fn run_client(
    ip: IpAddr,
    port: u16,
    file: impl Into<PathBuf>,
    window: u16,
) -> Result<TransferReport, ConnError> {
    let mut config = ClientConfig::new(SocketAddr::new(ip, port), file);
    config.window = window;
    transfer(config).await
}

/// Run one client session: handshake, Go-Back-N transfer, teardown.
pub async fn transfer(config: ClientConfig) -> Result<TransferReport, ConnError> {
    let chunks = load_chunks(&config.file).await?;
    let total = chunks.len();
    log::info!(
        "sending {} as {total} chunk(s) to {}",
        config.file.display(),
        config.server
    );

    let socket = Socket::bind_for(config.server).await?;
    let conn = Connection::connect(socket, config.server, config.window, &config.timers).await?;

    let mut gbn = GbnConnection::from_connection(conn, config.timers);
    let mut sender = GbnSender::new(chunks, gbn.window);

    log::info!("Data Transfer:");
    gbn.send_chunks(&mut sender).await?;

    log::info!("Connection teardown:");
    let closed_cleanly = gbn.close().await?;

    Ok(TransferReport {
        window: gbn.window,
        chunks: total,
        events: gbn.events,
        closed_cleanly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_reported_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");

        // Nobody listens on this address; the error must not be a handshake one.
        let config = ClientConfig::new("127.0.0.1:9".parse().unwrap(), &missing);
        let err = transfer(config).await.unwrap_err();
        match err {
            ConnError::FileNotFound(path) => assert_eq!(path, missing),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_chunks_splits_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::write(&path, vec![1u8; 2500]).unwrap();

        let chunks = load_chunks(&path).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 516);
    }
}
