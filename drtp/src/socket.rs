//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O.  Dropping a [`Socket`] closes
//! the underlying file descriptor.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError, MAX_DATAGRAM};

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A datagram could not be framed; the caller drops it.
    #[error("packet framing error: {0}")]
    Packet(#[from] PacketError),
}

/// An async, packet-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Bind an ephemeral port on the unspecified address of `peer`'s family.
    pub async fn bind_for(peer: SocketAddr) -> Result<Self, SocketError> {
        let any = match peer.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        Self::bind(SocketAddr::new(any, 0)).await
    }

    /// Encode `packet` and send it as a single UDP datagram to `dest`.
    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = packet.encode()?;
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Packet`].
    ///
    /// Returns `(packet, sender_address)`.  Datagrams that fail to decode,
    /// including ones longer than [`MAX_DATAGRAM`], are returned as
    /// [`SocketError::Packet`]; the caller decides whether to keep waiting.  Cancel-safe, so it may be raced against a timer.
    pub async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        // One spare byte: an oversized datagram must not decode as a valid one.
        let mut buf = [0u8; MAX_DATAGRAM + 1];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let packet = Packet::decode(&buf[..n])?;
        Ok((packet, addr))
    }

    /// [`recv_from`](Self::recv_from) bounded by `limit`.
    ///
    /// `Ok(None)` means the wait timed out.
    pub async fn recv_timeout(
        &self,
        limit: Duration,
    ) -> Result<Option<(Packet, SocketAddr)>, SocketError> {
        match tokio::time::timeout(limit, self.recv_from()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn send_and_receive_packet() {
        let a = loopback().await;
        let b = loopback().await;

        let pkt = Packet::data(1, 3, b"payload".to_vec()).unwrap();
        a.send_to(&pkt, b.local_addr).await.unwrap();

        let (got, from) = b.recv_from().await.unwrap();
        assert_eq!(got, pkt);
        assert_eq!(from, a.local_addr);
    }

    #[tokio::test]
    async fn short_datagram_is_a_framing_error() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = loopback().await;

        a.send_to(&[1, 2, 3], b.local_addr).await.unwrap();
        let err = b.recv_from().await.unwrap_err();
        assert!(matches!(
            err,
            SocketError::Packet(PacketError::BufferTooShort { len: 3 })
        ));
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_when_idle() {
        let s = loopback().await;
        let got = s.recv_timeout(Duration::from_millis(50)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn bind_for_matches_peer_family() {
        let s = Socket::bind_for("127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        assert!(s.local_addr.is_ipv4());
        assert_ne!(s.local_addr.port(), 0);
    }

    #[tokio::test]
    async fn oversized_datagram_is_a_framing_error() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = loopback().await;

        a.send_to(&[0u8; 1500], b.local_addr).await.unwrap();
        let err = b.recv_from().await.unwrap_err();
        assert!(matches!(
            err,
            SocketError::Packet(PacketError::DatagramTooLarge { .. })
        ));
    }
}
