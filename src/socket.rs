//! Async UDP socket abstraction.
//!
//! [`StpSocket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::segment::Segment`] instead of raw bytes.  All protocol logic
//! lives elsewhere; this module owns only byte I/O.
//!
//! The socket stays unconnected and addresses the peer explicitly on every
//! send: a connected UDP socket would surface ICMP port-unreachable as an
//! error on later calls, turning "peer not started yet" into a failure
//! instead of the silence the retransmission machinery expects.  Inbound
//! datagrams from any other source are discarded.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::segment::{Segment, SegmentError};

/// Receive buffer size: comfortably larger than header + MSS so oversized
/// datagrams are seen (and rejected by decode) instead of silently truncated.
const RECV_BUF: usize = 2048;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
///
/// Callers treat [`SocketError::Malformed`] as ignorable (the datagram is
/// discarded) and [`SocketError::Io`] as fatal.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The received datagram could not be decoded as a valid segment.
    #[error("malformed datagram: {0}")]
    Malformed(#[from] SegmentError),
}

// ---------------------------------------------------------------------------
// StpSocket
// ---------------------------------------------------------------------------

/// An async, segment-oriented UDP socket paired with a single peer.
///
/// All methods are `&self` so the socket can be shared across tasks.
#[derive(Debug)]
pub struct StpSocket {
    /// Address this socket is bound to.
    pub local_addr: SocketAddr,
    peer: SocketAddr,
    inner: UdpSocket,
}

impl StpSocket {
    /// Bind to `local_port` on loopback, paired with `peer_port`.
    pub async fn bind(local_port: u16, peer_port: u16) -> Result<Self, SocketError> {
        let local = SocketAddrV4::new(Ipv4Addr::LOCALHOST, local_port);
        let peer = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, peer_port));
        let inner = UdpSocket::bind(local).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer,
            inner,
        })
    }

    /// Encode `segment` and send it as a single datagram to the peer.
    pub async fn send(&self, segment: &Segment) -> Result<(), SocketError> {
        self.inner.send_to(&segment.encode(), self.peer).await?;
        Ok(())
    }

    /// Receive the next datagram from the peer and decode it.
    ///
    /// Datagrams from other sources are skipped.  Datagrams that fail to
    /// decode are returned as [`SocketError::Malformed`] — the caller
    /// decides whether to retry.
    pub async fn recv(&self) -> Result<Segment, SocketError> {
        let mut buf = vec![0u8; RECV_BUF];
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf).await?;
            if addr != self.peer {
                log::debug!("discarding datagram from unknown source {addr}");
                continue;
            }
            return Ok(Segment::decode(&buf[..n])?);
        }
    }
}
