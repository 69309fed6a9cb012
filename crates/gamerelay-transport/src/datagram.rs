//! UDP transport implementation.
//!
//! There is no handshake and no delivery confirmation. A "connection" is
//! just a locally bound socket plus the resolved target address.
//!
//! Some platforms report an ICMP "port unreachable" for an earlier send
//! as a reset or refused error on the next receive. With nothing to lose
//! on a connectionless socket, those errors are skipped.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::{Connection, ConnectionId, Endpoint, Transport, TransportError};

/// Largest datagram we accept on the inbound side.
const MAX_DATAGRAM: usize = 64 * 1024;

/// A connectionless [`Transport`] over UDP.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatagramTransport;

impl Transport for DatagramTransport {
    type Connection = DatagramConnection;

    async fn open(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Self::Connection, TransportError> {
        let Endpoint::Datagram { host, port } = endpoint else {
            return Err(TransportError::InvalidEndpoint(format!(
                "datagram transport cannot open {endpoint}"
            )));
        };

        let target = tokio::net::lookup_host((host.as_str(), *port))
            .await
            .map_err(TransportError::Connect)?
            .next()
            .ok_or_else(|| {
                TransportError::InvalidEndpoint(format!(
                    "{host}:{port} did not resolve to any address"
                ))
            })?;

        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket =
            UdpSocket::bind(local).await.map_err(TransportError::Connect)?;

        let id = ConnectionId::next();
        tracing::debug!(
            %id,
            %target,
            local = ?socket.local_addr().ok(),
            "datagram socket bound"
        );

        Ok(DatagramConnection { id, socket, target })
    }
}

/// A bound UDP socket aimed at one target address.
pub struct DatagramConnection {
    id: ConnectionId,
    socket: UdpSocket,
    target: SocketAddr,
}

impl DatagramConnection {
    /// The resolved address datagrams are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Connection for DatagramConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(data, self.target)
            .await
            .map(|_| ())
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    buf.truncate(len);
                    tracing::trace!(
                        id = %self.id,
                        %from,
                        len,
                        "datagram received"
                    );
                    return Ok(Some(buf));
                }
                Err(e) if is_unreachable(&e) => {
                    tracing::debug!(
                        id = %self.id,
                        peer = %self.target,
                        error = %e,
                        "target unreachable, still listening"
                    );
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }

    async fn close(&mut self, _reason: &str) -> Result<(), TransportError> {
        // Nothing to negotiate; the socket is released on drop.
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Errors a UDP socket reports for an earlier send that found no
/// listener. They say nothing about the local socket.
fn is_unreachable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
