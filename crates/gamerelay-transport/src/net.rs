//! Endpoint-driven dispatch between the datagram and stream transports.

use crate::{
    Connection, ConnectionId, DatagramConnection, DatagramTransport, Endpoint,
    Transport, TransportError, WebSocketConnection, WebSocketTransport,
};

/// A [`Transport`] that opens UDP for [`Endpoint::Datagram`] and
/// WebSocket for [`Endpoint::Stream`].
///
/// This is what a relay uses in production: the configured endpoint alone
/// decides which channel carries the envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetTransport;

impl Transport for NetTransport {
    type Connection = NetConnection;

    async fn open(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Self::Connection, TransportError> {
        match endpoint {
            Endpoint::Datagram { .. } => DatagramTransport
                .open(endpoint)
                .await
                .map(NetConnection::Datagram),
            Endpoint::Stream { .. } => WebSocketTransport
                .open(endpoint)
                .await
                .map(NetConnection::Stream),
        }
    }
}

/// Either kind of open connection.
pub enum NetConnection {
    Datagram(DatagramConnection),
    Stream(WebSocketConnection),
}

impl Connection for NetConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            Self::Datagram(c) => c.send(data).await,
            Self::Stream(c) => c.send(data).await,
        }
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            Self::Datagram(c) => c.recv().await,
            Self::Stream(c) => c.recv().await,
        }
    }

    async fn close(&mut self, reason: &str) -> Result<(), TransportError> {
        match self {
            Self::Datagram(c) => c.close(reason).await,
            Self::Stream(c) => c.close(reason).await,
        }
    }

    fn id(&self) -> ConnectionId {
        match self {
            Self::Datagram(c) => c.id(),
            Self::Stream(c) => c.id(),
        }
    }
}
