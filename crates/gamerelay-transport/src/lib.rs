//! Transport abstraction layer for gamerelay.
//!
//! Provides the [`Transport`] and [`Connection`] traits that hide the two
//! supported channels behind one send/receive interface:
//!
//! - [`DatagramTransport`] — connectionless UDP. "Open" only binds a local
//!   ephemeral socket; sends are fire-and-forget.
//! - [`WebSocketTransport`] — a persistent message stream. "Open" performs
//!   the WebSocket handshake before the connection is handed out.
//!
//! [`NetTransport`] picks one of the two based on the [`Endpoint`] it is
//! asked to open.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — stream transport via `tokio-tungstenite`

mod datagram;
mod endpoint;
mod error;
#[cfg(feature = "websocket")]
mod net;
#[cfg(feature = "websocket")]
mod websocket;

pub use datagram::{DatagramConnection, DatagramTransport};
pub use endpoint::Endpoint;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use net::{NetConnection, NetTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique `ConnectionId`.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens outbound connections to a remote listener.
///
/// The returned futures are `Send` so a transport can be driven from a
/// spawned Tokio task.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Opens a connection to `endpoint`.
    ///
    /// For stream transports this completes only after the protocol-level
    /// handshake; for datagram transports it completes as soon as a local
    /// socket exists.
    fn open(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open connection that can send and receive byte messages.
pub trait Connection: Send + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &mut self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Only one message is pulled from the underlying channel per call, so
    /// the caller controls inbound flow by how often it calls `recv`.
    /// Returns `Ok(None)` when the connection is cleanly closed.
    ///
    /// Implementations must be cancel-safe: dropping the future before it
    /// completes must not lose a message.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection, performing a close handshake where the
    /// protocol has one.
    fn close(
        &mut self,
        reason: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
