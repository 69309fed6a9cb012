//! Where a transport should connect to.

use std::fmt;

/// The remote listener a transport opens a connection to.
///
/// One configured target per relay: a host and port for the datagram
/// channel, or a URL for the message-stream channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A UDP listener.
    Datagram { host: String, port: u16 },
    /// A WebSocket listener. Plain `ws://` only; TLS is not built in.
    Stream { url: String },
}

impl Endpoint {
    /// Shorthand for a datagram endpoint.
    pub fn datagram(host: impl Into<String>, port: u16) -> Self {
        Self::Datagram {
            host: host.into(),
            port,
        }
    }

    /// Shorthand for a stream endpoint.
    pub fn stream(url: impl Into<String>) -> Self {
        Self::Stream { url: url.into() }
    }

    /// Returns `true` for the connectionless variant.
    pub fn is_datagram(&self) -> bool {
        matches!(self, Self::Datagram { .. })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datagram { host, port } => write!(f, "udp://{host}:{port}"),
            Self::Stream { url } => f.write_str(url),
        }
    }
}
