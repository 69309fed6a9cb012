use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be reached or the handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The endpoint description is unusable for this transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An operation did not finish within its allotted time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
