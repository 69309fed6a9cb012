//! Error types for the session layer.

/// Errors from loading or persisting the shared token.
///
/// Callers treat [`NotFound`](Self::NotFound) and
/// [`Corrupt`](Self::Corrupt) the same way: generate a fresh token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Nothing has been persisted yet.
    #[error("no token has been stored")]
    NotFound,

    /// The stored blob is not valid base64, not UTF-8, or empty.
    #[error("stored token is corrupt: {0}")]
    Corrupt(String),

    /// Reading or writing the blob failed.
    #[error("token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the session handle.
///
/// None of these are fatal: each means one envelope was not relayed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token storage failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The session is not connected, so the envelope was dropped.
    #[error("not connected; envelope dropped")]
    NotConnected,

    /// The outbound queue is full, so the newest envelope was dropped.
    #[error("outbound queue full; envelope dropped")]
    QueueFull,

    /// The session has been shut down.
    #[error("session is shut down")]
    Closed,
}
