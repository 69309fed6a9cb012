//! Error types for the protocol layer.

/// Errors that can occur while turning envelopes into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed or truncated input).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates the envelope rules, e.g. an
    /// envelope without a token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
