//! Error types for the relay crate, plus the unified [`RelayError`].

use gamerelay_protocol::ProtocolError;
use gamerelay_session::{SessionError, TokenError};
use gamerelay_transport::TransportError;

/// Errors from reading or materializing the configuration file.
///
/// Never fatal: the relay falls back to [`RelayConfig::default`].
///
/// [`RelayConfig::default`]: crate::RelayConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has mistyped values.
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The defaults could not be rendered as TOML.
    #[error("config serialize failed: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors from the administrative command surface.
///
/// The `Display` text is what the caller is shown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown subcommand '{0}'. usage: <reload|reconnect|token>")]
    UnknownSubcommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("this command can only be run from the console")]
    PermissionDenied,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not connected, queue full, shut down).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Token storage failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),
}
