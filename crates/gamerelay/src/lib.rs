//! # gamerelay
//!
//! Relays game-session events (join, quit, chat, death) from a host
//! application to a remote listener over UDP or WebSocket.
//!
//! The host reports typed [`GameEvent`]s; the relay filters them by
//! configuration, encodes them into token-stamped envelopes, and hands
//! them to a single session worker that keeps the connection alive.
//! Nothing the relay does can block the host or crash it: failures turn
//! into "events are not being relayed right now" plus a log line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamerelay::prelude::*;
//!
//! # async fn run() {
//! let relay = Relay::start(
//!     NetTransport,
//!     FileConfigSource::new("plugins/gamerelay/config.toml"),
//!     TokenStore::new(FileBlobStore::new("plugins/gamerelay/token")),
//! );
//!
//! let alex = PlayerRef::new("Alex", uuid::Uuid::nil());
//! relay.on_event(&GameEvent::join(alex));
//!
//! let reply = execute(&relay, &Caller::Console, &["token", "get"]);
//! println!("{reply}");
//!
//! relay.shutdown().await;
//! # }
//! ```

mod commands;
mod config;
mod error;
mod relay;

pub use commands::{Caller, CommandReply, Subcommand, TokenAction, complete, execute};
pub use config::{
    ChatOptions, ConfigSource, EventToggles, FileConfigSource, RelayConfig, SessionSettings,
    TransportKind, load_or_default,
};
pub use error::{CommandError, ConfigError, RelayError};
pub use relay::{EventOutcome, ReloadSummary, Relay};

pub mod prelude {
    //! Everything a host integration usually needs.

    pub use crate::{
        Caller, CommandReply, ConfigSource, EventOutcome, FileConfigSource, Relay, RelayConfig,
        RelayError, complete, execute,
    };
    pub use gamerelay_protocol::{GameEvent, PlayerRef};
    pub use gamerelay_session::{FileBlobStore, SessionState, Token, TokenStore};
    pub use gamerelay_transport::{DatagramTransport, Endpoint, NetTransport, Transport};
}
