//! Outbound session management for gamerelay.
//!
//! This crate keeps one connection to the listener alive and owns
//! everything that happens on it:
//!
//! 1. **Connection lifecycle**: connect, authenticate once per connection,
//!    detect loss, and reconnect after a delay ([`SessionManager`])
//! 2. **Producer hand-off**: a non-blocking, bounded queue that drops
//!    rather than blocks ([`SessionHandle::enqueue`])
//! 3. **Shared token**: generation, base64 persistence, and the live copy
//!    read at send time ([`TokenStore`], [`TokenCell`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)  ← filters game events, runs admin commands
//!     ↕
//! Session Layer (this crate)  ← owns the connection and the token
//!     ↕
//! Protocol + Transport (below)  ← envelope encoding, UDP/WebSocket I/O
//! ```

mod backoff;
mod error;
mod manager;
mod session;
mod token;

pub use backoff::ReconnectPolicy;
pub use error::{SessionError, TokenError};
pub use manager::{SessionHandle, SessionManager};
pub use session::{SessionConfig, SessionState};
pub use token::{
    BlobStore, FileBlobStore, MemoryBlobStore, TOKEN_LEN, Token, TokenCell, TokenStore,
};
