//! Wire protocol for gamerelay.
//!
//! This crate defines what the relay says to the remote listener:
//!
//! - **Types** ([`Envelope`], [`EnvelopeKind`]) — the one-object-per-message
//!   wire unit.
//! - **Domain events** ([`GameEvent`], [`PlayerRef`]) — what the host
//!   application reports.
//! - **Encoder** ([`EventEncoder`]) — turns a domain event into an
//!   envelope, stripping formatting codes from free text.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become bytes.
//!
//! ```text
//! GameEvent → EventEncoder → Envelope → Codec → bytes
//! ```
//!
//! The token is deliberately *not* set by the encoder. The session layer
//! stamps it at send time.

mod codec;
mod encoder;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use encoder::{EventEncoder, strip_formatting};
pub use error::ProtocolError;
pub use types::{Envelope, EnvelopeKind, EventKind, GameEvent, PlayerRef};
