//! Wire and domain types.
//!
//! [`Envelope`] is the only thing that travels on the wire. [`GameEvent`]
//! is what the host application hands us; it never leaves the process.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EnvelopeKind
// ---------------------------------------------------------------------------

/// The `type` tag of an envelope.
///
/// Serialized in lowercase (`"auth"`, `"join"`, ...) because that is what
/// listeners match on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// Sent once per connection, carrying only the shared token.
    Auth,
    Join,
    Quit,
    Chat,
    Death,
}

impl EnvelopeKind {
    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Join => "join",
            Self::Quit => "quit",
            Self::Chat => "chat",
            Self::Death => "death",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One outbound message: a type tag, the shared token, and the
/// type-specific fields.
///
/// ```text
/// {"type":"chat","token":"k3j9...","player":"Steve","uuid":"...",
///  "time":1700000000000,"message":"hi"}
/// ```
///
/// Optional fields are omitted from the JSON when absent. `message` is
/// present (possibly empty) on every chat and death envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,

    /// The shared secret. Empty until the session stamps it at send time.
    #[serde(default)]
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    /// Epoch milliseconds at the moment the source event occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Builds the `auth` envelope for `token`.
    pub fn auth(token: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Auth,
            token: token.into(),
            player: None,
            uuid: None,
            time: None,
            message: None,
        }
    }

    /// Returns `true` for the authentication envelope.
    pub fn is_auth(&self) -> bool {
        self.kind == EnvelopeKind::Auth
    }
}

// ---------------------------------------------------------------------------
// Domain events
// ---------------------------------------------------------------------------

/// The player an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerRef {
    /// Display name at the time of the event.
    pub name: String,
    /// Stable identifier; survives renames.
    pub uuid: Uuid,
}

impl PlayerRef {
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
        }
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which kind of domain event occurred. Used for per-kind enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Quit,
    Chat,
    Death,
}

impl From<EventKind> for EnvelopeKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Join => Self::Join,
            EventKind::Quit => Self::Quit,
            EventKind::Chat => Self::Chat,
            EventKind::Death => Self::Death,
        }
    }
}

/// A typed event reported by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Join {
        player: PlayerRef,
        at: DateTime<Utc>,
    },
    Quit {
        player: PlayerRef,
        at: DateTime<Utc>,
    },
    /// A chat line. `cancelled` is set when an upstream handler vetoed it.
    Chat {
        player: PlayerRef,
        message: String,
        cancelled: bool,
        at: DateTime<Utc>,
    },
    /// A death. The host may not supply a message.
    Death {
        player: PlayerRef,
        message: Option<String>,
        at: DateTime<Utc>,
    },
}

impl GameEvent {
    /// A join happening now.
    pub fn join(player: PlayerRef) -> Self {
        Self::Join {
            player,
            at: Utc::now(),
        }
    }

    /// A quit happening now.
    pub fn quit(player: PlayerRef) -> Self {
        Self::Quit {
            player,
            at: Utc::now(),
        }
    }

    /// A chat line sent now.
    pub fn chat(
        player: PlayerRef,
        message: impl Into<String>,
        cancelled: bool,
    ) -> Self {
        Self::Chat {
            player,
            message: message.into(),
            cancelled,
            at: Utc::now(),
        }
    }

    /// A death happening now.
    pub fn death(player: PlayerRef, message: Option<String>) -> Self {
        Self::Death {
            player,
            message,
            at: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Join { .. } => EventKind::Join,
            Self::Quit { .. } => EventKind::Quit,
            Self::Chat { .. } => EventKind::Chat,
            Self::Death { .. } => EventKind::Death,
        }
    }

    pub fn player(&self) -> &PlayerRef {
        match self {
            Self::Join { player, .. }
            | Self::Quit { player, .. }
            | Self::Chat { player, .. }
            | Self::Death { player, .. } => player,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Join { at, .. }
            | Self::Quit { at, .. }
            | Self::Chat { at, .. }
            | Self::Death { at, .. } => *at,
        }
    }

    /// Returns `true` for a chat line an upstream handler cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Chat { cancelled: true, .. })
    }
}

// =========================================================================
// Tests
// =========================================================================
