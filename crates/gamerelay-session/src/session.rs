//! Session types: worker tuning and the published connection state.

use std::fmt;
use std::time::Duration;

use gamerelay_transport::ConnectionId;

use crate::ReconnectPolicy;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tuning for the session worker.
///
/// Read once when the worker is spawned.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before reconnecting after a failed open or a lost connection.
    pub reconnect: ReconnectPolicy,

    /// Pause between a successful open and the `auth` send, giving the
    /// listener time to finish its own setup. The listener must accept
    /// auth at any time, so this is a courtesy, not a requirement.
    pub auth_delay: Duration,

    /// Capacity of the producer → worker queue. When full, the newest
    /// envelope is dropped.
    pub queue_capacity: usize,

    /// Upper bound on a graceful close.
    pub close_grace: Duration,

    /// Upper bound on a single open attempt.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            auth_delay: Duration::from_millis(500),
            queue_capacity: 256,
            close_grace: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///                ┌──────── open failed / timed out ────────┐
///                ▼                                          │
///   Disconnected ──(connect)──→ Connecting ──(open)──→ Connected{auth_sent: false}
///        ▲                                                  │ auth delay elapsed
///        │                                                  ▼
///        └──── Closing ←──(reconnect/shutdown)── Connected{auth_sent: true}
///                                 (remote close or send error → Disconnected)
/// ```
///
/// `auth_sent` belongs to one connection: every new connection starts
/// with `false`, so at most one `auth` envelope goes out per open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. A reconnect may be scheduled.
    Disconnected,

    /// An open attempt is in flight.
    Connecting,

    /// A connection is open and accepts envelopes.
    Connected {
        conn_id: ConnectionId,
        auth_sent: bool,
    },

    /// A graceful close is in progress.
    Closing,
}

impl SessionState {
    /// Returns `true` while envelopes are accepted.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// The live connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Connected { conn_id, .. } => Some(*conn_id),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { conn_id, auth_sent } => {
                write!(f, "Connected({conn_id}, auth_sent={auth_sent})")
            }
            Self::Closing => write!(f, "Closing"),
        }
    }
}
