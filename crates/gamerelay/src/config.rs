//! Relay configuration and where it is read from.
//!
//! Every field has a default, so a partial file (or none at all) still
//! yields a complete [`RelayConfig`]:
//!
//! ```toml
//! transport = "udp"          # or "websocket"
//! udp_host = "127.0.0.1"
//! udp_port = 45345
//! ws_url = "ws://127.0.0.1:45345"
//! show_all_log = false
//!
//! [events]
//! join = true
//! quit = true
//! chat = true
//! death = true
//!
//! [chat]
//! send_cancelled = false
//!
//! [session]
//! reconnect_delay_ms = 5000
//! reconnect_jitter_ms = 5000
//! auth_delay_ms = 500
//! close_grace_ms = 2000
//! connect_timeout_ms = 10000
//! queue_capacity = 256
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gamerelay_protocol::{EventKind, GameEvent};
use gamerelay_session::{ReconnectPolicy, SessionConfig};
use gamerelay_transport::Endpoint;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Which channel carries envelopes to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Fire-and-forget UDP datagrams to `udp_host:udp_port`.
    #[default]
    Udp,
    /// A WebSocket session to `ws_url`.
    #[serde(alias = "ws")]
    Websocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Websocket => f.write_str("websocket"),
        }
    }
}

/// A complete configuration snapshot.
///
/// Snapshots are immutable once loaded; a reload swaps in a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub transport: TransportKind,
    pub udp_host: String,
    pub udp_port: u16,
    pub ws_url: String,

    /// Logs every relayed event and every send at info level.
    pub show_all_log: bool,

    pub events: EventToggles,
    pub chat: ChatOptions,
    pub session: SessionSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Udp,
            udp_host: "127.0.0.1".to_string(),
            udp_port: 45345,
            ws_url: "ws://127.0.0.1:45345".to_string(),
            show_all_log: false,
            events: EventToggles::default(),
            chat: ChatOptions::default(),
            session: SessionSettings::default(),
        }
    }
}

impl RelayConfig {
    /// The listener selected by `transport`.
    pub fn endpoint(&self) -> Endpoint {
        match self.transport {
            TransportKind::Udp => Endpoint::datagram(self.udp_host.clone(), self.udp_port),
            TransportKind::Websocket => Endpoint::stream(self.ws_url.clone()),
        }
    }

    /// Whether `event` should be relayed at all.
    ///
    /// Applies the per-kind switch, then drops cancelled chat unless
    /// `chat.send_cancelled` is set.
    pub fn forwards(&self, event: &GameEvent) -> bool {
        if !self.events.is_enabled(event.kind()) {
            return false;
        }
        !event.is_cancelled() || self.chat.send_cancelled
    }

    /// Worker tuning derived from the `[session]` table.
    pub fn session_config(&self) -> SessionConfig {
        let s = &self.session;
        SessionConfig {
            reconnect: ReconnectPolicy::with_jitter(
                Duration::from_millis(s.reconnect_delay_ms),
                Duration::from_millis(s.reconnect_jitter_ms),
            ),
            auth_delay: Duration::from_millis(s.auth_delay_ms),
            queue_capacity: s.queue_capacity,
            close_grace: Duration::from_millis(s.close_grace_ms),
            connect_timeout: Duration::from_millis(s.connect_timeout_ms),
        }
    }
}

/// Per-kind enable switches (`[events]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventToggles {
    pub join: bool,
    pub quit: bool,
    pub chat: bool,
    pub death: bool,
}

impl Default for EventToggles {
    fn default() -> Self {
        Self {
            join: true,
            quit: true,
            chat: true,
            death: true,
        }
    }
}

impl EventToggles {
    pub fn is_enabled(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Join => self.join,
            EventKind::Quit => self.quit,
            EventKind::Chat => self.chat,
            EventKind::Death => self.death,
        }
    }
}

/// Chat handling (`[chat]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    /// Relay chat lines that an upstream handler cancelled.
    pub send_cancelled: bool,
}

/// Session worker tuning (`[session]`). Read once at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub reconnect_delay_ms: u64,
    pub reconnect_jitter_ms: u64,
    pub auth_delay_ms: u64,
    pub close_grace_ms: u64,
    pub connect_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5_000,
            reconnect_jitter_ms: 5_000,
            auth_delay_ms: 500,
            close_grace_ms: 2_000,
            connect_timeout_ms: 10_000,
            queue_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigSource
// ---------------------------------------------------------------------------

/// A read-only provider of configuration snapshots.
///
/// Called once at start and again on every reload. Any closure returning
/// a snapshot is a source, which is handy in tests.
pub trait ConfigSource: Send + Sync {
    /// Reads a fresh snapshot.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the backing store cannot be read or
    /// parsed. Callers fall back to defaults.
    fn load(&self) -> Result<RelayConfig, ConfigError>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<RelayConfig, ConfigError> + Send + Sync,
{
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        self()
    }
}

/// Loads from `source`, substituting defaults on error.
pub fn load_or_default(source: &dyn ConfigSource) -> RelayConfig {
    match source.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            RelayConfig::default()
        }
    }
}

/// A [`ConfigSource`] backed by a TOML file.
///
/// A missing file is created with the defaults on first load, so
/// operators have something to edit.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_defaults(&self) -> Result<RelayConfig, ConfigError> {
        let config = RelayConfig::default();
        let rendered = toml::to_string_pretty(&config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, rendered)?;
        tracing::info!(path = %self.path.display(), "wrote default config");
        Ok(config)
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<RelayConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.write_defaults();
            }
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&text)?)
    }
}
