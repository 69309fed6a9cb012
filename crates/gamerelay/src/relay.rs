//! The relay: turns host events into envelopes and owns the session.
//!
//! This is the entry point for embedding gamerelay. It ties together all
//! the layers: configuration → event filter → encoder → session →
//! transport.

use std::fmt;
use std::sync::Arc;

use gamerelay_protocol::{EnvelopeKind, EventEncoder, GameEvent};
use gamerelay_session::{
    SessionHandle, SessionManager, SessionState, Token, TokenCell, TokenStore,
};
use gamerelay_transport::{Endpoint, Transport};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::config::load_or_default;
use crate::{ConfigSource, RelayConfig, RelayError};

/// What happened to one host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Handed to the session worker.
    Queued,
    /// Switched off by configuration, or a cancelled chat line.
    Filtered,
    /// Accepted by the filter but not relayed (disconnected or backed up).
    Dropped,
}

/// The effective settings after a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub endpoint: Endpoint,
    pub verbose: bool,
    /// The endpoint differed from the previous one, so a reconnect was
    /// requested.
    pub reconnecting: bool,
}

impl fmt::Display for ReloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config reloaded (endpoint: {} | verbose log: {})",
            self.endpoint,
            if self.verbose { "enabled" } else { "disabled" }
        )?;
        if self.reconnecting {
            write!(f, ", reconnecting")?;
        }
        Ok(())
    }
}

/// A running relay.
///
/// All methods take `&self`, and [`on_event`](Self::on_event) never
/// blocks, so one `Relay` (typically in an `Arc`) can be shared by every
/// thread the host fires events on.
pub struct Relay {
    source: Box<dyn ConfigSource>,
    config: RwLock<Arc<RelayConfig>>,
    tokens: TokenStore,
    token: TokenCell,
    encoder: EventEncoder,
    endpoint: watch::Sender<Endpoint>,
    session: SessionHandle,
}

impl Relay {
    /// Loads configuration and the token, then starts the session worker,
    /// which connects right away.
    ///
    /// Configuration errors fall back to defaults and token errors to a
    /// fresh token; both are logged and neither stops the start.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn start<T: Transport>(
        transport: T,
        source: impl ConfigSource + 'static,
        tokens: TokenStore,
    ) -> Self {
        let config = load_or_default(&source);
        let token = TokenCell::new(tokens.load_or_generate());

        let endpoint = config.endpoint();
        let (endpoint_tx, endpoint_rx) = watch::channel(endpoint.clone());
        let session = SessionManager::spawn(
            transport,
            endpoint_rx,
            token.clone(),
            config.session_config(),
        );
        session.set_verbose(config.show_all_log);

        tracing::info!(%endpoint, transport = %config.transport, "relay started");

        Self {
            source: Box::new(source),
            config: RwLock::new(Arc::new(config)),
            tokens,
            token,
            encoder: EventEncoder,
            endpoint: endpoint_tx,
            session,
        }
    }

    /// Filters, encodes, and enqueues one host event.
    pub fn on_event(&self, event: &GameEvent) -> EventOutcome {
        let config = self.config();
        let kind = EnvelopeKind::from(event.kind());

        if !config.forwards(event) {
            tracing::trace!(
                %kind,
                player = %event.player(),
                cancelled = event.is_cancelled(),
                "event filtered"
            );
            return EventOutcome::Filtered;
        }

        let envelope = self.encoder.encode(event);
        if config.show_all_log {
            tracing::info!(
                %kind,
                player = %event.player(),
                message = envelope.message.as_deref().unwrap_or_default(),
                "relaying event"
            );
        }

        match self.session.enqueue(envelope) {
            Ok(()) => EventOutcome::Queued,
            Err(_) => EventOutcome::Dropped,
        }
    }

    /// Re-reads the configuration and swaps it in whole.
    ///
    /// The filter flags and verbose toggle apply to the next event. A
    /// changed endpoint triggers a reconnect; the `[session]` table is
    /// only read at start.
    pub fn reload(&self) -> ReloadSummary {
        let fresh = Arc::new(load_or_default(self.source.as_ref()));
        let endpoint = fresh.endpoint();
        let verbose = fresh.show_all_log;

        *self.config.write() = Arc::clone(&fresh);
        self.session.set_verbose(verbose);

        let reconnecting = self.endpoint.send_if_modified(|current| {
            if *current == endpoint {
                return false;
            }
            *current = endpoint.clone();
            true
        });
        if reconnecting {
            tracing::info!(%endpoint, "endpoint changed, reconnecting");
            if let Err(e) = self.session.reconnect() {
                tracing::warn!(error = %e, "reconnect after reload failed");
            }
        }

        tracing::info!(%endpoint, verbose, "config reloaded");
        ReloadSummary {
            endpoint,
            verbose,
            reconnecting,
        }
    }

    /// Drops the current connection and connects again immediately.
    ///
    /// # Errors
    /// Returns [`RelayError::Session`] if the relay has been shut down.
    pub fn reconnect(&self) -> Result<(), RelayError> {
        self.session.reconnect()?;
        tracing::info!(endpoint = %*self.endpoint.borrow(), "manual reconnect requested");
        Ok(())
    }

    /// The token the next `auth` and every following event will carry.
    pub fn token(&self) -> Token {
        self.token.get()
    }

    /// Generates, persists, and installs a new token.
    ///
    /// The live connection is kept; the listener sees the new token on
    /// the next event and in the `auth` of the next connection. A failed
    /// save is logged and the new token is still used.
    pub fn reset_token(&self) -> Token {
        let token = self.tokens.generate();
        if let Err(e) = self.tokens.save(&token) {
            tracing::warn!(error = %e, "failed to persist new token");
        }
        self.token.set(token.clone());
        tracing::info!(%token, "token reset");
        token
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// A receiver that observes every session state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// The current configuration snapshot.
    pub fn config(&self) -> Arc<RelayConfig> {
        Arc::clone(&self.config.read())
    }

    /// Closes the connection and stops the session worker. No reconnect
    /// runs afterwards.
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
        tracing::info!("relay stopped");
    }
}
