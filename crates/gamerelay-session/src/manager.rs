//! The session manager: one worker task that owns the connection.
//!
//! Producers never touch the transport. They hand envelopes to a
//! [`SessionHandle`], which forwards them over a bounded channel to the
//! worker. The worker is the only code that opens, writes to, reads
//! from, and closes the connection, so sends are never interleaved and
//! at most one connect attempt is in flight.
//!
//! ```text
//! producers ──enqueue──→ [bounded mpsc] ──→ worker ──send──→ Connection
//! commands ──reconnect──→ [control mpsc] ──↗      ╰──state──→ watch
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gamerelay_protocol::{Codec, Envelope, JsonCodec, ProtocolError};
use gamerelay_transport::{Connection, ConnectionId, Endpoint, Transport, TransportError};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{SessionConfig, SessionError, SessionState, TokenCell};

/// Characters of payload shown in verbose and inbound logs.
const PREVIEW_CHARS: usize = 50;

/// Extra time `shutdown` waits beyond the close grace before aborting.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(1);

/// An envelope bound to the connection that was live when it was
/// accepted. The worker drops it if that connection is gone.
#[derive(Debug)]
struct Outbound {
    conn_id: ConnectionId,
    envelope: Envelope,
}

enum Control {
    Reconnect,
}

/// What the worker does after a phase ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Wait out the reconnect delay, then connect.
    Backoff,
    /// Connect right away.
    Immediately,
    /// Exit the worker.
    Stop,
}

/// Something the connected loop woke up for.
enum Event {
    Shutdown,
    Reconnect,
    AuthDue,
    Outbound(Outbound),
    Inbound(Result<Option<Vec<u8>>, TransportError>),
}

enum Attempt<C> {
    Opened(C),
    Failed(TransportError),
    Reconnect,
    Shutdown,
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// The worker that drives one outbound connection through its lifecycle.
///
/// Created and started by [`SessionManager::spawn`]; everything else
/// talks to it through the returned [`SessionHandle`].
pub struct SessionManager<T: Transport> {
    transport: T,
    endpoint: watch::Receiver<Endpoint>,
    target: Endpoint,
    token: TokenCell,
    config: SessionConfig,
    codec: JsonCodec,
    state: watch::Sender<SessionState>,
    outbound: mpsc::Receiver<Outbound>,
    control: mpsc::UnboundedReceiver<Control>,
    shutdown: CancellationToken,
    verbose: Arc<AtomicBool>,
}

impl<T: Transport> SessionManager<T> {
    /// Spawns the worker on the current Tokio runtime and connects
    /// immediately.
    ///
    /// The endpoint is read from `endpoint` at the start of every connect
    /// attempt, so a new value takes effect on the next reconnect. The
    /// token is read from `token` each time an `auth` or event envelope
    /// is written.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(
        transport: T,
        endpoint: watch::Receiver<Endpoint>,
        token: TokenCell,
        config: SessionConfig,
    ) -> SessionHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let shutdown = CancellationToken::new();
        let verbose = Arc::new(AtomicBool::new(false));
        let close_grace = config.close_grace;
        let target = endpoint.borrow().clone();

        let manager = Self {
            transport,
            endpoint,
            target,
            token,
            config,
            codec: JsonCodec,
            state: state_tx,
            outbound: outbound_rx,
            control: control_rx,
            shutdown: shutdown.clone(),
            verbose: Arc::clone(&verbose),
        };
        let worker = tokio::spawn(manager.run());

        SessionHandle {
            outbound: outbound_tx,
            control: control_tx,
            state: state_rx,
            shutdown,
            verbose,
            worker: Mutex::new(Some(worker)),
            close_grace,
        }
    }

    async fn run(mut self) {
        tracing::info!(endpoint = %self.target, "session worker started");

        let mut next = Next::Immediately;
        loop {
            match next {
                Next::Stop => break,
                Next::Backoff => {
                    if self.backoff().await == Next::Stop {
                        break;
                    }
                }
                Next::Immediately => {}
            }

            next = match self.connect().await {
                Ok(conn) => self.drive(conn).await,
                Err(next) => next,
            };
        }

        self.set_state(SessionState::Disconnected);
        tracing::info!("session worker stopped");
    }

    /// Waits out the reconnect delay. A manual reconnect cuts the wait
    /// short.
    async fn backoff(&mut self) -> Next {
        let delay = self.config.reconnect.next_delay();
        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");

        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Next::Stop,
                control = self.control.recv() => {
                    return match control {
                        Some(Control::Reconnect) => {
                            tracing::info!("manual reconnect, skipping reconnect delay");
                            Next::Immediately
                        }
                        None => Next::Stop,
                    };
                }
                _ = &mut timer => return Next::Immediately,
                Some(stale) = self.outbound.recv() => {
                    tracing::debug!(
                        conn_id = %stale.conn_id,
                        kind = %stale.envelope.kind,
                        "dropping envelope for a closed connection"
                    );
                }
            }
        }
    }

    /// Makes one open attempt against the current endpoint.
    async fn connect(&mut self) -> Result<T::Connection, Next> {
        self.target = self.endpoint.borrow_and_update().clone();
        self.set_state(SessionState::Connecting);
        tracing::info!(endpoint = %self.target, "connecting");

        let attempt = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Attempt::Shutdown,
            control = self.control.recv() => match control {
                Some(Control::Reconnect) => Attempt::Reconnect,
                None => Attempt::Shutdown,
            },
            opened = tokio::time::timeout(
                self.config.connect_timeout,
                self.transport.open(&self.target),
            ) => match opened {
                Ok(Ok(conn)) => Attempt::Opened(conn),
                Ok(Err(e)) => Attempt::Failed(e),
                Err(_) => Attempt::Failed(TransportError::Timeout(
                    self.config.connect_timeout,
                )),
            },
        };

        match attempt {
            Attempt::Opened(conn) => Ok(conn),
            Attempt::Failed(e) => {
                tracing::warn!(endpoint = %self.target, error = %e, "connect failed");
                self.set_state(SessionState::Disconnected);
                Err(Next::Backoff)
            }
            Attempt::Reconnect => {
                tracing::info!("manual reconnect, restarting connect attempt");
                self.set_state(SessionState::Disconnected);
                Err(Next::Immediately)
            }
            Attempt::Shutdown => {
                self.set_state(SessionState::Disconnected);
                Err(Next::Stop)
            }
        }
    }

    /// Runs one open connection until it is lost, replaced, or shut down.
    async fn drive(&mut self, mut conn: T::Connection) -> Next {
        let conn_id = conn.id();
        let auth_at = Instant::now() + self.config.auth_delay;
        let mut auth_sent = false;
        let mut held: VecDeque<Envelope> = VecDeque::new();

        self.set_state(SessionState::Connected { conn_id, auth_sent });
        tracing::info!(%conn_id, endpoint = %self.target, "connected");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Event::Shutdown,
                control = self.control.recv() => match control {
                    Some(Control::Reconnect) => Event::Reconnect,
                    None => Event::Shutdown,
                },
                _ = tokio::time::sleep_until(auth_at), if !auth_sent => Event::AuthDue,
                outbound = self.outbound.recv() => match outbound {
                    Some(outbound) => Event::Outbound(outbound),
                    None => Event::Shutdown,
                },
                inbound = conn.recv() => Event::Inbound(inbound),
            };

            match event {
                Event::Shutdown => {
                    self.close(&mut conn, "shutdown").await;
                    return Next::Stop;
                }
                Event::Reconnect => {
                    tracing::info!(%conn_id, "manual reconnect, closing current connection");
                    self.close(&mut conn, "reconnect").await;
                    return Next::Immediately;
                }
                Event::AuthDue => {
                    let token = self.token.get();
                    if let Err(e) = self.transmit(&mut conn, Envelope::auth(token.as_str())).await {
                        return self.fail(&mut conn, e).await;
                    }
                    auth_sent = true;
                    self.set_state(SessionState::Connected { conn_id, auth_sent });
                    tracing::info!(%conn_id, %token, "auth sent");

                    while let Some(envelope) = held.pop_front() {
                        if let Err(e) = self.transmit(&mut conn, envelope).await {
                            return self.fail(&mut conn, e).await;
                        }
                    }
                }
                Event::Outbound(Outbound { conn_id: bound_to, envelope }) => {
                    if bound_to != conn_id {
                        tracing::debug!(
                            %conn_id,
                            stale = %bound_to,
                            kind = %envelope.kind,
                            "dropping envelope for a closed connection"
                        );
                        continue;
                    }
                    if !auth_sent {
                        if held.len() >= self.config.queue_capacity {
                            tracing::warn!(
                                %conn_id,
                                kind = %envelope.kind,
                                "pre-auth buffer full, dropping envelope"
                            );
                        } else {
                            held.push_back(envelope);
                        }
                        continue;
                    }
                    if let Err(e) = self.transmit(&mut conn, envelope).await {
                        return self.fail(&mut conn, e).await;
                    }
                }
                Event::Inbound(Ok(Some(data))) => {
                    tracing::debug!(
                        %conn_id,
                        len = data.len(),
                        payload = %preview(&data),
                        "inbound message ignored"
                    );
                }
                Event::Inbound(Ok(None)) => {
                    tracing::info!(%conn_id, "connection closed by remote");
                    self.set_state(SessionState::Disconnected);
                    return Next::Backoff;
                }
                Event::Inbound(Err(e)) => {
                    tracing::warn!(%conn_id, error = %e, "connection lost");
                    self.set_state(SessionState::Disconnected);
                    return Next::Backoff;
                }
            }
        }
    }

    /// Stamps, encodes, and writes one envelope.
    ///
    /// Encoding failures drop the envelope and leave the connection up.
    /// Only transport errors are returned.
    async fn transmit(
        &self,
        conn: &mut T::Connection,
        mut envelope: Envelope,
    ) -> Result<(), TransportError> {
        if !envelope.is_auth() {
            envelope.token = self.token.get().to_string();
        }

        let bytes = match self.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(kind = %envelope.kind, error = %e, "dropping unencodable envelope");
                return Ok(());
            }
        };

        conn.send(&bytes).await?;

        if self.verbose.load(Ordering::Relaxed) {
            tracing::info!(
                conn_id = %conn.id(),
                endpoint = %self.target,
                bytes = bytes.len(),
                payload = %preview(&bytes),
                "sent {}",
                envelope.kind
            );
        } else {
            tracing::trace!(
                conn_id = %conn.id(),
                kind = %envelope.kind,
                bytes = bytes.len(),
                "sent"
            );
        }
        Ok(())
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        if envelope.token.is_empty() {
            return Err(ProtocolError::InvalidMessage(format!(
                "{} envelope has no token",
                envelope.kind
            )));
        }
        self.codec.encode(envelope)
    }

    /// A write failed: the connection is treated as dead.
    async fn fail(&self, conn: &mut T::Connection, error: TransportError) -> Next {
        tracing::warn!(conn_id = %conn.id(), error = %error, "send failed, dropping connection");
        self.close(conn, "send failed").await;
        Next::Backoff
    }

    /// Closes `conn`, giving up after the close grace.
    async fn close(&self, conn: &mut T::Connection, reason: &str) {
        let conn_id = conn.id();
        self.set_state(SessionState::Closing);

        match tokio::time::timeout(self.config.close_grace, conn.close(reason)).await {
            Ok(Ok(())) => tracing::debug!(%conn_id, reason, "connection closed"),
            Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "close failed"),
            Err(_) => tracing::warn!(%conn_id, "close did not finish within grace period"),
        }

        self.set_state(SessionState::Disconnected);
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "session state changed");
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// The producer-facing side of a running session.
///
/// Every method is non-blocking except [`shutdown`](Self::shutdown).
/// Dropping the handle stops the worker.
pub struct SessionHandle {
    outbound: mpsc::Sender<Outbound>,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    verbose: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    close_grace: Duration,
}

impl SessionHandle {
    /// Hands an envelope to the worker.
    ///
    /// Accepted only while a connection is open; the envelope is bound to
    /// that connection and dropped if it goes away before the write.
    /// Nothing is buffered across reconnects.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`] — no open connection
    /// - [`SessionError::QueueFull`] — the worker is behind
    /// - [`SessionError::Closed`] — the session was shut down
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }

        let state = *self.state.borrow();
        let Some(conn_id) = state.connection() else {
            tracing::debug!(kind = %envelope.kind, %state, "not connected, dropping envelope");
            return Err(SessionError::NotConnected);
        };

        match self.outbound.try_send(Outbound { conn_id, envelope }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(outbound)) => {
                tracing::warn!(
                    kind = %outbound.envelope.kind,
                    "outbound queue full, dropping envelope"
                );
                Err(SessionError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SessionError::Closed),
        }
    }

    /// Closes the current connection (or abandons the current attempt or
    /// reconnect delay) and connects again right away.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] if the worker has stopped.
    pub fn reconnect(&self) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.control
            .send(Control::Reconnect)
            .map_err(|_| SessionError::Closed)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Toggles per-send logging at info level.
    pub fn set_verbose(&self, enabled: bool) {
        self.verbose.store(enabled, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Stops the worker and waits for it to close the connection.
    ///
    /// The close is bounded by the close grace; a worker that still has
    /// not exited shortly after is aborted. Calling this twice is a no-op.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            return;
        };

        let limit = self.close_grace + SHUTDOWN_SLACK;
        if tokio::time::timeout(limit, &mut worker).await.is_err() {
            tracing::warn!(?limit, "session worker did not stop in time, aborting");
            worker.abort();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The first [`PREVIEW_CHARS`] characters of `data`, lossily decoded.
fn preview(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
