//! Integration tests for the session worker: auth, ordering, reconnects,
//! and shutdown, driven through an in-memory transport on a paused clock.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use gamerelay_protocol::{Envelope, EnvelopeKind};
use gamerelay_session::{
    ReconnectPolicy, SessionConfig, SessionError, SessionHandle, SessionManager, SessionState,
    Token, TokenCell,
};
use gamerelay_transport::{Connection, ConnectionId, Endpoint, Transport, TransportError};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

// =========================================================================
// Mock transport
// =========================================================================

#[derive(Default)]
struct MockState {
    opens: usize,
    refuse: bool,
    hang_opens: bool,
    fail_sends: bool,
    sent: Vec<(ConnectionId, Vec<u8>)>,
    closed: Vec<(ConnectionId, String)>,
    hangups: HashMap<ConnectionId, mpsc::UnboundedSender<()>>,
}

/// Records every open, send, and close; lets tests refuse or stall opens,
/// fail sends, and hang up from the remote side.
#[derive(Clone, Default)]
struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn opens(&self) -> usize {
        self.state.lock().opens
    }

    fn refuse(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    fn hang_opens(&self, hang: bool) {
        self.state.lock().hang_opens = hang;
    }

    fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    fn hang_up(&self, id: ConnectionId) {
        if let Some(tx) = self.state.lock().hangups.get(&id) {
            let _ = tx.send(());
        }
    }

    fn sent(&self) -> Vec<(ConnectionId, Envelope)> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|(id, bytes)| (*id, serde_json::from_slice(bytes).unwrap()))
            .collect()
    }

    fn auths(&self) -> Vec<(ConnectionId, Envelope)> {
        self.sent().into_iter().filter(|(_, e)| e.is_auth()).collect()
    }

    fn closed(&self) -> Vec<(ConnectionId, String)> {
        self.state.lock().closed.clone()
    }
}

impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn open(&self, _endpoint: &Endpoint) -> Result<MockConnection, TransportError> {
        let hang = {
            let mut state = self.state.lock();
            state.opens += 1;
            state.hang_opens
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if state.refuse {
            return Err(TransportError::Connect(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        let id = ConnectionId::next();
        let (hangup_tx, hangup_rx) = mpsc::unbounded_channel();
        state.hangups.insert(id, hangup_tx);
        Ok(MockConnection {
            id,
            state: Arc::clone(&self.state),
            hangup: hangup_rx,
        })
    }
}

struct MockConnection {
    id: ConnectionId,
    state: Arc<Mutex<MockState>>,
    hangup: mpsc::UnboundedReceiver<()>,
}

impl Connection for MockConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        state.sent.push((self.id, data.to_vec()));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let _ = self.hangup.recv().await;
        Ok(None)
    }

    async fn close(&mut self, reason: &str) -> Result<(), TransportError> {
        self.state.lock().closed.push((self.id, reason.to_string()));
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn test_config() -> SessionConfig {
    SessionConfig {
        reconnect: ReconnectPolicy::fixed(Duration::from_secs(1)),
        auth_delay: Duration::from_millis(500),
        queue_capacity: 16,
        close_grace: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(1),
    }
}

fn start(transport: &MockTransport, token: &TokenCell, config: SessionConfig) -> SessionHandle {
    let (_endpoint_tx, endpoint_rx) = watch::channel(Endpoint::datagram("127.0.0.1", 45345));
    SessionManager::spawn(transport.clone(), endpoint_rx, token.clone(), config)
}

fn token(value: &str) -> TokenCell {
    TokenCell::new(Token::new(value).unwrap())
}

fn event(kind: EnvelopeKind, player: &str) -> Envelope {
    Envelope {
        kind,
        token: String::new(),
        player: Some(player.to_string()),
        uuid: None,
        time: Some(1_700_000_000_000),
        message: None,
    }
}

/// Waits until the session is authenticated on a connection other than
/// `not_on`, returning that connection.
async fn authenticated(handle: &SessionHandle, not_on: Option<ConnectionId>) -> ConnectionId {
    let mut states = handle.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(30),
        states.wait_for(|s| {
            matches!(
                s,
                SessionState::Connected { conn_id, auth_sent: true } if Some(*conn_id) != not_on
            )
        }),
    )
    .await
    .expect("session did not authenticate in time")
    .expect("session worker stopped");
    state.connection().unwrap()
}

// =========================================================================
// Auth
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_sends_exactly_one_auth() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());

    let conn = authenticated(&handle, None).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let auths = transport.auths();
    assert_eq!(auths.len(), 1);
    assert_eq!(auths[0].0, conn);
    assert_eq!(auths[0].1.token, "tok-1");
    assert_eq!(transport.opens(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_auth_waits_for_auth_delay() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let started = Instant::now();

    authenticated(&handle, None).await;

    assert!(started.elapsed() >= Duration::from_millis(500));
    handle.shutdown().await;
}

// =========================================================================
// Ordering and token stamping
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_enqueue_preserves_order_and_stamps_token() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    authenticated(&handle, None).await;

    handle.enqueue(event(EnvelopeKind::Join, "Alex")).unwrap();
    handle.enqueue(event(EnvelopeKind::Chat, "Alex")).unwrap();
    handle.enqueue(event(EnvelopeKind::Quit, "Alex")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let kinds: Vec<_> = transport.sent().iter().map(|(_, e)| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EnvelopeKind::Auth,
            EnvelopeKind::Join,
            EnvelopeKind::Chat,
            EnvelopeKind::Quit
        ]
    );
    assert!(transport.sent().iter().all(|(_, e)| e.token == "tok-1"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_before_auth_is_delivered_after_auth() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());

    let mut states = handle.subscribe();
    states.wait_for(SessionState::is_connected).await.unwrap();
    assert!(matches!(handle.state(), SessionState::Connected { auth_sent: false, .. }));

    handle.enqueue(event(EnvelopeKind::Join, "Alex")).unwrap();
    authenticated(&handle, None).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let kinds: Vec<_> = transport.sent().iter().map(|(_, e)| e.kind).collect();
    assert_eq!(kinds, vec![EnvelopeKind::Auth, EnvelopeKind::Join]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_uses_token_current_at_send_time() {
    let transport = MockTransport::default();
    let cell = token("tok-1");
    let handle = start(&transport, &cell, test_config());
    authenticated(&handle, None).await;

    cell.set(Token::new("tok-2").unwrap());
    handle.enqueue(event(EnvelopeKind::Join, "Alex")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sent = transport.sent();
    assert_eq!(sent.last().unwrap().1.token, "tok-2");
    assert_eq!(transport.auths().len(), 1, "a token change alone does not re-auth");

    handle.shutdown().await;
}

// =========================================================================
// Drop policy
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_enqueue_while_disconnected_is_dropped_and_not_replayed() {
    let transport = MockTransport::default();
    transport.refuse(true);
    let handle = start(&transport, &token("tok-1"), test_config());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = handle.enqueue(event(EnvelopeKind::Join, "Alex"));
    assert!(matches!(result, Err(SessionError::NotConnected)));

    transport.refuse(false);
    authenticated(&handle, None).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let kinds: Vec<_> = transport.sent().iter().map(|(_, e)| e.kind).collect();
    assert_eq!(kinds, vec![EnvelopeKind::Auth]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_queued_envelopes_dropped_when_connection_closes() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let first = authenticated(&handle, None).await;

    // No await until after reconnect: all three are still queued, bound
    // to the first connection, when it closes.
    handle.enqueue(event(EnvelopeKind::Join, "A")).unwrap();
    handle.enqueue(event(EnvelopeKind::Chat, "B")).unwrap();
    handle.enqueue(event(EnvelopeKind::Quit, "C")).unwrap();
    handle.reconnect().unwrap();

    let second = authenticated(&handle, Some(first)).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent: Vec<_> = transport.sent().into_iter().map(|(id, e)| (id, e.kind)).collect();
    assert_eq!(
        sent,
        vec![(first, EnvelopeKind::Auth), (second, EnvelopeKind::Auth)],
        "queued envelopes must not reach either connection"
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_from_many_threads_keeps_per_producer_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;

    let transport = MockTransport::default();
    let config = SessionConfig {
        queue_capacity: PRODUCERS * PER_PRODUCER,
        ..test_config()
    };
    let handle = start(&transport, &token("tok-1"), config);
    authenticated(&handle, None).await;

    std::thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let handle = &handle;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let mut envelope = event(EnvelopeKind::Chat, &format!("p{producer}"));
                    envelope.message = Some(seq.to_string());
                    handle.enqueue(envelope).unwrap();
                }
            });
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1 + PRODUCERS * PER_PRODUCER);
    assert_eq!(transport.auths().len(), 1);

    let mut per_producer: HashMap<String, Vec<usize>> = HashMap::new();
    for (_, envelope) in sent.into_iter().filter(|(_, e)| !e.is_auth()) {
        let seq = envelope.message.unwrap().parse().unwrap();
        per_producer.entry(envelope.player.unwrap()).or_default().push(seq);
    }
    assert_eq!(per_producer.len(), PRODUCERS);
    for (player, seqs) in per_producer {
        assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>(), "{player} out of order");
    }

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_full_queue_drops_newest() {
    let transport = MockTransport::default();
    let config = SessionConfig {
        queue_capacity: 2,
        ..test_config()
    };
    let handle = start(&transport, &token("tok-1"), config);
    authenticated(&handle, None).await;

    // No await between sends: the worker cannot drain on this runtime.
    assert!(handle.enqueue(event(EnvelopeKind::Join, "A")).is_ok());
    assert!(handle.enqueue(event(EnvelopeKind::Join, "B")).is_ok());
    let third = handle.enqueue(event(EnvelopeKind::Join, "C"));
    assert!(matches!(third, Err(SessionError::QueueFull)));

    tokio::time::sleep(Duration::from_millis(10)).await;
    let players: Vec<_> = transport
        .sent()
        .into_iter()
        .filter_map(|(_, e)| e.player)
        .collect();
    assert_eq!(players, vec!["A", "B"]);

    handle.shutdown().await;
}

// =========================================================================
// Reconnects
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_open_failure_retries_after_reconnect_delay() {
    let transport = MockTransport::default();
    transport.refuse(true);
    let handle = start(&transport, &token("tok-1"), test_config());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(handle.state(), SessionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.opens(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stalled_open_times_out_and_retries() {
    let transport = MockTransport::default();
    transport.hang_opens(true);
    let handle = start(&transport, &token("tok-1"), test_config());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.state(), SessionState::Connecting);

    // Connect timeout is 1s, reconnect delay another 1s.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(handle.state(), SessionState::Disconnected);
    assert_eq!(transport.opens(), 1);

    transport.hang_opens(false);
    authenticated(&handle, None).await;
    assert_eq!(transport.opens(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_jittered_retry_lands_in_window() {
    let transport = MockTransport::default();
    transport.refuse(true);
    let config = SessionConfig {
        reconnect: ReconnectPolicy::with_jitter(Duration::from_secs(5), Duration::from_secs(1)),
        ..test_config()
    };
    let handle = start(&transport, &token("tok-1"), config);

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(transport.opens(), 1, "no retry before the minimum delay");

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(transport.opens(), 2, "exactly one retry within the window");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_reconnects_and_reauths() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let first = authenticated(&handle, None).await;

    transport.hang_up(first);
    let second = authenticated(&handle, Some(first)).await;

    let auths = transport.auths();
    assert_eq!(auths.len(), 2);
    assert_eq!(auths[1].0, second);
    assert_eq!(transport.opens(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_reconnects() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let first = authenticated(&handle, None).await;

    transport.fail_sends(true);
    handle.enqueue(event(EnvelopeKind::Chat, "Alex")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.state().is_connected() || handle.state().connection() != Some(first));

    transport.fail_sends(false);
    authenticated(&handle, Some(first)).await;
    assert_eq!(transport.opens(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_uses_reset_token() {
    let transport = MockTransport::default();
    let cell = token("tok-1");
    let handle = start(&transport, &cell, test_config());
    let first = authenticated(&handle, None).await;

    cell.set(Token::new("tok-2").unwrap());
    let requested = Instant::now();
    handle.reconnect().unwrap();
    let second = authenticated(&handle, Some(first)).await;

    assert!(requested.elapsed() < Duration::from_secs(1), "no reconnect delay");
    let auths = transport.auths();
    assert_eq!(auths.len(), 2);
    assert_eq!(auths[1], (second, Envelope::auth("tok-2")));
    assert_eq!(transport.closed(), vec![(first, "reconnect".to_string())]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_skips_pending_delay() {
    let transport = MockTransport::default();
    transport.refuse(true);
    let config = SessionConfig {
        reconnect: ReconnectPolicy::fixed(Duration::from_secs(60)),
        ..test_config()
    };
    let handle = start(&transport, &token("tok-1"), config);
    tokio::time::sleep(Duration::from_millis(100)).await;

    transport.refuse(false);
    let requested = Instant::now();
    handle.reconnect().unwrap();
    authenticated(&handle, None).await;

    assert!(requested.elapsed() < Duration::from_secs(2));
    assert_eq!(transport.opens(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_manual_reconnect_opens_one_connection() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let first = authenticated(&handle, None).await;

    handle.reconnect().unwrap();
    handle.reconnect().unwrap();
    let last = authenticated(&handle, Some(first)).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    // The second request abandons the attempt the first one started
    // before it opens anything.
    assert_eq!(transport.opens(), 2);
    assert_eq!(handle.state().connection(), Some(last));
    assert_eq!(transport.closed(), vec![(first, "reconnect".to_string())]);
    let auths = transport.auths();
    assert_eq!(auths.len(), 2);
    assert!(auths.iter().all(|(_, e)| e.token == "tok-1"));

    handle.shutdown().await;
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_and_stops_reconnecting() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());
    let conn = authenticated(&handle, None).await;

    handle.shutdown().await;
    let opens = transport.opens();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.opens(), opens);
    assert_eq!(handle.state(), SessionState::Disconnected);
    assert_eq!(transport.closed(), vec![(conn, "shutdown".to_string())]);
    assert!(matches!(
        handle.enqueue(event(EnvelopeKind::Join, "Alex")),
        Err(SessionError::Closed)
    ));
    assert!(matches!(handle.reconnect(), Err(SessionError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_reconnect_delay_exits() {
    let transport = MockTransport::default();
    transport.refuse(true);
    let handle = start(&transport, &token("tok-1"), test_config());
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_verbose_toggles_flag() {
    let transport = MockTransport::default();
    let handle = start(&transport, &token("tok-1"), test_config());

    assert!(!handle.is_verbose());
    handle.set_verbose(true);
    assert!(handle.is_verbose());

    handle.shutdown().await;
}
