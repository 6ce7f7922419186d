//! Common test utilities for EventSocket integration tests
//!
//! Mock transports, a recording handler and a manual retry scheduler for
//! driving a [`Session`] by hand, plus a small local websocket server for
//! end-to-end runs.

#![allow(dead_code)]

use eventsocket::*;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, Notify};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

// ----------------------------------------------------------------------
// Mock transport
// ----------------------------------------------------------------------

/// Shared view of one mock physical connection
#[derive(Clone)]
pub struct MockLink {
    pub request: ConnectRequest,
    pub sink: Arc<TransportEventSink>,
    state: Arc<AtomicU8>,
    sent: Arc<Mutex<Vec<WsMessage>>>,
    closes: Arc<AtomicUsize>,
    invalidations: Arc<AtomicUsize>,
}

impl MockLink {
    pub fn id(&self) -> LinkId {
        self.sink.link()
    }

    pub fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.state.load(Ordering::Acquire))
    }

    /// Outbound frames parsed as JSON
    pub fn sent_frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m.as_text().and_then(|t| serde_json::from_str(t).ok()))
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    pub fn invalidate_calls(&self) -> usize {
        self.invalidations.load(Ordering::Acquire)
    }
}

struct MockTransport {
    link: MockLink,
}

impl Transport for MockTransport {
    fn send(&mut self, message: WsMessage) -> Result<()> {
        if self.link.ready_state() != ReadyState::Open {
            return Err(EventSocketError::ConnectionClosed("mock not open".to_string()));
        }
        self.link.sent.lock().push(message);
        Ok(())
    }

    fn close(&mut self) {
        self.link.closes.fetch_add(1, Ordering::AcqRel);
        self.link.set_state(ReadyState::Closing);
    }

    fn invalidate(&mut self) {
        self.link.invalidations.fetch_add(1, Ordering::AcqRel);
        self.link.set_state(ReadyState::Closed);
    }

    fn ready_state(&self) -> ReadyState {
        self.link.ready_state()
    }
}

/// Records every open; the test decides what each link reports
#[derive(Default)]
pub struct MockConnector {
    links: Mutex<Vec<MockLink>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opens(&self) -> usize {
        self.links.lock().len()
    }

    pub fn link(&self, index: usize) -> MockLink {
        self.links.lock()[index].clone()
    }

    pub fn last(&self) -> MockLink {
        self.links
            .lock()
            .last()
            .cloned()
            .expect("no connection opened yet")
    }
}

impl TransportConnector for MockConnector {
    fn open(&self, request: ConnectRequest, sink: TransportEventSink) -> Box<dyn Transport> {
        let link = MockLink {
            request,
            sink: Arc::new(sink),
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            invalidations: Arc::new(AtomicUsize::new(0)),
        };
        self.links.lock().push(link.clone());
        Box::new(MockTransport { link })
    }
}

// ----------------------------------------------------------------------
// Recording handler
// ----------------------------------------------------------------------

/// One handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Connecting,
    FirstConnect,
    Reconnect,
    MissedEvents,
    Event(String, u64),
    Error(String),
    Close(u32, i64),
}

#[derive(Clone, Default)]
pub struct RecordingHandler {
    notes: Arc<Mutex<Vec<Note>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn count(&self, note: &Note) -> usize {
        self.notes.lock().iter().filter(|n| *n == note).count()
    }

    pub fn events(&self) -> Vec<(String, u64)> {
        self.notes
            .lock()
            .iter()
            .filter_map(|n| match n {
                Note::Event(name, seq) => Some((name.clone(), *seq)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notes.lock().clear();
    }

    fn push(&self, note: Note) {
        self.notes.lock().push(note);
    }
}

impl SessionHandler for RecordingHandler {
    fn on_connecting(&mut self) {
        self.push(Note::Connecting);
    }

    fn on_first_connect(&mut self) {
        self.push(Note::FirstConnect);
    }

    fn on_reconnect(&mut self) {
        self.push(Note::Reconnect);
    }

    fn on_missed_events(&mut self) {
        self.push(Note::MissedEvents);
    }

    fn on_event(&mut self, event: &PushEvent) {
        self.push(Note::Event(event.event.clone(), event.seq));
    }

    fn on_error(&mut self, error: &str) {
        self.push(Note::Error(error.to_string()));
    }

    fn on_close(&mut self, failure_count: u32, last_disconnect: i64) {
        self.push(Note::Close(failure_count, last_disconnect));
    }
}

// ----------------------------------------------------------------------
// Manual retry scheduler
// ----------------------------------------------------------------------

#[derive(Debug, Default)]
struct SchedulerLog {
    scheduled: Vec<(Duration, TimerToken)>,
    pending: Option<TimerToken>,
    cancels: usize,
}

/// Records retry requests; tests fire them explicitly
#[derive(Clone, Default)]
pub struct ManualScheduler {
    log: Arc<Mutex<SchedulerLog>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.log.lock().scheduled.iter().map(|(d, _)| *d).collect()
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.log.lock().scheduled.last().map(|(d, _)| *d)
    }

    pub fn pending(&self) -> Option<TimerToken> {
        self.log.lock().pending
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().cancels
    }
}

impl RetryScheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, token: TimerToken, _inbox: UnboundedSender<SessionInput>) {
        let mut log = self.log.lock();
        log.scheduled.push((delay, token));
        log.pending = Some(token);
    }

    fn cancel(&mut self) {
        let mut log = self.log.lock();
        log.pending = None;
        log.cancels += 1;
    }
}

// ----------------------------------------------------------------------
// Sans-IO harness
// ----------------------------------------------------------------------

/// A session wired to mocks, driven synchronously by the test
pub struct Harness {
    pub session: Session,
    pub connector: Arc<MockConnector>,
    pub handler: RecordingHandler,
    pub scheduler: ManualScheduler,
    pub clock: Arc<ManualClock>,
    pub server: Arc<StaticConfig>,
    pub events: crossbeam_channel::Receiver<ClientEvent>,
    _inbox: UnboundedReceiver<SessionInput>,
}

impl Harness {
    pub fn new(server: ServerConfig) -> Self {
        Self::with_config(server, |config| config)
    }

    /// Non-resumable server at https://chat.example.com
    pub fn plain() -> Self {
        Self::new(ServerConfig::new("https://chat.example.com"))
    }

    /// Resumable server at https://chat.example.com
    pub fn reliable() -> Self {
        Self::new(ServerConfig::new("https://chat.example.com").with_reliable_websockets(true))
    }

    pub fn with_config(server: ServerConfig, configure: impl FnOnce(ClientConfig) -> ClientConfig) -> Self {
        let connector = MockConnector::new();
        let handler = RecordingHandler::new();
        let scheduler = ManualScheduler::new();
        let clock = Arc::new(ManualClock::new(1_000));
        let server = Arc::new(StaticConfig::new(server));
        let (inbox, inbox_rx) = unbounded_channel();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let source: Arc<dyn ConfigSource> = server.clone();
        let transport: Arc<dyn TransportConnector> = connector.clone();
        let config = configure(ClientConfig::new(source, transport).with_clock(clock.clone()));

        let mut session = Session::new(
            config,
            Box::new(handler.clone()),
            Box::new(scheduler.clone()),
            inbox,
        );
        session.set_event_sender(event_tx);

        Self {
            session,
            connector,
            handler,
            scheduler,
            clock,
            server,
            events: event_rx,
            _inbox: inbox_rx,
        }
    }

    fn current(&self) -> LinkId {
        self.session.current_link().expect("no current link")
    }

    /// Complete the upgrade of the current link
    pub fn open(&mut self) {
        let link = self.current();
        self.connector.last().set_state(ReadyState::Open);
        self.session.handle_transport(link, TransportEvent::Opened);
    }

    /// Start and open a first connection
    pub fn connect(&mut self) {
        self.session.start(true);
        self.open();
    }

    pub fn deliver(&mut self, frame: Value) {
        let link = self.current();
        self.session
            .handle_transport(link, TransportEvent::Message(WsMessage::Text(frame.to_string())));
    }

    pub fn deliver_raw(&mut self, text: &str) {
        let link = self.current();
        self.session
            .handle_transport(link, TransportEvent::Message(WsMessage::Text(text.to_string())));
    }

    pub fn push(&mut self, event: &str, seq: u64) {
        self.deliver(push_frame(event, seq));
    }

    pub fn hello(&mut self, connection_id: &str, seq: u64) {
        self.deliver(hello_frame(connection_id, seq));
    }

    pub fn error(&mut self, message: &str) {
        let link = self.current();
        self.session
            .handle_transport(link, TransportEvent::Error(message.to_string()));
    }

    /// The current transport reports closed
    pub fn drop_link(&mut self) {
        let link = self.current();
        self.connector.last().set_state(ReadyState::Closed);
        self.session.handle_transport(link, TransportEvent::Closed);
    }

    /// Fire the pending retry timer
    pub fn fire_retry(&mut self) {
        let token = self.scheduler.pending().expect("no retry scheduled");
        self.session.handle_retry_timer(token);
    }

    pub fn drain_events(&self) -> Vec<ClientEvent> {
        self.events.try_iter().collect()
    }
}

pub fn push_frame(event: &str, seq: u64) -> Value {
    json!({ "event": event, "data": {}, "broadcast": {}, "seq": seq })
}

pub fn hello_frame(connection_id: &str, seq: u64) -> Value {
    json!({
        "event": "hello",
        "data": { "connection_id": connection_id, "server_version": "test" },
        "broadcast": {},
        "seq": seq
    })
}

// ----------------------------------------------------------------------
// Local websocket server
// ----------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ServerCommand {
    Send(String),
    DropAll,
}

/// Handshake details of one accepted connection
#[derive(Debug, Clone)]
pub struct Accepted {
    pub uri: String,
    pub origin: Option<String>,
}

/// A minimal event stream server
///
/// Every connection without a `connection_id` query gets a hello frame for
/// `connection_id` with seq 0. Client frames are recorded; pushes are
/// broadcast to all live connections.
pub struct MockStreamServer {
    pub addr: SocketAddr,
    connection_id: String,
    accepted: Arc<Mutex<Vec<Accepted>>>,
    received: Arc<Mutex<Vec<Value>>>,
    commands: broadcast::Sender<ServerCommand>,
    shutdown: Arc<Notify>,
}

impl MockStreamServer {
    /// Create and start a new server
    pub async fn start(connection_id: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let (commands, _) = broadcast::channel(64);

        let server = Self {
            addr,
            connection_id: connection_id.to_string(),
            accepted: accepted.clone(),
            received: received.clone(),
            commands: commands.clone(),
            shutdown: shutdown.clone(),
        };

        let connection_id = connection_id.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let conn = ConnectionContext {
                                    connection_id: connection_id.clone(),
                                    accepted: accepted.clone(),
                                    received: received.clone(),
                                    commands: commands.subscribe(),
                                    shutdown: shutdown.clone(),
                                };
                                tokio::spawn(async move {
                                    conn.run(stream).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        server
    }

    /// Base URL for `ServerConfig::server_url`
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn accepted(&self) -> Vec<Accepted> {
        self.accepted.lock().clone()
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    pub fn push(&self, event: &str, seq: u64) {
        let _ = self.commands.send(ServerCommand::Send(push_frame(event, seq).to_string()));
    }

    /// Close every live connection from the server side
    pub fn drop_connections(&self) {
        let _ = self.commands.send(ServerCommand::DropAll);
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ConnectionContext {
    connection_id: String,
    accepted: Arc<Mutex<Vec<Accepted>>>,
    received: Arc<Mutex<Vec<Value>>>,
    commands: broadcast::Receiver<ServerCommand>,
    shutdown: Arc<Notify>,
}

impl ConnectionContext {
    async fn run(mut self, stream: tokio::net::TcpStream) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::Message;

        let mut handshake: Option<Accepted> = None;
        let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            handshake = Some(Accepted {
                uri: request.uri().to_string(),
                origin: request
                    .headers()
                    .get("Origin")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            });
            Ok(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let Some(handshake) = handshake else {
            return;
        };
        let fresh = !handshake.uri.contains("connection_id=") || handshake.uri.contains("connection_id=&");
        self.accepted.lock().push(handshake);

        let (mut write, mut read) = ws_stream.split();

        if fresh {
            let hello = hello_frame(&self.connection_id, 0).to_string();
            if write.send(Message::Text(hello)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                self.received.lock().push(value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Ok(ServerCommand::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerCommand::DropAll) | Err(_) => {
                            let _ = write.close().await;
                            break;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Wait for a client event matching `predicate`, discarding others
pub async fn wait_for_event(
    client: &StreamClient,
    timeout: Duration,
    mut predicate: impl FnMut(&ClientEvent) -> bool,
) -> Option<ClientEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        while let Some(event) = client.try_recv_event() {
            if predicate(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
