//! Session state machine
//!
//! A [`Session`] is the single logical connection to one server. It is
//! sans-IO: every input (client command, transport event, retry timer fire)
//! is a method call on `&mut self`, made by one owner in arrival order. The
//! physical transport, retry timer, clock and server configuration are
//! injected, which lets tests drive the whole lifecycle without sockets or
//! wall-clock time.
//!
//! Two descriptors are kept apart:
//! - the physical link (`LinkId`, transport handle, request counter), which
//!   lives for one socket
//! - the logical session ([`SequenceTracker`]: connection id, expected
//!   sequence), which survives reconnects when the server can resume

use crate::client::{ClientCommand, ClientEvent};
use crate::config::ClientConfig;
use crate::connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
use crate::endpoint::Endpoint;
use crate::frame::{InboundFrame, OutboundFrame, PushEvent, AUTH_CHALLENGE_ACTION, USER_TYPING_ACTION};
use crate::sequence::{SequenceTracker, SequenceVerdict};
use crate::traits::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Everything a session reacts to, delivered through one inbox
#[derive(Debug)]
pub enum SessionInput {
    /// Event from the transport of a physical connection
    Transport { link: LinkId, event: TransportEvent },
    /// Retry delay elapsed
    RetryTimer(TimerToken),
    /// Request from the public client handle
    Command(ClientCommand),
}

/// What happened to an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the open transport with this correlation number
    Sent(u64),
    /// Not sent: a connection attempt is in flight, the transport refused
    /// it, or the session is stopped
    Dropped,
    /// Not sent: no transport existed, so a connect attempt was started
    Reconnecting,
}

/// One physical connection
struct PhysicalLink {
    id: LinkId,
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
}

/// The logical connection to one server
pub struct Session {
    token: Option<String>,
    config_source: Arc<dyn ConfigSource>,
    connector: Arc<dyn TransportConnector>,
    decoder: Arc<dyn FrameDecoder>,
    reconnect_strategy: Box<dyn ReconnectionStrategy>,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn RetryScheduler>,
    handler: Box<dyn SessionHandler>,
    inbox: UnboundedSender<SessionInput>,

    state: SessionState,
    shared_state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
    events: Option<crossbeam_channel::Sender<ClientEvent>>,

    link: Option<PhysicalLink>,
    next_link: u64,
    tracker: SequenceTracker,
    request_sequence: u64,
    failure_count: u32,
    stop_requested: bool,
    /// Logical session was discarded; the next open counts as a first connect
    cold: bool,
    last_connected_at: i64,
    last_disconnected_at: i64,
    pending_retry: Option<TimerToken>,
    next_timer: u64,
}

impl Session {
    /// Create an idle session
    ///
    /// # Arguments
    /// * `config` - Collaborators and credentials
    /// * `handler` - Consumer callbacks
    /// * `scheduler` - Retry timer implementation
    /// * `inbox` - Sender side of the owner's input queue; handed to
    ///   transports and the scheduler so their events come back serialized
    pub fn new(
        config: ClientConfig,
        handler: Box<dyn SessionHandler>,
        scheduler: Box<dyn RetryScheduler>,
        inbox: UnboundedSender<SessionInput>,
    ) -> Self {
        let ClientConfig {
            config_source,
            connector,
            decoder,
            reconnect_strategy,
            clock,
            token,
            last_disconnect,
        } = config;

        Self {
            token: token.filter(|t| !t.is_empty()),
            config_source,
            connector,
            decoder,
            reconnect_strategy,
            clock,
            scheduler,
            handler,
            inbox,
            state: SessionState::Idle,
            shared_state: Arc::new(AtomicSessionState::default()),
            metrics: Arc::new(AtomicMetrics::new()),
            events: None,
            link: None,
            next_link: 1,
            tracker: SequenceTracker::new(),
            request_sequence: 1,
            failure_count: 0,
            stop_requested: false,
            cold: false,
            last_connected_at: 0,
            last_disconnected_at: last_disconnect,
            pending_retry: None,
            next_timer: 1,
        }
    }

    /// Publish lifecycle notifications to an observer channel
    pub fn set_event_sender(&mut self, events: crossbeam_channel::Sender<ClientEvent>) {
        self.events = Some(events);
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn shared_state(&self) -> Arc<AtomicSessionState> {
        Arc::clone(&self.shared_state)
    }

    pub fn metrics(&self) -> Arc<AtomicMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Correlation number the next outbound request will carry
    pub fn request_sequence(&self) -> u64 {
        self.request_sequence
    }

    pub fn expected_sequence(&self) -> u64 {
        self.tracker.expected()
    }

    pub fn connection_id(&self) -> &str {
        self.tracker.connection_id()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn last_connected_at(&self) -> i64 {
        self.last_connected_at
    }

    pub fn last_disconnected_at(&self) -> i64 {
        self.last_disconnected_at
    }

    pub fn current_link(&self) -> Option<LinkId> {
        self.link.as_ref().map(|link| link.id)
    }

    pub fn pending_retry(&self) -> Option<TimerToken> {
        self.pending_retry
    }

    /// The transport reports itself open
    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.transport.ready_state() == ReadyState::Open)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Request connectivity
    ///
    /// `force` clears a previous stop. Without it a stopped session stays
    /// stopped. No-op while a physical connection exists.
    pub fn start(&mut self, force: bool) {
        if force {
            self.stop_requested = false;
        }

        if self.stop_requested {
            debug!("start ignored: session is stopped");
            return;
        }

        if self.link.is_some() {
            return;
        }

        if self.state == SessionState::Stopped {
            self.set_state(SessionState::Idle);
        }

        self.connect();
    }

    /// Close the physical connection
    ///
    /// With `stop` no automatic reconnect follows until a forced start.
    /// Either way failure count and request counter go back to their
    /// initial values so a deliberate reconnect starts clean.
    pub fn close(&mut self, stop: bool) {
        self.stop_requested = stop;
        self.failure_count = 0;
        self.request_sequence = 1;

        if stop {
            self.cancel_retry();
        }

        let closing = match self.link.as_mut() {
            Some(link) => match link.transport.ready_state() {
                ReadyState::Connecting | ReadyState::Open => {
                    link.transport.close();
                    true
                }
                ReadyState::Closing | ReadyState::Closed => false,
            },
            None => {
                if stop {
                    self.set_state(SessionState::Stopped);
                    self.emit(ClientEvent::Stopped);
                }
                false
            }
        };

        if closing {
            self.set_state(SessionState::Closing);
        }
    }

    /// Drop the transport without waiting for, or reacting to, its close
    pub fn invalidate(&mut self) {
        if let Some(mut link) = self.link.take() {
            debug!("invalidating {}", link.id);
            link.transport.invalidate();
            if self.state.has_transport() {
                self.set_state(SessionState::Idle);
            }
        }
    }

    /// Send a request
    ///
    /// Requests are never queued. Without any transport the request is
    /// dropped and a single connect attempt starts instead.
    pub fn send(&mut self, action: &str, data: Value) -> SendOutcome {
        if self.link.is_none() {
            if self.stop_requested {
                debug!("dropping '{}': session is stopped", action);
                return SendOutcome::Dropped;
            }
            debug!("dropping '{}': not connected, reconnecting", action);
            self.connect();
            return SendOutcome::Reconnecting;
        }

        if !self.state.is_connected() {
            debug!("dropping '{}': connection not open ({:?})", action, self.state);
            return SendOutcome::Dropped;
        }

        self.write_frame(action, data)
    }

    /// Typing indicator for a channel or thread
    pub fn send_user_typing(&mut self, channel_id: &str, parent_id: Option<&str>) -> SendOutcome {
        let mut data = json!({ "channel_id": channel_id });
        if let Some(parent_id) = parent_id {
            data["parent_id"] = Value::String(parent_id.to_string());
        }
        self.send(USER_TYPING_ACTION, data)
    }

    /// Forget the logical session (connection id and expected sequence)
    ///
    /// The next connect starts a fresh server session, so the consumer
    /// must resync everything after it.
    pub fn cold_reset(&mut self) {
        info!("discarding logical session {}", self.tracker.connection_id());
        self.tracker.cold_reset();
        self.cold = true;
    }

    /// Replace the consumer handler, returning the previous one
    pub fn set_handler(&mut self, handler: Box<dyn SessionHandler>) -> Box<dyn SessionHandler> {
        std::mem::replace(&mut self.handler, handler)
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Apply a transport event; events from stale links are ignored
    pub fn handle_transport(&mut self, link: LinkId, event: TransportEvent) {
        if self.current_link() != Some(link) {
            debug!("ignoring {:?} from stale {}", event, link);
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(message) => self.on_message(message),
            TransportEvent::Error(error) => self.on_error(error),
            TransportEvent::Closed => self.on_close(),
        }
    }

    /// Retry delay elapsed
    pub fn handle_retry_timer(&mut self, token: TimerToken) {
        if self.pending_retry != Some(token) {
            debug!("ignoring cancelled retry timer {:?}", token);
            return;
        }
        self.pending_retry = None;

        if self.stop_requested {
            self.set_state(SessionState::Stopped);
            self.emit(ClientEvent::Stopped);
            return;
        }

        if self.link.is_none() {
            self.connect();
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn connect(&mut self) {
        // a new attempt supersedes any pending retry
        self.cancel_retry();

        let server = match self.server_config() {
            Ok(server) => server,
            Err(e) => {
                warn!("{}, connect attempt abandoned", e);
                self.set_state(SessionState::Idle);
                return;
            }
        };

        self.handler.on_connecting();
        self.emit(ClientEvent::Connecting);

        let endpoint = match Endpoint::resolve(&server, self.tracker.connection_id(), self.tracker.expected()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("websocket {}", e);
                self.set_state(SessionState::Idle);
                return;
            }
        };

        if self.failure_count == 0 {
            info!("websocket connecting to {}", endpoint.url);
        }

        let id = LinkId(self.next_link);
        self.next_link += 1;

        let sink = TransportEventSink::new(id, self.inbox.clone());
        let transport = self.connector.open(endpoint.to_request(), sink);
        self.link = Some(PhysicalLink {
            id,
            transport,
            endpoint,
        });
        self.set_state(SessionState::Connecting);
    }

    fn server_config(&self) -> Result<ServerConfig> {
        self.config_source.server_config().ok_or_else(|| {
            EventSocketError::MissingConfiguration("config source returned nothing".to_string())
        })
    }

    fn on_open(&mut self) {
        self.last_connected_at = self.clock.now_millis();

        let resumable = self.link.as_ref().is_some_and(|link| link.endpoint.resumable);
        let url = self.link_url();

        // a non-resumable stream always starts numbering from scratch
        if !resumable {
            self.tracker.restart_numbering();
        }

        if let Some(token) = self.token.clone() {
            self.set_state(SessionState::Authenticating);
            self.write_frame(AUTH_CHALLENGE_ACTION, json!({ "token": token }));
        } else {
            self.set_state(SessionState::Streaming);
        }

        if self.failure_count > 0 && !self.cold {
            info!("websocket re-established connection to {}", url);
            self.metrics.increment_reconnects();
            if !resumable {
                self.handler.on_reconnect();
            } else if self.tracker.expected() != 0 {
                self.handler.on_missed_events();
            }
        } else {
            info!("websocket connected to {}", url);
            self.handler.on_first_connect();
        }

        self.cold = false;

        self.failure_count = 0;
        self.emit(ClientEvent::Connected);
    }

    fn on_message(&mut self, message: WsMessage) {
        self.metrics.increment_received();

        if self.state == SessionState::Authenticating {
            self.set_state(SessionState::Streaming);
        }

        let frame = match self.decoder.decode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.increment_dropped();
                warn!("dropping undecodable frame: {}", e);
                return;
            }
        };

        match frame {
            InboundFrame::Reply(reply) => {
                if reply.is_error() {
                    warn!(
                        "request {} failed: status={:?} error={:?}",
                        reply.seq_reply, reply.status, reply.error
                    );
                } else {
                    debug!("reply to request {}", reply.seq_reply);
                }
            }
            InboundFrame::Push(event) => self.on_push(event),
        }
    }

    fn on_push(&mut self, event: PushEvent) {
        let resumable = self.link.as_ref().is_some_and(|link| link.endpoint.resumable);

        if resumable && event.is_hello() {
            if let Some(connection_id) = event.connection_id() {
                if self.tracker.observe_hello(connection_id) {
                    self.handler.on_reconnect();
                }
            }
        }

        match self.tracker.check(event.seq, resumable) {
            SequenceVerdict::InOrder => {}
            SequenceVerdict::Skipped { expected, actual } => {
                self.metrics.increment_gaps();
                self.emit(ClientEvent::SequenceGap { expected, actual });
                self.handler.on_reconnect();
            }
            SequenceVerdict::Desync { expected, actual } => {
                self.metrics.increment_gaps();
                self.emit(ClientEvent::SequenceGap { expected, actual });
                // logical gap, not a network failure: no backoff escalation
                self.failure_count = 0;
                self.request_sequence = 1;
                self.force_close();
                return;
            }
        }

        self.handler.on_event(&event);
    }

    fn on_error(&mut self, error: String) {
        if self.failure_count <= 1 {
            warn!("websocket error {}: {}", self.link_url(), error);
        }
        self.handler.on_error(&error);
        self.emit(ClientEvent::Error(error));
    }

    fn on_close(&mut self) {
        let url = self.link_url();
        let now = self.clock.now_millis();
        if self.last_disconnected_at < self.last_connected_at {
            self.last_disconnected_at = self.last_disconnected_at.max(now);
        }

        self.link = None;
        self.request_sequence = 1;

        if self.failure_count == 0 {
            info!("websocket closed {}", url);
        }

        self.failure_count = self.failure_count.saturating_add(1);
        self.handler.on_close(self.failure_count, self.last_disconnected_at);
        self.emit(ClientEvent::Disconnected {
            failure_count: self.failure_count,
        });

        if self.stop_requested {
            self.set_state(SessionState::Stopped);
            self.emit(ClientEvent::Stopped);
            return;
        }

        match self.reconnect_strategy.next_delay(self.failure_count) {
            Some(delay) => {
                self.schedule_retry(delay);
                self.set_state(SessionState::Backoff);
            }
            None => {
                warn!("reconnection strategy exhausted, stopping");
                self.stop_requested = true;
                self.set_state(SessionState::Stopped);
                self.emit(ClientEvent::Stopped);
            }
        }
    }

    /// Close the current transport so the normal close path reconnects
    fn force_close(&mut self) {
        if let Some(link) = self.link.as_mut() {
            link.transport.close();
            self.set_state(SessionState::Closing);
        }
    }

    fn write_frame(&mut self, action: &str, data: Value) -> SendOutcome {
        let Some(link) = self.link.as_mut() else {
            return SendOutcome::Dropped;
        };

        let seq = self.request_sequence;
        let message = match OutboundFrame::new(action, seq, data).to_message() {
            Ok(message) => message,
            Err(e) => {
                warn!("failed to encode '{}': {}", action, e);
                return SendOutcome::Dropped;
            }
        };

        match link.transport.send(message) {
            Ok(()) => {
                self.request_sequence += 1;
                self.metrics.increment_sent();
                SendOutcome::Sent(seq)
            }
            Err(e) => {
                debug!("dropping '{}': {}", action, e);
                SendOutcome::Dropped
            }
        }
    }

    fn schedule_retry(&mut self, delay: Duration) {
        self.cancel_retry();
        let token = TimerToken(self.next_timer);
        self.next_timer += 1;
        info!("reconnecting in {:?} (failure {})", delay, self.failure_count);
        self.pending_retry = Some(token);
        self.scheduler.schedule(delay, token, self.inbox.clone());
    }

    fn cancel_retry(&mut self) {
        if self.pending_retry.take().is_some() {
            self.scheduler.cancel();
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("session {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.shared_state.set(state);
    }

    fn link_url(&self) -> String {
        self.link
            .as_ref()
            .map(|link| link.endpoint.url.clone())
            .unwrap_or_default()
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("link", &self.current_link())
            .field("connection_id", &self.tracker.connection_id())
            .field("expected_sequence", &self.tracker.expected())
            .field("request_sequence", &self.request_sequence)
            .field("failure_count", &self.failure_count)
            .field("stop_requested", &self.stop_requested)
            .finish()
    }
}
