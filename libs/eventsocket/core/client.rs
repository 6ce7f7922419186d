use crate::config::ClientConfig;
use crate::connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
use crate::session::{Session, SessionInput};
use crate::timer::TokioRetryScheduler;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Requests from the public handle to the session task
pub enum ClientCommand {
    /// Request connectivity; `force` clears a previous stop
    Start { force: bool },
    /// Close the physical connection, optionally stopping auto-reconnect
    Close { stop: bool },
    /// Drop the transport without close handling
    Invalidate,
    /// Forget connection id and expected sequence
    ColdReset,
    /// Send a request frame
    Send { action: String, data: Value },
    /// Send a typing indicator
    UserTyping {
        channel_id: String,
        parent_id: Option<String>,
    },
    /// Swap the consumer handler; the previous one is sent back
    SetHandler {
        handler: Box<dyn SessionHandler>,
        previous: oneshot::Sender<Box<dyn SessionHandler>>,
    },
    /// Stop the session and end the task
    Shutdown,
}

impl std::fmt::Debug for ClientCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientCommand::Start { force } => f.debug_struct("Start").field("force", force).finish(),
            ClientCommand::Close { stop } => f.debug_struct("Close").field("stop", stop).finish(),
            ClientCommand::Invalidate => f.write_str("Invalidate"),
            ClientCommand::ColdReset => f.write_str("ColdReset"),
            ClientCommand::Send { action, .. } => f.debug_struct("Send").field("action", action).finish(),
            ClientCommand::UserTyping { channel_id, parent_id } => f
                .debug_struct("UserTyping")
                .field("channel_id", channel_id)
                .field("parent_id", parent_id)
                .finish(),
            ClientCommand::SetHandler { .. } => f.write_str("SetHandler"),
            ClientCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Lifecycle notifications for observers of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// About to open a physical connection
    Connecting,
    /// Physical connection open
    Connected,
    /// Physical connection closed
    Disconnected { failure_count: u32 },
    /// Transport error
    Error(String),
    /// Push frame arrived out of order
    SequenceGap { expected: u64, actual: u64 },
    /// No further automatic reconnects
    Stopped,
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub sequence_gaps: u64,
    pub dropped_frames: u64,
    pub session_state: SessionState,
}

/// Handle to a session running on its own tokio task
///
/// The task is the single owner of the [`Session`]: commands from this
/// handle, transport events and retry timer fires all go through one inbox
/// and are applied one at a time. Network failures never surface here; they
/// reach the consumer through its [`SessionHandler`].
///
/// Lifecycle changes are also published as [`ClientEvent`]s on an unbounded
/// channel held by this handle. Nothing is discarded on the way, so a
/// long-lived client that never reads them grows that queue by a few events
/// per reconnect. Read them with [`recv_event`](Self::recv_event) or
/// [`try_recv_event`](Self::try_recv_event), or call
/// [`drain_events`](Self::drain_events) periodically when only the handler
/// matters. The queue is freed when the handle is dropped.
pub struct StreamClient {
    inbox: UnboundedSender<SessionInput>,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl StreamClient {
    /// Spawn the session task
    ///
    /// The session starts idle; call [`start`](Self::start) to connect.
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: ClientConfig, handler: Box<dyn SessionHandler>) -> Self {
        let (inbox, inbox_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let mut session = Session::new(
            config,
            handler,
            Box::new(TokioRetryScheduler::new()),
            inbox.clone(),
        );
        session.set_event_sender(event_tx);

        let state = session.shared_state();
        let metrics = session.metrics();

        let task_handle = tokio::spawn(async move {
            run_session(session, inbox_rx).await;
        });

        Self {
            inbox,
            state,
            metrics,
            event_rx,
            task_handle: Some(task_handle),
        }
    }

    /// Connect, clearing any previous stop
    pub fn start(&self) -> Result<()> {
        self.command(ClientCommand::Start { force: true })
    }

    /// Connect unless the session was stopped
    pub fn ensure_started(&self) -> Result<()> {
        self.command(ClientCommand::Start { force: false })
    }

    /// Close the connection; with `stop` no automatic reconnect follows
    pub fn close(&self, stop: bool) -> Result<()> {
        self.command(ClientCommand::Close { stop })
    }

    /// Discard the transport without close handling
    pub fn invalidate(&self) -> Result<()> {
        self.command(ClientCommand::Invalidate)
    }

    /// Discard the logical session; the next connect resyncs from scratch
    pub fn cold_reset(&self) -> Result<()> {
        self.command(ClientCommand::ColdReset)
    }

    /// Send a request frame
    ///
    /// Only fails if the session task is gone. A request that cannot be
    /// written is dropped (and triggers a reconnect when disconnected).
    pub fn send(&self, action: impl Into<String>, data: Value) -> Result<()> {
        self.command(ClientCommand::Send {
            action: action.into(),
            data,
        })
    }

    /// Send a typing indicator
    pub fn send_user_typing(&self, channel_id: impl Into<String>, parent_id: Option<String>) -> Result<()> {
        self.command(ClientCommand::UserTyping {
            channel_id: channel_id.into(),
            parent_id,
        })
    }

    /// Replace the consumer handler, returning the previous one
    pub async fn set_handler(&self, handler: Box<dyn SessionHandler>) -> Result<Box<dyn SessionHandler>> {
        let (tx, rx) = oneshot::channel();
        self.command(ClientCommand::SetHandler {
            handler,
            previous: tx,
        })?;
        rx.await
            .map_err(|_| EventSocketError::ChannelSend("session task ended".to_string()))
    }

    /// Get current session state
    #[inline]
    pub fn session_state(&self) -> SessionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            sequence_gaps: self.metrics.sequence_gaps(),
            dropped_frames: self.metrics.dropped_frames(),
            session_state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    ///
    /// Events queue up until read; see the type-level docs.
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> Result<ClientEvent> {
        self.event_rx
            .recv()
            .map_err(|e| EventSocketError::ChannelSend(e.to_string()))
    }

    /// Receive an event, waiting at most `timeout` (blocking)
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Number of events waiting to be read
    pub fn pending_events(&self) -> usize {
        self.event_rx.len()
    }

    /// Discard every queued event, returning how many were dropped
    pub fn drain_events(&self) -> usize {
        self.event_rx.try_iter().count()
    }

    /// Stop the session and wait for its task to finish
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down stream client");
        let _ = self.inbox.send(SessionInput::Command(ClientCommand::Shutdown));
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.inbox
            .send(SessionInput::Command(command))
            .map_err(|e| EventSocketError::ChannelSend(e.to_string()))
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        // the session holds its own inbox sender, so the task only ends on Shutdown
        if self.task_handle.is_some() {
            let _ = self.inbox.send(SessionInput::Command(ClientCommand::Shutdown));
        }
    }
}

/// Main session task loop
async fn run_session(mut session: Session, mut inbox: UnboundedReceiver<SessionInput>) {
    while let Some(input) = inbox.recv().await {
        match input {
            SessionInput::Transport { link, event } => session.handle_transport(link, event),
            SessionInput::RetryTimer(token) => session.handle_retry_timer(token),
            SessionInput::Command(command) => match command {
                ClientCommand::Start { force } => session.start(force),
                ClientCommand::Close { stop } => session.close(stop),
                ClientCommand::Invalidate => session.invalidate(),
                ClientCommand::ColdReset => session.cold_reset(),
                ClientCommand::Send { action, data } => {
                    let outcome = session.send(&action, data);
                    debug!("send '{}': {:?}", action, outcome);
                }
                ClientCommand::UserTyping {
                    channel_id,
                    parent_id,
                } => {
                    session.send_user_typing(&channel_id, parent_id.as_deref());
                }
                ClientCommand::SetHandler { handler, previous } => {
                    let old = session.set_handler(handler);
                    let _ = previous.send(old);
                }
                ClientCommand::Shutdown => {
                    session.close(true);
                    break;
                }
            },
        }
    }

    info!("Session task exiting");
}
