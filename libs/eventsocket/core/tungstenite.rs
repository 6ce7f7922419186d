//! Transport adapter over tokio-tungstenite
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   Outbound (unbounded)   ┌──────────────────────┐
//! │ TungsteniteTransport │ ───────────────────────> │     link task        │
//! │ (owned by Session)   │                          │ connect + read/write │
//! └──────────────────────┘                          └──────────┬───────────┘
//!                                                              │ TransportEvent
//!                                                              v
//!                                                     session inbox (LinkId-tagged)
//! ```
//!
//! The handle never blocks: `send` and `close` enqueue, `invalidate` aborts
//! the task so no further events are emitted.

use crate::error::{EventSocketError, Result};
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug)]
enum Outbound {
    Frame(Message),
    Close,
}

/// Opens physical connections with tokio-tungstenite
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TransportConnector for TungsteniteConnector {
    fn open(&self, request: ConnectRequest, sink: TransportEventSink) -> Box<dyn Transport> {
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (tx, rx) = unbounded_channel();

        let task = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                run_link(request, sink, state, rx).await;
            })
        };

        Box::new(TungsteniteTransport {
            state,
            tx,
            task: Some(task),
        })
    }
}

/// Handle to one tokio-tungstenite connection
#[derive(Debug)]
pub struct TungsteniteTransport {
    state: Arc<AtomicU8>,
    tx: UnboundedSender<Outbound>,
    task: Option<JoinHandle<()>>,
}

impl Transport for TungsteniteTransport {
    fn send(&mut self, message: WsMessage) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(EventSocketError::ConnectionClosed(format!(
                "transport is {:?}",
                self.ready_state()
            )));
        }
        self.tx
            .send(Outbound::Frame(ws_message_to_tungstenite(message)))
            .map_err(|e| EventSocketError::ChannelSend(e.to_string()))
    }

    fn close(&mut self) {
        if matches!(self.ready_state(), ReadyState::Connecting | ReadyState::Open) {
            self.state.store(ReadyState::Closing as u8, Ordering::Release);
            let _ = self.tx.send(Outbound::Close);
        }
    }

    fn invalidate(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.store(ReadyState::Closed as u8, Ordering::Release);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.state.load(Ordering::Acquire))
    }
}

/// Lifetime of one physical connection
async fn run_link(
    request: ConnectRequest,
    sink: TransportEventSink,
    state: Arc<AtomicU8>,
    mut rx: UnboundedReceiver<Outbound>,
) {
    let link = sink.link();

    let ws_stream = tokio::select! {
        result = connect(&request) => match result {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                state.store(ReadyState::Closed as u8, Ordering::Release);
                sink.emit(TransportEvent::Error(e.to_string()));
                sink.emit(TransportEvent::Closed);
                return;
            }
        },
        _ = close_requested(&mut rx) => {
            debug!("{} closed before the upgrade completed", link);
            state.store(ReadyState::Closed as u8, Ordering::Release);
            sink.emit(TransportEvent::Closed);
            return;
        }
    };

    state.store(ReadyState::Open as u8, Ordering::Release);
    if !sink.emit(TransportEvent::Opened) {
        return;
    }

    if let Err(e) = message_loop(ws_stream, &sink, &mut rx).await {
        sink.emit(TransportEvent::Error(e.to_string()));
    }

    state.store(ReadyState::Closed as u8, Ordering::Release);
    sink.emit(TransportEvent::Closed);
}

async fn connect(request: &ConnectRequest) -> Result<WsStream> {
    let mut client_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| EventSocketError::InvalidUrl(e.to_string()))?;

    for (key, value) in &request.headers {
        match key.parse::<http::header::HeaderName>() {
            Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                Ok(header_value) => {
                    client_request.headers_mut().insert(header_name, header_value);
                }
                Err(_) => {
                    warn!("Invalid header value for key '{}': {}", key, value);
                }
            },
            Err(_) => {
                warn!("Invalid header name: {}", key);
            }
        }
    }

    let (ws_stream, _) = connect_async(client_request)
        .await
        .map_err(|e| EventSocketError::WebSocket(e.to_string()))?;
    Ok(ws_stream)
}

/// Resolves once the handle asks to close or goes away; frames queued
/// before the upgrade are discarded
async fn close_requested(rx: &mut UnboundedReceiver<Outbound>) {
    loop {
        match rx.recv().await {
            Some(Outbound::Close) | None => return,
            Some(Outbound::Frame(_)) => debug!("discarding frame queued before open"),
        }
    }
}

async fn message_loop(
    ws_stream: WsStream,
    sink: &TransportEventSink,
    rx: &mut UnboundedReceiver<Outbound>,
) -> Result<()> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        debug!("{} closed by server: {:?}", sink.link(), frame);
                        return Ok(());
                    }
                    Some(Ok(msg)) => {
                        if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                            if !sink.emit(TransportEvent::Message(ws_msg)) {
                                let _ = write.close().await;
                                return Ok(());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(EventSocketError::WebSocket(e.to_string()));
                    }
                    None => {
                        return Err(EventSocketError::ConnectionClosed("Stream ended".into()));
                    }
                }
            }

            cmd = rx.recv() => {
                match cmd {
                    Some(Outbound::Frame(msg)) => {
                        write.send(msg).await.map_err(|e| {
                            EventSocketError::WebSocket(e.to_string())
                        })?;
                    }
                    Some(Outbound::Close) | None => {
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
