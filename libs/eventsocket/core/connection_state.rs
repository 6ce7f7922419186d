//! Lock-free mirrors of session state for observers outside the session task

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a session
///
/// ```text
/// Idle → Connecting → Authenticating → Streaming → Closing → Backoff → Connecting
///                                                      ↘          ↘
///                                                       Stopped ←─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Authenticating = 2,
    Streaming = 3,
    Closing = 4,
    Backoff = 5,
    Stopped = 6,
}

impl SessionState {
    /// A physical transport is open
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Authenticating | SessionState::Streaming)
    }

    /// A physical transport exists in any state
    #[inline]
    pub fn has_transport(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Authenticating
                | SessionState::Streaming
                | SessionState::Closing
        )
    }
}

impl From<u8> for SessionState {
    fn from(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Authenticating,
            3 => SessionState::Streaming,
            4 => SessionState::Closing,
            5 => SessionState::Backoff,
            6 => SessionState::Stopped,
            _ => SessionState::Idle,
        }
    }
}

/// Atomic session state, written by the session task only
#[derive(Debug)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get().is_connected()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.get() == SessionState::Stopped
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Idle)
    }
}

/// Session counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnects: AtomicU64,
    sequence_gaps: AtomicU64,
    dropped_frames: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_gaps(&self) {
        self.sequence_gaps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_dropped(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn sequence_gaps(&self) -> u64 {
        self.sequence_gaps.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}
