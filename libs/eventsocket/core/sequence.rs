//! Sequence tracking for the server push stream
//!
//! Holds the logical session descriptor (server connection id and next
//! expected sequence). It outlives physical connections; only a cold reset
//! or a connection id change from the server discards it.

use tracing::{info, warn};

/// Outcome of checking one push frame's sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// In order; expected sequence advanced
    InOrder,
    /// Out of order on a non-resumable stream. Expected sequence was
    /// realigned to the frame, which is still dispatched; the consumer gets
    /// an advisory resync signal.
    Skipped { expected: u64, actual: u64 },
    /// Out of order on a resumable stream. Nothing advanced; the physical
    /// connection must be dropped so the server can replay from `expected`.
    Desync { expected: u64, actual: u64 },
}

/// Logical session descriptor plus the ordering rules applied to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    connection_id: String,
    expected: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next server sequence expected
    #[inline]
    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Server-assigned logical session id, empty before the first hello
    #[inline]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Restart numbering at 0 while keeping the connection id
    ///
    /// Used when a non-resumable connection opens: the server starts every
    /// such stream from 0.
    pub fn restart_numbering(&mut self) {
        self.expected = 0;
    }

    /// Discard both connection id and sequence
    pub fn cold_reset(&mut self) {
        self.connection_id.clear();
        self.expected = 0;
    }

    /// Record the connection id announced by a hello frame
    ///
    /// Returns true when a previously known, different id was replaced: the
    /// server no longer has our session (restart, long timeout, expired
    /// sequence window), so numbering restarts at 0 and the consumer must
    /// resync everything.
    pub fn observe_hello(&mut self, connection_id: &str) -> bool {
        info!("got connection id {}", connection_id);

        let lost = !self.connection_id.is_empty() && self.connection_id != connection_id;
        if lost {
            info!(
                "connection id changed from {} to {}: long timeout, server restart, or sequence number not found",
                self.connection_id, connection_id
            );
            self.expected = 0;
        }

        self.connection_id.clear();
        self.connection_id.push_str(connection_id);
        lost
    }

    /// Check a push frame's sequence number
    ///
    /// # Arguments
    /// * `seq` - Sequence carried by the frame
    /// * `resumable` - Whether the current physical connection is resumable
    pub fn check(&mut self, seq: u64, resumable: bool) -> SequenceVerdict {
        let expected = self.expected;
        if seq == expected {
            self.expected = seq.saturating_add(1);
            return SequenceVerdict::InOrder;
        }

        warn!("missed websocket event, act_seq={} exp_seq={}", seq, expected);

        if resumable {
            SequenceVerdict::Desync {
                expected,
                actual: seq,
            }
        } else {
            self.expected = seq.saturating_add(1);
            SequenceVerdict::Skipped {
                expected,
                actual: seq,
            }
        }
    }
}
