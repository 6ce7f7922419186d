use crate::core::session::SessionInput;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Identifies one scheduled retry
///
/// A fire whose token no longer matches the session's pending retry was
/// cancelled after it had already been queued, and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// The single cancellable retry timer of a session
///
/// When the delay elapses the scheduler must deliver
/// `SessionInput::RetryTimer(token)` to the session inbox. Scheduling while a
/// timer is pending replaces it.
pub trait RetryScheduler: Send {
    fn schedule(&mut self, delay: Duration, token: TimerToken, inbox: UnboundedSender<SessionInput>);

    fn cancel(&mut self);
}
