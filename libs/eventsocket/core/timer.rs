//! Tokio-backed retry timer
//!
//! One sleeping task per pending retry. Cancelling aborts the task; a fire
//! that was already queued before the abort is filtered by its token in the
//! session.

use crate::session::SessionInput;
use crate::traits::{RetryScheduler, TimerToken};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TokioRetryScheduler {
    task: Option<JoinHandle<()>>,
}

impl TokioRetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, delay: Duration, token: TimerToken, inbox: UnboundedSender<SessionInput>) {
        self.cancel();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inbox.send(SessionInput::RetryTimer(token)).is_err() {
                debug!("session gone before retry timer fired");
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioRetryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
