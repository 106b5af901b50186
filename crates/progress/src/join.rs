//! Single-use receiver for a task's terminal outcome

use crate::Outcome;
use provision_errors::{ProgressError, TaskError};
use thiserror::Error;
use tokio::sync::oneshot;

/// Returned by [`Join::try_recv`] when no outcome can be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryJoinError {
    #[error("task has not finished yet")]
    Empty,

    #[error("outcome already received")]
    Closed,
}

/// Waits for a tracker to be closed.
///
/// Obtained from [`Tracker::join`](crate::Tracker::join). A `Join` yields the
/// outcome the task was closed with exactly once; every receive after that
/// reports the channel as closed (`None`).
///
/// If every handle to the tracker is dropped without closing it, the
/// outcome is an error wrapping [`ProgressError::Abandoned`].
#[derive(Debug)]
#[must_use = "a Join does nothing unless it is received from"]
pub struct Join {
    rx: Option<oneshot::Receiver<Outcome>>,
}

impl Join {
    pub(crate) fn new(rx: oneshot::Receiver<Outcome>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Wait for the outcome.
    ///
    /// Returns `None` once the outcome has already been received. Dropping
    /// the future before it completes does not consume the outcome.
    pub async fn recv(&mut self) -> Option<Outcome> {
        let rx = self.rx.as_mut()?;
        let outcome = rx.await.unwrap_or_else(|_| abandoned());
        self.rx = None;
        Some(outcome)
    }

    /// Blocking variant of [`recv`](Self::recv) for use outside an async runtime.
    ///
    /// # Panics
    ///
    /// Panics if called within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<Outcome> {
        let rx = self.rx.take()?;
        Some(rx.blocking_recv().unwrap_or_else(|_| abandoned()))
    }

    /// Take the outcome if the task has already finished.
    ///
    /// # Errors
    ///
    /// Returns [`TryJoinError::Empty`] while the task is still running and
    /// [`TryJoinError::Closed`] once the outcome has been taken.
    pub fn try_recv(&mut self) -> Result<Outcome, TryJoinError> {
        let rx = self.rx.as_mut().ok_or(TryJoinError::Closed)?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return Err(TryJoinError::Empty),
            Err(oneshot::error::TryRecvError::Closed) => abandoned(),
        };
        self.rx = None;
        Ok(outcome)
    }

    /// Whether the outcome has already been received
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}

fn abandoned() -> Outcome {
    Err(TaskError::from(ProgressError::Abandoned))
}
