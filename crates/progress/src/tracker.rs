//! Task tracker: mutation API, completion broadcast and subtasks

use crate::join::Join;
use crate::status::Status;
use crate::units::Units;
use crate::Outcome;
use provision_errors::{ProgressError, TaskError};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

/// Tracks the progress of one task.
///
/// A `Tracker` is a cheap handle; clones refer to the same task. The driver
/// of the work initializes it, reports stage and progress, and closes it
/// with the outcome. Observers poll [`status`](Self::status) or wait on
/// [`join`](Self::join).
///
/// Usually a task should be updated using either `set_progress`,
/// `increment_progress`, or `Write`, but not in combination.
#[derive(Clone)]
pub struct Tracker {
    shared: Arc<Shared>,
}

struct Shared {
    id: Uuid,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    operation: String,
    stage: String,
    progress: f64,
    total: f64,
    units: Units,
    initialized: bool,
    finished: bool,
    error: Option<TaskError>,
    listeners: Vec<oneshot::Sender<Outcome>>,
    subtasks: Vec<Tracker>,
}

impl State {
    fn outcome(&self) -> Outcome {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Tracker {
    /// Create a new uninitialized tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Unique identifier of this tracker
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Set the operation name, total and units.
    ///
    /// Must be called once per task. Use a `total` of 0 for a task of
    /// unknown size.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::AlreadyInitialized`] on any call after the
    /// first, and [`ProgressError::TaskFinished`] if the task was closed
    /// before it was initialized. State is left untouched in both cases.
    pub fn initialize(
        &self,
        operation: impl Into<String>,
        total: f64,
        units: Units,
    ) -> Result<(), ProgressError> {
        let mut state = self.lock();
        if state.initialized {
            return Err(ProgressError::AlreadyInitialized);
        }
        if state.finished {
            return Err(ProgressError::TaskFinished);
        }
        state.initialized = true;
        state.operation = operation.into();
        state.total = total;
        state.units = units;
        trace!(
            tracker = %self.shared.id,
            operation = %state.operation,
            total,
            units = %units,
            "tracker initialized"
        );
        Ok(())
    }

    /// Replace the description of the current stage.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::TaskFinished`] once the task is closed.
    pub fn set_stage(&self, stage: impl Into<String>) -> Result<(), ProgressError> {
        self.update(|state| state.stage = stage.into())
    }

    /// Set progress to the absolute value `x`. No clamping is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::TaskFinished`] once the task is closed.
    pub fn set_progress(&self, x: f64) -> Result<(), ProgressError> {
        self.update(|state| state.progress = x)
    }

    /// Add `delta` (which may be negative) to the current progress.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::TaskFinished`] once the task is closed.
    pub fn increment_progress(&self, delta: f64) -> Result<(), ProgressError> {
        self.update(|state| state.progress += delta)
    }

    fn update(&self, f: impl FnOnce(&mut State)) -> Result<(), ProgressError> {
        let mut state = self.lock();
        if state.finished {
            return Err(ProgressError::TaskFinished);
        }
        f(&mut state);
        Ok(())
    }

    /// Mark the task as complete.
    ///
    /// The outcome is handed to every pending [`Join`] and recorded in the
    /// status. Only the first call has any effect, so it is safe to close a
    /// task again on a cleanup path.
    pub fn close(&self, outcome: Outcome) {
        let (listeners, operation) = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            state.error = outcome.clone().err();
            (
                std::mem::take(&mut state.listeners),
                state.operation.clone(),
            )
        };

        debug!(
            tracker = %self.shared.id,
            operation = %operation,
            listeners = listeners.len(),
            error = outcome.as_ref().err().map(tracing::field::display),
            "tracker closed"
        );

        for listener in listeners {
            // A dropped Join no longer wants the value
            let _ = listener.send(outcome.clone());
        }
    }

    /// Close the task successfully
    pub fn complete(&self) {
        self.close(Ok(()));
    }

    /// Close the task with an error
    pub fn fail(&self, err: impl Into<TaskError>) {
        self.close(Err(err.into()));
    }

    /// Wait for the task to be closed.
    ///
    /// Never blocks: the returned [`Join`] receives the outcome once the task
    /// is closed, or right away if it already is.
    pub fn join(&self) -> Join {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if state.finished {
            let outcome = state.outcome();
            drop(state);
            let _ = tx.send(outcome);
        } else {
            state.listeners.retain(|listener| !listener.is_closed());
            state.listeners.push(tx);
        }
        Join::new(rx)
    }

    /// Whether the task has been closed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Create a tracker for a sub-task of this task.
    ///
    /// The subtracker starts uninitialized and is driven independently of
    /// its parent; closing one never closes the other.
    #[must_use]
    pub fn new_subtracker(&self) -> Tracker {
        let child = Tracker::new();
        self.lock().subtasks.push(child.clone());
        trace!(parent = %self.shared.id, tracker = %child.shared.id, "subtracker created");
        child
    }

    /// Handles to the subtrackers of this task, in creation order
    #[must_use]
    pub fn subtasks(&self) -> Vec<Tracker> {
        self.lock().subtasks.clone()
    }

    /// Current status of the task and of every subtask
    #[must_use]
    pub fn status(&self) -> Status {
        let (mut status, subtasks) = {
            let state = self.lock();
            let status = Status {
                id: self.shared.id,
                operation: state.operation.clone(),
                stage: state.stage.clone(),
                progress: state.progress,
                total: state.total,
                units: state.units,
                error: state.error.clone(),
                finished: state.finished,
                initialized: state.initialized,
                subtasks: Vec::with_capacity(state.subtasks.len()),
            };
            (status, state.subtasks.clone())
        };
        // Children are read without holding our own lock
        status.subtasks = subtasks.iter().map(Tracker::status).collect();
        status
    }

    fn add_bytes(&self, len: usize) -> Result<(), ProgressError> {
        self.update(|state| state.progress += len as f64)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Tracker")
            .field("id", &self.shared.id)
            .field("operation", &state.operation)
            .field("finished", &state.finished)
            .field("listeners", &state.listeners.len())
            .field("subtasks", &state.subtasks.len())
            .finish()
    }
}

/// Writing to a tracker advances its progress by the number of bytes
/// written, so it can sit directly behind `io::copy` or a tee of an upload
/// stream.
impl io::Write for &Tracker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.add_bytes(buf.len()).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Tracker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
