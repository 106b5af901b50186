//! Observable status of a tracked task

use crate::units::Units;
use provision_errors::TaskError;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Summary of a task's progress, including all of its subtasks.
///
/// A `Status` is produced by [`Tracker::status`](crate::Tracker::status) and
/// reflects every tracker in the tree as of that call. Poll again for fresh
/// values.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Identifier of the tracker this status was read from
    pub id: Uuid,
    /// Human-readable task name, empty until initialized
    pub operation: String,
    /// Current sub-step of the task
    pub stage: String,
    /// Current progress value
    pub progress: f64,
    /// Expected upper bound for `progress`; 0 when unknown
    pub total: f64,
    pub units: Units,
    /// Error the task was closed with
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<TaskError>,
    pub finished: bool,
    pub initialized: bool,
    /// Status of each subtask, in creation order
    pub subtasks: Vec<Status>,
}

impl Status {
    /// Progress as a fraction of `total`, `None` for indeterminate tasks
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        if self.is_indeterminate() {
            None
        } else {
            Some(self.progress / self.total)
        }
    }

    /// Progress as a percentage (0.0-100.0), `None` for indeterminate tasks
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.fraction().map(|f| f * 100.0)
    }

    /// Whether the total size of the task is unknown
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.total == 0.0
    }

    /// Whether the task finished with an error
    #[must_use]
    pub fn failed(&self) -> bool {
        self.finished && self.error.is_some()
    }

    /// Terminal result, `None` while the task is still running
    #[must_use]
    pub fn outcome(&self) -> Option<Result<(), TaskError>> {
        if !self.finished {
            return None;
        }
        Some(match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        })
    }

    /// "progress / total" in the task's units
    #[must_use]
    pub fn format_progress(&self) -> String {
        if self.is_indeterminate() {
            self.units.format(self.progress)
        } else {
            format!(
                "{} / {}",
                self.units.format(self.progress),
                self.units.format(self.total)
            )
        }
    }

    /// Depth-first, pre-order walk over this status and all subtasks,
    /// paired with their depth (0 for `self`)
    #[must_use]
    pub fn flatten(&self) -> Vec<(usize, &Status)> {
        let mut out = Vec::new();
        self.flatten_into(0, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a Status)>) {
        out.push((depth, self));
        for subtask in &self.subtasks {
            subtask.flatten_into(depth + 1, out);
        }
    }
}

#[allow(clippy::ref_option)]
fn serialize_error<S>(error: &Option<TaskError>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}
