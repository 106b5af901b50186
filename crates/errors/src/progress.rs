//! Progress tracking error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Invariant violations reported by a progress tracker.
///
/// These signal a bug in the code driving the tracker, not an operational
/// failure of the tracked work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProgressError {
    #[error("task already initialized")]
    AlreadyInitialized,

    #[error("task already finished")]
    TaskFinished,

    #[error("task was dropped before it was closed")]
    Abandoned,
}

impl UserFacingError for ProgressError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::AlreadyInitialized => "progress.already_initialized",
            Self::TaskFinished => "progress.task_finished",
            Self::Abandoned => "progress.abandoned",
        })
    }
}
