#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,        // Byte counts are reported as f64 progress
    clippy::cast_possible_truncation,   // Display formatting rounds to whole units
    clippy::cast_sign_loss,             // Negative durations are clamped before casting
    clippy::float_cmp                   // A total of exactly 0 means "unknown"
)]

//! Hierarchical progress tracking for long-running provisioning tasks
//!
//! This crate provides:
//! - A [`Tracker`] per task: operation name, stage, numeric progress against
//!   a total, and the terminal outcome
//! - Completion broadcast: any number of observers [`Tracker::join`] a task
//!   and each receives its outcome exactly once
//! - Subtask composition: [`Tracker::new_subtracker`] builds a tree whose
//!   [`Status`] is read live from every node
//!
//! ## Usage Example
//!
//! ```rust
//! use provision_progress::{Tracker, Units};
//! use std::io::Write;
//!
//! let tracker = Tracker::new();
//! tracker.initialize("upload image", 100.0, Units::Bytes)?;
//!
//! let mut join = tracker.join();
//!
//! let upload = tracker.new_subtracker();
//! upload.initialize("upload", 100.0, Units::Bytes)?;
//! (&upload).write_all(&[0u8; 100])?;
//! upload.complete();
//!
//! tracker.set_progress(100.0)?;
//! tracker.complete();
//!
//! assert!(join.blocking_recv().unwrap().is_ok());
//! assert_eq!(tracker.status().subtasks[0].progress, 100.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod join;
mod status;
mod tracker;
mod units;

pub use join::{Join, TryJoinError};
pub use status::Status;
pub use tracker::Tracker;
pub use units::Units;

pub use provision_errors::{ProgressError, TaskError};

/// Terminal result of a task: `Ok(())` on success, or the error it was closed with
pub type Outcome = Result<(), TaskError>;
