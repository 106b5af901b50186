//! Terminal error of a tracked task

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Type-erased, cheaply cloneable error a task was closed with.
///
/// Every observer of a task receives a clone of the same value, so the
/// original error is kept behind an `Arc` and never copied. `Display` and
/// `source` are forwarded to the wrapped error.
#[derive(Clone)]
pub struct TaskError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl TaskError {
    /// Wrap an arbitrary error.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(err),
        }
    }

    /// Create an error that only carries a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Borrow the wrapped error.
    #[must_use]
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    /// Attempt to downcast the wrapped error to a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Whether both values share the same underlying error.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskError").field(&self.inner).finish()
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<crate::Error> for TaskError {
    fn from(err: crate::Error) -> Self {
        Self::new(err)
    }
}

impl From<crate::ProgressError> for TaskError {
    fn from(err: crate::ProgressError) -> Self {
        Self::new(err)
    }
}

impl From<crate::ProvisionError> for TaskError {
    fn from(err: crate::ProvisionError) -> Self {
        Self::new(err)
    }
}

impl From<crate::ConfigError> for TaskError {
    fn from(err: crate::ConfigError) -> Self {
        Self::new(err)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<Box<dyn StdError + Send + Sync + 'static>> for TaskError {
    fn from(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self {
            inner: Arc::from(err),
        }
    }
}
