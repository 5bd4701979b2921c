//! Error types for selector evaluation.

use std::fmt;
use std::sync::Arc;

/// Selector errors including both engine-level and user errors.
///
/// User errors can be propagated using the `?` operator, which automatically
/// converts any `Into<anyhow::Error>` type into `SelectorError::UserError`.
/// A nested selector's error propagated with `?` becomes the calling
/// selector's own failure.
#[derive(Debug, Clone)]
pub enum SelectorError {
    /// The selector function failed.
    ///
    /// The error is recorded on the result entry. Unless an `on_error` hook
    /// recovers a value, the entry keeps no usable result and the error is
    /// returned to the outermost caller.
    UserError(Arc<anyhow::Error>),

    /// A selector was called without a state while no selector of its
    /// universe was running.
    MissingState {
        /// Display name of the selector.
        selector: String,
    },

    /// Internal bookkeeping was found in an impossible shape.
    ///
    /// This signals a defect in the engine, not something callers should
    /// design around.
    Internal {
        /// What was inconsistent.
        message: String,
    },
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::UserError(e) => write!(f, "user error: {}", e),
            SelectorError::MissingState { selector } => write!(
                f,
                "selector `{}` was called without state outside of any selector",
                selector
            ),
            SelectorError::Internal { message } => {
                write!(f, "internal consistency error: {}", message)
            }
        }
    }
}

impl<T: Into<anyhow::Error>> From<T> for SelectorError {
    fn from(err: T) -> Self {
        SelectorError::UserError(Arc::new(err.into()))
    }
}

impl SelectorError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SelectorError::Internal {
            message: message.into(),
        }
    }

    /// Returns a reference to the inner user error if this is a `UserError` variant.
    pub fn user_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            SelectorError::UserError(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the user error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.user_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is a `UserError` containing an error of type `E`.
    pub fn is<E: std::error::Error + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns true if both errors are the same recorded failure.
    pub fn same_failure(&self, other: &SelectorError) -> bool {
        match (self, other) {
            (SelectorError::UserError(a), SelectorError::UserError(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
