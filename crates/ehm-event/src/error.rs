//! Event layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EventError::TypeMismatch`] | `EVENT_TYPE_MISMATCH` | No |
//! | [`EventError::NotRaised`] | `EVENT_NOT_RAISED` | No |

use ehm_types::ErrorCode;
use thiserror::Error;

/// Event layer error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A handler body expected a different concrete type.
    ///
    /// Happens when a handler declared for a base type downcasts to a
    /// derived type the raised event is not.
    #[error("event type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Requested concrete type.
        expected: &'static str,
        /// Concrete type of the event.
        actual: &'static str,
    },

    /// Raise-time data was requested from an event never raised.
    #[error("event {0} has not been raised")]
    NotRaised(&'static str),
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "EVENT_TYPE_MISMATCH",
            Self::NotRaised(_) => "EVENT_NOT_RAISED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
