//! Runtime errors and the raise carrier.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`EhmError::InvalidRethrow`] | `EHM_INVALID_RETHROW` | No |
//! | [`EhmError::InvalidReresume`] | `EHM_INVALID_RERESUME` | No |
//! | [`EhmError::StackDiscipline`] | `EHM_STACK_DISCIPLINE` | No |
//! | [`EhmError::Event`] | `EHM_EVENT` | No |
//!
//! # Raise
//!
//! A termination is a [`Raise`] travelling up the call stack as the `Err`
//! side of a `Result`. It carries either a raised event, which handler
//! tables can match, or a fatal [`EhmError`], which no table matches and
//! which always ends the context.

use ehm_event::{Event, EventError, RaiseKind};
use ehm_types::{ContextId, ErrorCode};
use thiserror::Error;

/// Fatal misuse of the delivery engine.
///
/// # Example
///
/// ```
/// use ehm_runtime::EhmError;
/// use ehm_types::ErrorCode;
///
/// let err = EhmError::InvalidRethrow;
/// assert_eq!(err.code(), "EHM_INVALID_RETHROW");
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EhmError {
    /// Re-raise of a termination outside any termination handler.
    #[error("rethrow outside an active termination handler")]
    InvalidRethrow,

    /// Re-raise of a resumption outside any resumption handler.
    #[error("reresume outside an active resumption handler")]
    InvalidReresume,

    /// A scope guard was released out of LIFO order.
    #[error("scope stack discipline violated: {0}")]
    StackDiscipline(String),

    /// An event query failed inside a handler body.
    #[error(transparent)]
    Event(#[from] EventError),
}

impl ErrorCode for EhmError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidRethrow => "EHM_INVALID_RETHROW",
            Self::InvalidReresume => "EHM_INVALID_RERESUME",
            Self::StackDiscipline(_) => "EHM_STACK_DISCIPLINE",
            Self::Event(_) => "EHM_EVENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A termination in flight.
///
/// Produced by [`throw`](crate::throw), [`rethrow`](crate::rethrow),
/// [`poll`](crate::poll) and by fatal errors; propagated with `?`.
#[derive(Debug, Error)]
pub enum Raise {
    /// A raised event, matchable by handler tables.
    #[error("{} raised from '{}': {}", .0.type_name(), .0.source_name(), .0.message())]
    Event(Box<dyn Event>),

    /// A fatal runtime error. Never matched; ends the context.
    #[error("fatal: {0}")]
    Fatal(#[from] EhmError),
}

impl Raise {
    /// Returns the raised event, if this is not a fatal error.
    #[must_use]
    pub fn event(&self) -> Option<&dyn Event> {
        match self {
            Self::Event(event) => Some(event.as_ref()),
            Self::Fatal(_) => None,
        }
    }

    /// Consumes the raise, returning the event if there is one.
    #[must_use]
    pub fn into_event(self) -> Option<Box<dyn Event>> {
        match self {
            Self::Event(event) => Some(event),
            Self::Fatal(_) => None,
        }
    }

    /// Returns the fatal error, if this is one.
    #[must_use]
    pub fn fatal(&self) -> Option<&EhmError> {
        match self {
            Self::Event(_) => None,
            Self::Fatal(err) => Some(err),
        }
    }

    /// Returns `true` if this raise is a fatal error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Formats the default-termination diagnostic for a raise that left
    /// the context named `context`.
    #[must_use]
    pub fn diagnostic(&self, context: &str) -> String {
        match self {
            Self::Event(event) => format!(
                "context '{}': unhandled {} {} raised from '{}': {}",
                context,
                event.raise_kind().unwrap_or(RaiseKind::Termination),
                event.type_name(),
                event.source_name(),
                event.message()
            ),
            Self::Fatal(err) => format!("context '{}': fatal error {}: {}", context, err.code(), err),
        }
    }
}

impl From<EventError> for Raise {
    fn from(err: EventError) -> Self {
        Self::Fatal(EhmError::Event(err))
    }
}

/// A context ended because a raise escaped it.
///
/// Returned by [`Context::run`](crate::Context::run) after the default
/// termination policy has reported the diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{diagnostic}")]
pub struct Terminated {
    /// The context that ended.
    pub context: ContextId,
    /// Type name of the escaping event; `None` for fatal errors.
    pub event_type: Option<&'static str>,
    /// Code of the fatal error; `None` for events.
    pub fatal_code: Option<&'static str>,
    /// The reported diagnostic line.
    pub diagnostic: String,
}

impl Terminated {
    pub(crate) fn new(context: ContextId, context_name: &str, raise: &Raise) -> Self {
        Self {
            context,
            event_type: raise.event().map(|event| event.type_name()),
            fatal_code: raise.fatal().map(ErrorCode::code),
            diagnostic: raise.diagnostic(context_name),
        }
    }

    /// Returns `true` if a fatal runtime error ended the context.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.fatal_code.is_some()
    }
}

impl ErrorCode for Terminated {
    fn code(&self) -> &'static str {
        "EHM_TERMINATED"
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehm_event::{impl_event, EventHeader};
    use ehm_types::assert_error_codes;

    #[derive(Debug, Clone)]
    struct Overflow {
        header: EventHeader,
    }
    impl_event!(Overflow);

    fn overflow(message: &str) -> Overflow {
        let mut ev = Overflow {
            header: EventHeader::new(message),
        };
        ev.header.set_source(ContextId::new(), "producer");
        ev.header.set_raise_kind(RaiseKind::Termination);
        ev
    }

    #[test]
    fn all_codes_are_valid() {
        assert_error_codes(
            &[
                EhmError::InvalidRethrow,
                EhmError::InvalidReresume,
                EhmError::StackDiscipline("x".into()),
                EhmError::Event(EventError::NotRaised("Overflow")),
            ],
            "EHM_",
        );
    }

    #[test]
    fn raise_accessors() {
        let raise = Raise::Event(Box::new(overflow("buffer full")));
        assert!(!raise.is_fatal());
        assert_eq!(raise.event().map(|e| e.type_name()), Some("Overflow"));
        assert!(raise.fatal().is_none());

        let fatal: Raise = EhmError::InvalidReresume.into();
        assert!(fatal.is_fatal());
        assert!(fatal.into_event().is_none());
    }

    #[test]
    fn raise_display_names_type_and_source() {
        let raise = Raise::Event(Box::new(overflow("buffer full")));
        assert_eq!(
            raise.to_string(),
            "Overflow raised from 'producer': buffer full"
        );
    }

    #[test]
    fn event_error_converts_to_fatal() {
        let raise: Raise = EventError::NotRaised("Overflow").into();
        assert_eq!(
            raise.fatal(),
            Some(&EhmError::Event(EventError::NotRaised("Overflow")))
        );
    }

    #[test]
    fn terminated_records_cause() {
        let id = ContextId::new();
        let raise = Raise::Event(Box::new(overflow("buffer full")));
        let terminated = Terminated::new(id, "consumer", &raise);

        assert_eq!(terminated.context, id);
        assert_eq!(terminated.event_type, Some("Overflow"));
        assert!(!terminated.is_fatal());
        assert!(terminated.diagnostic.contains("context 'consumer'"));
        assert!(terminated.diagnostic.contains("unhandled termination Overflow"));
        assert!(terminated.diagnostic.contains("'producer'"));
        assert!(terminated.diagnostic.contains("buffer full"));
        assert_eq!(terminated.code(), "EHM_TERMINATED");

        let fatal = Terminated::new(id, "consumer", &Raise::Fatal(EhmError::InvalidRethrow));
        assert!(fatal.is_fatal());
        assert_eq!(fatal.fatal_code, Some("EHM_INVALID_RETHROW"));
    }
}
