//! The raisable event base type.
//!
//! An event is a typed condition object. Client code defines concrete
//! variants; every variant embeds an [`EventHeader`] carrying the data the
//! runtime fills in when the event is raised.
//!
//! # Lifecycle
//!
//! ```text
//!   construct ──► (maybe long after) raise ──► handled / delivered
//!      │                 │
//!      │                 └─ runtime stamps kind, source, binding
//!      └─ message copied, bounded to 155 chars
//! ```
//!
//! Until an event has been raised, [`Event::raise_kind`] and
//! [`Event::source`] are `None`.
//!
//! # Defining a Variant
//!
//! ```
//! use ehm_event::{impl_event, Event, EventHeader, TypedEvent};
//!
//! #[derive(Debug, Clone)]
//! struct Timeout {
//!     header: EventHeader,
//!     after_ms: u64,
//! }
//!
//! impl_event!(Timeout);
//!
//! let ev = Timeout { header: EventHeader::new("deadline passed"), after_ms: 250 };
//! assert_eq!(ev.message(), "deadline passed");
//! assert_eq!(ev.type_name(), "Timeout");
//! assert!(ev.raise_kind().is_none());
//!
//! let copy = ev.duplicate();
//! assert_eq!(copy.message(), ev.message());
//! assert_eq!(copy.downcast_ref::<Timeout>().map(|t| t.after_ms), Some(250));
//! ```

use crate::error::EventError;
use crate::kind::EventType;
use ehm_types::{truncate_chars, Binding, ContextId, MAX_MESSAGE_CHARS, MAX_NAME_CHARS};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Name reported for events whose raising context is not recorded.
pub const UNKNOWN_SOURCE: &str = "*unknown*";

/// How an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaiseKind {
    /// Unwinds until a matching handler or the context boundary.
    Termination,
    /// Calls a matching handler in place; control returns to the raise site.
    Resumption,
}

impl fmt::Display for RaiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Termination => f.write_str("termination"),
            Self::Resumption => f.write_str("resumption"),
        }
    }
}

/// What to do with a resumption nobody handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledResume {
    /// Report and return to the raise site.
    #[default]
    Ignore,
    /// Report and re-raise the event as a termination.
    Terminate,
}

/// Raise-time data embedded in every event.
///
/// The message is fixed at construction. Source, binding and raise kind
/// are written by the runtime when the event is raised and copied along
/// with the event by [`Event::duplicate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHeader {
    source: Option<ContextId>,
    source_name: String,
    message: String,
    binding: Option<Binding>,
    raise_kind: Option<RaiseKind>,
}

impl EventHeader {
    /// Creates a header with the given diagnostic message.
    ///
    /// Messages longer than [`MAX_MESSAGE_CHARS`] are truncated.
    #[must_use]
    pub fn new(message: impl AsRef<str>) -> Self {
        Self {
            message: truncate_chars(message.as_ref(), MAX_MESSAGE_CHARS),
            ..Self::default()
        }
    }

    /// Returns the diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replaces the diagnostic message, truncating as [`new`](Self::new) does.
    pub fn set_message(&mut self, message: impl AsRef<str>) {
        self.message = truncate_chars(message.as_ref(), MAX_MESSAGE_CHARS);
    }

    /// Returns the raising context, if recorded.
    #[must_use]
    pub fn source(&self) -> Option<ContextId> {
        self.source
    }

    /// Returns the raising context's name, or [`UNKNOWN_SOURCE`].
    #[must_use]
    pub fn source_name(&self) -> &str {
        if self.source.is_some() {
            &self.source_name
        } else {
            UNKNOWN_SOURCE
        }
    }

    /// Records the raising context. The name is copied and bounded to
    /// [`MAX_NAME_CHARS`] so it survives the context.
    pub fn set_source(&mut self, id: ContextId, name: &str) {
        self.source = Some(id);
        self.source_name = truncate_chars(name, MAX_NAME_CHARS);
    }

    /// Forgets the raising context.
    pub fn clear_source(&mut self) {
        self.source = None;
        self.source_name.clear();
    }

    /// Returns the binding the event was raised with.
    #[must_use]
    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    /// Sets the binding used for handler matching.
    pub fn set_binding(&mut self, binding: Option<Binding>) {
        self.binding = binding;
    }

    /// Returns how the event was last raised.
    #[must_use]
    pub fn raise_kind(&self) -> Option<RaiseKind> {
        self.raise_kind
    }

    /// Records how the event is being raised.
    pub fn set_raise_kind(&mut self, kind: RaiseKind) {
        self.raise_kind = Some(kind);
    }
}

/// A raisable, resumable, asynchronously deliverable event.
///
/// Implement through [`impl_event!`](crate::impl_event) unless a variant
/// needs to override [`unhandled_resume`](Self::unhandled_resume) or
/// [`default_terminate`](Self::default_terminate).
///
/// # Required Methods
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`header`](Self::header) / [`header_mut`](Self::header_mut) | Raise-time data |
/// | [`event_type`](Self::event_type) | Tag used for covariant matching |
/// | [`duplicate`](Self::duplicate) | Owned copy for async delivery and re-raise |
/// | [`as_any`](Self::as_any) | Downcasting in handler bodies |
pub trait Event: Any + Send + fmt::Debug {
    /// Returns the embedded header.
    fn header(&self) -> &EventHeader;

    /// Returns the embedded header mutably.
    fn header_mut(&mut self) -> &mut EventHeader;

    /// Returns the concrete type tag.
    fn event_type(&self) -> &'static EventType;

    /// Produces an independent, fully owned copy, header included.
    fn duplicate(&self) -> Box<dyn Event>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Policy when a resumption of this event finds no handler.
    ///
    /// `None` defers to the runtime configuration.
    fn unhandled_resume(&self) -> Option<UnhandledResume> {
        None
    }

    /// Called when a termination of this event escapes its context.
    ///
    /// Receives the diagnostic the runtime is about to report and returns
    /// the one to report. The context ends either way.
    fn default_terminate(&self, diagnostic: String) -> String {
        diagnostic
    }

    /// Returns the diagnostic message.
    fn message(&self) -> &str {
        self.header().message()
    }

    /// Returns the raising context, if recorded.
    fn source(&self) -> Option<ContextId> {
        self.header().source()
    }

    /// Returns the raising context's name, or [`UNKNOWN_SOURCE`].
    fn source_name(&self) -> &str {
        self.header().source_name()
    }

    /// Returns how the event was last raised.
    fn raise_kind(&self) -> Option<RaiseKind> {
        self.header().raise_kind()
    }

    /// Returns the binding the event was raised with.
    fn original_binding(&self) -> Option<Binding> {
        self.header().binding()
    }

    /// Returns the concrete type's name.
    fn type_name(&self) -> &'static str {
        self.event_type().name()
    }
}

/// An [`Event`] whose type tag is known statically.
pub trait TypedEvent: Event + Sized {
    /// Returns the tag shared by every value of this type.
    fn static_type() -> &'static EventType;
}

impl dyn Event {
    /// Returns `true` if this event is an `E` or derives from it.
    #[must_use]
    pub fn is<E: TypedEvent>(&self) -> bool {
        self.event_type().is_a(E::static_type())
    }

    /// Returns the concrete value if it is exactly an `E`.
    #[must_use]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Like [`downcast_ref`](Self::downcast_ref) but with an error naming
    /// both types, for use with `?` inside handler bodies.
    ///
    /// # Errors
    ///
    /// [`EventError::TypeMismatch`] if the event is not exactly an `E`.
    pub fn expect_ref<E: TypedEvent>(&self) -> Result<&E, EventError> {
        self.downcast_ref::<E>()
            .ok_or_else(|| EventError::TypeMismatch {
                expected: E::static_type().name(),
                actual: self.type_name(),
            })
    }
}

impl dyn Event {
    /// Returns the raise kind, or an error for an event never raised.
    ///
    /// # Errors
    ///
    /// [`EventError::NotRaised`] if no raise has stamped the event yet.
    pub fn raised_kind(&self) -> Result<RaiseKind, EventError> {
        self.raise_kind()
            .ok_or_else(|| EventError::NotRaised(self.type_name()))
    }
}

impl Clone for Box<dyn Event> {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_event;

    #[derive(Debug, Clone)]
    struct Io {
        header: EventHeader,
    }
    impl_event!(Io);

    #[derive(Debug, Clone)]
    struct Read {
        header: EventHeader,
        offset: u64,
    }
    impl_event!(Read: Io);

    #[test]
    fn fresh_event_is_not_raised() {
        let ev = Io {
            header: EventHeader::new("disk"),
        };
        assert_eq!(ev.message(), "disk");
        assert!(ev.raise_kind().is_none());
        assert!(ev.source().is_none());
        assert_eq!(ev.source_name(), UNKNOWN_SOURCE);
        assert!(ev.original_binding().is_none());
    }

    #[test]
    fn default_terminate_keeps_diagnostic() {
        let ev = Io {
            header: EventHeader::new("disk"),
        };
        assert_eq!(ev.default_terminate("as reported".into()), "as reported");
    }

    #[test]
    fn default_message_is_empty() {
        assert_eq!(EventHeader::default().message(), "");
    }

    #[test]
    fn message_is_truncated() {
        let long = "m".repeat(400);
        let header = EventHeader::new(&long);
        assert_eq!(header.message().chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn source_name_is_truncated_and_kept() {
        let mut header = EventHeader::new("x");
        let id = ContextId::new();
        header.set_source(id, &"n".repeat(300));
        assert_eq!(header.source(), Some(id));
        assert_eq!(header.source_name().chars().count(), MAX_NAME_CHARS);

        header.clear_source();
        assert_eq!(header.source_name(), UNKNOWN_SOURCE);
    }

    #[test]
    fn duplicate_copies_header_and_payload() {
        let mut ev = Read {
            header: EventHeader::new("short read"),
            offset: 512,
        };
        ev.header_mut().set_raise_kind(RaiseKind::Resumption);
        ev.header_mut().set_source(ContextId::new(), "reader");

        let copy = ev.duplicate();
        drop(ev);

        assert_eq!(copy.message(), "short read");
        assert_eq!(copy.raise_kind(), Some(RaiseKind::Resumption));
        assert_eq!(copy.source_name(), "reader");
        assert_eq!(copy.downcast_ref::<Read>().map(|r| r.offset), Some(512));
    }

    #[test]
    fn covariant_is_query() {
        let read: Box<dyn Event> = Box::new(Read {
            header: EventHeader::default(),
            offset: 0,
        });
        let io: Box<dyn Event> = Box::new(Io {
            header: EventHeader::default(),
        });

        assert!(read.is::<Read>());
        assert!(read.is::<Io>());
        assert!(io.is::<Io>());
        assert!(!io.is::<Read>());
    }

    #[test]
    fn expect_ref_reports_mismatch() {
        let io: Box<dyn Event> = Box::new(Io {
            header: EventHeader::default(),
        });
        let err = io.expect_ref::<Read>().unwrap_err();
        assert_eq!(
            err,
            EventError::TypeMismatch {
                expected: "Read",
                actual: "Io"
            }
        );
        assert!(io.expect_ref::<Io>().is_ok());
    }

    #[test]
    fn raised_kind_requires_raise() {
        let mut ev: Box<dyn Event> = Box::new(Io {
            header: EventHeader::default(),
        });
        assert_eq!(ev.raised_kind(), Err(EventError::NotRaised("Io")));
        ev.header_mut().set_raise_kind(RaiseKind::Termination);
        assert_eq!(ev.raised_kind(), Ok(RaiseKind::Termination));
    }

    #[test]
    fn boxed_clone_duplicates() {
        let ev: Box<dyn Event> = Box::new(Io {
            header: EventHeader::new("cloned"),
        });
        let copy = ev.clone();
        assert_eq!(copy.message(), "cloned");
        assert_eq!(copy.type_name(), "Io");
    }

    #[test]
    fn raise_kind_display_and_serde() {
        assert_eq!(RaiseKind::Termination.to_string(), "termination");
        let json = serde_json::to_string(&RaiseKind::Resumption).expect("serialize kind");
        assert_eq!(json, "\"resumption\"");
        let policy: UnhandledResume =
            serde_json::from_str("\"terminate\"").expect("deserialize policy");
        assert_eq!(policy, UnhandledResume::Terminate);
        assert_eq!(UnhandledResume::default(), UnhandledResume::Ignore);
    }
}
