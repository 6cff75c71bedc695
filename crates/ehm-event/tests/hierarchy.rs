//! Declaring event hierarchies from outside the crate.

use ehm_event::{
    base_event_type, impl_event, Event, EventHeader, RaiseKind, TypedEvent, UnhandledResume,
};
use ehm_types::{Binding, ContextId};

#[derive(Debug, Clone)]
struct IoError {
    header: EventHeader,
}
impl_event!(IoError);

#[derive(Debug, Clone)]
struct ReadError {
    header: EventHeader,
    bytes: usize,
}
impl_event!(ReadError: IoError);

#[derive(Debug, Clone)]
struct EofError {
    header: EventHeader,
}
impl_event!(EofError: ReadError);

/// A variant written by hand to override the unhandled-resume policy.
#[derive(Debug, Clone)]
struct Fatal {
    header: EventHeader,
}

impl TypedEvent for Fatal {
    fn static_type() -> &'static ehm_event::EventType {
        static TYPE: ehm_event::EventType =
            ehm_event::EventType::derived("Fatal", base_event_type);
        &TYPE
    }
}

impl Event for Fatal {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    fn event_type(&self) -> &'static ehm_event::EventType {
        Self::static_type()
    }

    fn duplicate(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn unhandled_resume(&self) -> Option<UnhandledResume> {
        Some(UnhandledResume::Terminate)
    }
}

#[test]
fn three_level_hierarchy() {
    assert!(EofError::static_type().is_a(ReadError::static_type()));
    assert!(EofError::static_type().is_a(IoError::static_type()));
    assert!(EofError::static_type().is_a(base_event_type()));
    assert!(!IoError::static_type().is_a(EofError::static_type()));
    assert_eq!(EofError::static_type().depth(), 3);
}

#[test]
fn static_and_dynamic_tags_agree() {
    let ev = ReadError {
        header: EventHeader::new("partial"),
        bytes: 3,
    };
    assert_eq!(ev.event_type(), ReadError::static_type());
    assert_eq!(
        ev.event_type().parent(),
        Some(IoError::static_type())
    );
}

#[test]
fn duplicate_outlives_original() {
    let mut original = ReadError {
        header: EventHeader::new("partial read"),
        bytes: 7,
    };
    let socket = 0u8;
    original
        .header_mut()
        .set_source(ContextId::new(), "reader-task");
    original.header_mut().set_binding(Some(Binding::of(&socket)));
    original.header_mut().set_raise_kind(RaiseKind::Termination);

    let copy = original.duplicate();
    drop(original);

    assert_eq!(copy.message(), "partial read");
    assert_eq!(copy.raise_kind(), Some(RaiseKind::Termination));
    assert_eq!(copy.source_name(), "reader-task");
    assert_eq!(copy.original_binding(), Some(Binding::of(&socket)));
    assert_eq!(copy.downcast_ref::<ReadError>().map(|e| e.bytes), Some(7));
    assert!(copy.downcast_ref::<IoError>().is_none());
    assert!(copy.is::<IoError>());
}

#[test]
fn policy_override() {
    let fatal = Fatal {
        header: EventHeader::new("boom"),
    };
    let io = IoError {
        header: EventHeader::default(),
    };
    assert_eq!(fatal.unhandled_resume(), Some(UnhandledResume::Terminate));
    assert_eq!(io.unhandled_resume(), None);
}
