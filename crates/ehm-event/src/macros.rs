//! Declarative implementation of [`Event`](crate::Event).

/// Implements [`Event`](crate::Event) and [`TypedEvent`](crate::TypedEvent)
/// for a struct with a `header: EventHeader` field.
///
/// `impl_event!(Name)` declares a type directly under the base event;
/// `impl_event!(Name: Parent)` declares it under another event type, so
/// handlers for `Parent` also catch `Name`.
///
/// `duplicate` is derived from `Clone`; a variant that is not `Clone`
/// does not compile.
///
/// # Example
///
/// ```
/// use ehm_event::{impl_event, Event, EventHeader, TypedEvent};
///
/// #[derive(Debug, Clone)]
/// struct IoError { header: EventHeader }
/// impl_event!(IoError);
///
/// #[derive(Debug, Clone)]
/// struct ReadError { header: EventHeader, fd: i32 }
/// impl_event!(ReadError: IoError);
///
/// assert!(ReadError::static_type().is_a(IoError::static_type()));
/// assert!(!IoError::static_type().is_a(ReadError::static_type()));
/// ```
#[macro_export]
macro_rules! impl_event {
    (@impl $ty:ident, $parent:expr) => {
        impl $crate::TypedEvent for $ty {
            fn static_type() -> &'static $crate::EventType {
                static TYPE: $crate::EventType =
                    $crate::EventType::derived(::std::stringify!($ty), $parent);
                &TYPE
            }
        }

        impl $crate::Event for $ty {
            fn header(&self) -> &$crate::EventHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut $crate::EventHeader {
                &mut self.header
            }

            fn event_type(&self) -> &'static $crate::EventType {
                <Self as $crate::TypedEvent>::static_type()
            }

            fn duplicate(&self) -> ::std::boxed::Box<dyn $crate::Event> {
                ::std::boxed::Box::new(::std::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
    ($ty:ident : $parent:ty) => {
        $crate::impl_event!(@impl $ty, <$parent as $crate::TypedEvent>::static_type);
    };
    ($ty:ident) => {
        $crate::impl_event!(@impl $ty, $crate::base_event_type);
    };
}
