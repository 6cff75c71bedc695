//! Event type tags and the is-a hierarchy.
//!
//! Handlers are declared against an [`EventType`]. A raise matches a
//! handler when the raised event's type *is* the declared type or one of
//! its descendants, so a handler for a base type also catches every
//! derived type.
//!
//! ```text
//!            BaseEvent
//!           /         \
//!       IoError     Cancel
//!       /     \
//!  ReadError  WriteError
//! ```
//!
//! Each concrete type owns exactly one `static EventType`; identity is the
//! address of that static, not the name.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Accessor for a parent type tag.
///
/// A function pointer rather than a reference so tags can be declared in
/// `static` items that refer to statics in other crates.
pub type ParentFn = fn() -> &'static EventType;

/// Type tag of an event variant.
///
/// # Example
///
/// ```
/// use ehm_event::{base_event_type, EventType};
///
/// fn io_error() -> &'static EventType {
///     static TYPE: EventType = EventType::derived("IoError", base_event_type);
///     &TYPE
/// }
///
/// fn read_error() -> &'static EventType {
///     static TYPE: EventType = EventType::derived("ReadError", io_error);
///     &TYPE
/// }
///
/// assert!(read_error().is_a(io_error()));
/// assert!(read_error().is_a(base_event_type()));
/// assert!(!io_error().is_a(read_error()));
/// ```
pub struct EventType {
    name: &'static str,
    parent: Option<ParentFn>,
}

impl EventType {
    /// Declares a type with no parent.
    ///
    /// Only the root [`base_event_type`] should use this; every other
    /// type descends from it so catch-all base handlers work.
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Declares a type derived from `parent`.
    #[must_use]
    pub const fn derived(name: &'static str, parent: ParentFn) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Returns the type name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the parent type, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&'static EventType> {
        self.parent.map(|parent| parent())
    }

    /// Returns `true` if `self` equals `ancestor` or derives from it.
    #[must_use]
    pub fn is_a(&self, ancestor: &EventType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if std::ptr::eq(ty, ancestor) {
                return true;
            }
            current = ty.parent();
        }
        false
    }

    /// Iterates from `self` up to the root, `self` first.
    pub fn lineage(&self) -> impl Iterator<Item = &EventType> {
        std::iter::successors(Some(self), |ty| ty.parent())
    }

    /// Number of ancestors between `self` and the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lineage().count() - 1
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const Self as usize).hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Root of every event hierarchy.
#[must_use]
pub fn base_event_type() -> &'static EventType {
    static BASE: EventType = EventType::root("BaseEvent");
    &BASE
}
