//! Handler entries and tables.
//!
//! A protected block declares its handlers as a [`HandlerTable`]: an
//! ordered list of [`HandlerEntry`] values, searched front to back. The
//! first entry that matches the raised event wins, so more specific types
//! should be declared before their ancestors.
//!
//! # Matching
//!
//! | Entry field | Matches when |
//! |-------------|--------------|
//! | type tag | the event's type *is-a* the tag (covariant) |
//! | any | always |
//! | binding `None` | any originating object |
//! | binding `Some(b)` | the event was raised with the same binding |
//!
//! Termination handlers return the protected block's value, so their
//! tables are `HandlerTable<'a, T>` and may borrow from the caller.
//! Resumption tables live on the context's resumption stack and are
//! shared, so they are `'static` and return `()`.

use crate::error::Raise;
use ehm_event::{Event, EventType, TypedEvent};
use ehm_types::Binding;
use std::fmt;

/// Callable body of a handler.
pub type HandlerFn<'a, R> = Box<dyn Fn(&dyn Event) -> Result<R, Raise> + 'a>;

/// Table of resumption handlers, as pushed on the resumption stack.
pub type ResumptionTable = HandlerTable<'static, ()>;

/// One handler: what it matches and what it runs.
pub struct HandlerEntry<'a, R> {
    ty: Option<&'static EventType>,
    binding: Option<Binding>,
    body: HandlerFn<'a, R>,
}

impl<'a, R> HandlerEntry<'a, R> {
    /// Handles `E` and every type derived from it.
    #[must_use]
    pub fn on<E: TypedEvent>(body: impl Fn(&dyn Event) -> Result<R, Raise> + 'a) -> Self {
        Self::on_type(E::static_type(), body)
    }

    /// Handles `ty` and every type derived from it.
    #[must_use]
    pub fn on_type(
        ty: &'static EventType,
        body: impl Fn(&dyn Event) -> Result<R, Raise> + 'a,
    ) -> Self {
        Self {
            ty: Some(ty),
            binding: None,
            body: Box::new(body),
        }
    }

    /// Handles every event.
    #[must_use]
    pub fn any(body: impl Fn(&dyn Event) -> Result<R, Raise> + 'a) -> Self {
        Self {
            ty: None,
            binding: None,
            body: Box::new(body),
        }
    }

    /// Restricts the entry to events raised with `binding`.
    #[must_use]
    pub fn bound_to(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Returns the declared type, `None` for a catch-all entry.
    #[must_use]
    pub fn event_type(&self) -> Option<&'static EventType> {
        self.ty
    }

    /// Returns the declared binding.
    #[must_use]
    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    /// Returns `true` if this entry handles `event`.
    #[must_use]
    pub fn matches(&self, event: &dyn Event) -> bool {
        let type_ok = self.ty.map_or(true, |ty| event.event_type().is_a(ty));
        let binding_ok = self
            .binding
            .map_or(true, |binding| event.original_binding() == Some(binding));
        type_ok && binding_ok
    }

    pub(crate) fn invoke(&self, event: &dyn Event) -> Result<R, Raise> {
        (self.body)(event)
    }
}

impl<R> fmt::Debug for HandlerEntry<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("ty", &self.ty.map_or("*any*", EventType::name))
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable list of handler entries.
///
/// # Example
///
/// ```
/// use ehm_event::{impl_event, EventHeader};
/// use ehm_runtime::{HandlerEntry, HandlerTable};
///
/// #[derive(Debug, Clone)]
/// struct Timeout { header: EventHeader }
/// impl_event!(Timeout);
///
/// let table: HandlerTable<'_, u32> = HandlerTable::new()
///     .with(HandlerEntry::on::<Timeout>(|_| Ok(1)))
///     .with(HandlerEntry::any(|_| Ok(0)));
/// assert_eq!(table.len(), 2);
/// ```
pub struct HandlerTable<'a, R> {
    entries: Vec<HandlerEntry<'a, R>>,
}

impl<'a, R> HandlerTable<'a, R> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry; later entries are consulted after earlier ones.
    #[must_use]
    pub fn with(mut self, entry: HandlerEntry<'a, R>) -> Self {
        self.entries.push(entry);
        self
    }

    /// Returns the first entry matching `event`.
    #[must_use]
    pub fn find(&self, event: &dyn Event) -> Option<&HandlerEntry<'a, R>> {
        self.entries.iter().find(|entry| entry.matches(event))
    }

    pub(crate) fn position(&self, event: &dyn Event) -> Option<usize> {
        self.entries.iter().position(|entry| entry.matches(event))
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&HandlerEntry<'a, R>> {
        self.entries.get(index)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the declared type names in order, `"*any*"` for catch-alls.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .map(|entry| entry.ty.map_or("*any*", EventType::name))
    }
}

impl<R> Default for HandlerTable<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R> FromIterator<HandlerEntry<'a, R>> for HandlerTable<'a, R> {
    fn from_iter<I: IntoIterator<Item = HandlerEntry<'a, R>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<R> fmt::Debug for HandlerTable<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}
