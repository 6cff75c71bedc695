//! Selective suppression of asynchronous delivery.
//!
//! Each context keeps a stack of enable/disable windows. A window names
//! event types (or all types); the innermost window that covers an
//! event's type decides whether the event may be delivered at a poll
//! point. Suppressed messages stay queued in place.
//!
//! | Window list | Covers type `T` when |
//! |-------------|----------------------|
//! | empty | always |
//! | `[A, B]` | `T` is-a `A` or `T` is-a `B` |
//!
//! With no window covering a type, delivery is enabled.

use crate::context::{self, Context};
use crate::error::EhmError;
use crate::frame::FrameId;
use ehm_event::EventType;
use tracing::error;

#[derive(Debug, Clone)]
struct DeliveryNode {
    frame: FrameId,
    enabled: bool,
    types: Vec<&'static EventType>,
}

impl DeliveryNode {
    fn covers(&self, ty: &EventType) -> bool {
        self.types.is_empty() || self.types.iter().any(|listed| ty.is_a(listed))
    }
}

/// Per-context stack of enable/disable windows.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeliveryStack {
    nodes: Vec<DeliveryNode>,
}

impl DeliveryStack {
    pub(crate) fn push(&mut self, enabled: bool, types: Vec<&'static EventType>) -> FrameId {
        let frame = FrameId::fresh();
        self.nodes.push(DeliveryNode {
            frame,
            enabled,
            types,
        });
        frame
    }

    pub(crate) fn pop(&mut self, frame: FrameId) -> Result<(), EhmError> {
        match self.nodes.last() {
            Some(top) if top.frame == frame => {
                self.nodes.pop();
                Ok(())
            }
            _ => {
                self.nodes.retain(|node| node.frame != frame);
                Err(EhmError::StackDiscipline(format!(
                    "delivery scope {frame} released out of order"
                )))
            }
        }
    }

    pub(crate) fn is_deliverable(&self, ty: &EventType) -> bool {
        self.nodes
            .iter()
            .rev()
            .find(|node| node.covers(ty))
            .map_or(true, |node| node.enabled)
    }

    pub(crate) fn depth(&self) -> usize {
        self.nodes.len()
    }
}

/// An open enable or disable window on the current context.
///
/// # Example
///
/// ```
/// use ehm_event::{impl_event, EventHeader, TypedEvent};
/// use ehm_runtime::{is_deliverable, DeliveryScope};
///
/// #[derive(Debug, Clone)]
/// struct Interrupt { header: EventHeader }
/// impl_event!(Interrupt);
///
/// assert!(is_deliverable(Interrupt::static_type()));
/// {
///     let _off = DeliveryScope::disable_all();
///     assert!(!is_deliverable(Interrupt::static_type()));
///     {
///         let _on = DeliveryScope::enable([Interrupt::static_type()]);
///         assert!(is_deliverable(Interrupt::static_type()));
///     }
///     assert!(!is_deliverable(Interrupt::static_type()));
/// }
/// assert!(is_deliverable(Interrupt::static_type()));
/// ```
#[must_use = "the window closes as soon as the scope is dropped"]
pub struct DeliveryScope {
    context: Context,
    frame: FrameId,
}

impl DeliveryScope {
    /// Enables delivery of `types` (and their descendants).
    pub fn enable(types: impl IntoIterator<Item = &'static EventType>) -> Self {
        Self::push(true, types.into_iter().collect())
    }

    /// Disables delivery of `types` (and their descendants).
    pub fn disable(types: impl IntoIterator<Item = &'static EventType>) -> Self {
        Self::push(false, types.into_iter().collect())
    }

    /// Enables delivery of every type.
    pub fn enable_all() -> Self {
        Self::push(true, Vec::new())
    }

    /// Disables delivery of every type.
    pub fn disable_all() -> Self {
        Self::push(false, Vec::new())
    }

    fn push(enabled: bool, types: Vec<&'static EventType>) -> Self {
        let context = context::current();
        let frame = context.with_state(|state| state.delivery.push(enabled, types));
        Self { context, frame }
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        let frame = self.frame;
        if let Err(err) = self.context.with_state(|state| state.delivery.pop(frame)) {
            error!("context '{}': {}", self.context.name(), err);
        }
    }
}

/// Returns whether an event of type `ty` may be delivered to the current
/// context right now.
#[must_use]
pub fn is_deliverable(ty: &EventType) -> bool {
    context::current().with_state(|state| state.delivery.is_deliverable(ty))
}

/// Runs `body` with delivery of `types` enabled.
pub fn with_delivery_enabled<T>(
    types: impl IntoIterator<Item = &'static EventType>,
    body: impl FnOnce() -> T,
) -> T {
    let _window = DeliveryScope::enable(types);
    body()
}

/// Runs `body` with delivery of `types` disabled.
pub fn with_delivery_disabled<T>(
    types: impl IntoIterator<Item = &'static EventType>,
    body: impl FnOnce() -> T,
) -> T {
    let _window = DeliveryScope::disable(types);
    body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehm_event::{impl_event, EventHeader, TypedEvent};

    #[derive(Debug, Clone)]
    struct Io {
        header: EventHeader,
    }
    impl_event!(Io);

    #[derive(Debug, Clone)]
    struct Read {
        header: EventHeader,
    }
    impl_event!(Read: Io);

    #[derive(Debug, Clone)]
    struct Cancel {
        header: EventHeader,
    }
    impl_event!(Cancel);

    #[test]
    fn empty_stack_enables_everything() {
        let stack = DeliveryStack::default();
        assert!(stack.is_deliverable(Io::static_type()));
    }

    #[test]
    fn disabling_a_base_covers_descendants() {
        let mut stack = DeliveryStack::default();
        stack.push(false, vec![Io::static_type()]);
        assert!(!stack.is_deliverable(Read::static_type()));
        assert!(!stack.is_deliverable(Io::static_type()));
        assert!(stack.is_deliverable(Cancel::static_type()));
    }

    #[test]
    fn disabling_a_descendant_leaves_base() {
        let mut stack = DeliveryStack::default();
        stack.push(false, vec![Read::static_type()]);
        assert!(stack.is_deliverable(Io::static_type()));
        assert!(!stack.is_deliverable(Read::static_type()));
    }

    #[test]
    fn innermost_covering_window_decides() {
        let mut stack = DeliveryStack::default();
        let outer = stack.push(false, Vec::new());
        let inner = stack.push(true, vec![Read::static_type()]);

        assert!(stack.is_deliverable(Read::static_type()));
        assert!(!stack.is_deliverable(Io::static_type()));
        assert!(!stack.is_deliverable(Cancel::static_type()));

        stack.pop(inner).expect("lifo pop");
        assert!(!stack.is_deliverable(Read::static_type()));
        stack.pop(outer).expect("lifo pop");
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn out_of_order_pop_is_reported() {
        let mut stack = DeliveryStack::default();
        let outer = stack.push(false, Vec::new());
        let _inner = stack.push(true, Vec::new());
        assert!(matches!(
            stack.pop(outer),
            Err(EhmError::StackDiscipline(_))
        ));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn scopes_on_current_context() {
        assert!(is_deliverable(Cancel::static_type()));
        with_delivery_disabled([Cancel::static_type()], || {
            assert!(!is_deliverable(Cancel::static_type()));
            assert!(is_deliverable(Io::static_type()));
            with_delivery_enabled([Cancel::static_type()], || {
                assert!(is_deliverable(Cancel::static_type()));
            });
        });
        assert!(is_deliverable(Cancel::static_type()));
    }
}
