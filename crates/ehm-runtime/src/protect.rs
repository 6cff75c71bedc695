//! Protected blocks.
//!
//! A protected block is the unit a try/catch translator would emit:
//!
//! ```text
//!   finally ─┐
//!            └─ catch (termination table) ─┐
//!                                          └─ resumption scope ─┐
//!                                                               └─ delivery window ─┐
//!                                                                                   └─ body
//! ```
//!
//! Resumption handlers are live only while the body runs; catch handlers
//! run after the body has been left; the cleanup runs last, on every path.

use crate::delivery::DeliveryScope;
use crate::dispatch::try_catch;
use crate::error::Raise;
use crate::finally::finally;
use crate::handler::{HandlerEntry, HandlerTable, ResumptionTable};
use crate::resumption::ResumptionScope;
use ehm_event::{Event, EventType, TypedEvent};
use std::rc::Rc;

type Cleanup<'a> = Box<dyn FnOnce() -> Result<(), Raise> + 'a>;

struct Window {
    enabled: bool,
    types: Vec<&'static EventType>,
}

/// Builder for a protected block.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use ehm_event::{impl_event, EventHeader};
/// use ehm_runtime::{resume, throw, Protected};
///
/// #[derive(Debug, Clone)]
/// struct Retry { header: EventHeader }
/// impl_event!(Retry);
///
/// #[derive(Debug, Clone)]
/// struct GiveUp { header: EventHeader }
/// impl_event!(GiveUp);
///
/// let cleaned = Cell::new(false);
/// let outcome = Protected::new()
///     .on::<GiveUp>(|ev| Ok(format!("gave up: {}", ev.message())))
///     .on_resume::<Retry>(|_| Ok(()))
///     .finally(|| {
///         cleaned.set(true);
///         Ok(())
///     })
///     .run(|| {
///         resume(Retry { header: EventHeader::new("once more") })?;
///         throw(GiveUp { header: EventHeader::new("too many tries") })
///     })?;
///
/// assert_eq!(outcome, "gave up: too many tries");
/// assert!(cleaned.get());
/// # Ok::<(), ehm_runtime::Raise>(())
/// ```
pub struct Protected<'a, T> {
    catch: HandlerTable<'a, T>,
    resume: Vec<HandlerEntry<'static, ()>>,
    window: Option<Window>,
    cleanup: Option<Cleanup<'a>>,
}

impl<'a, T> Protected<'a, T> {
    /// Starts an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catch: HandlerTable::new(),
            resume: Vec::new(),
            window: None,
            cleanup: None,
        }
    }

    /// Adds a termination handler.
    #[must_use]
    pub fn catch(mut self, entry: HandlerEntry<'a, T>) -> Self {
        self.catch = self.catch.with(entry);
        self
    }

    /// Adds a termination handler for `E` and its descendants.
    #[must_use]
    pub fn on<E: TypedEvent>(self, body: impl Fn(&dyn Event) -> Result<T, Raise> + 'a) -> Self {
        self.catch(HandlerEntry::on::<E>(body))
    }

    /// Adds a termination handler for every event.
    #[must_use]
    pub fn on_any(self, body: impl Fn(&dyn Event) -> Result<T, Raise> + 'a) -> Self {
        self.catch(HandlerEntry::any(body))
    }

    /// Adds a resumption handler, live while the body runs.
    #[must_use]
    pub fn resume(mut self, entry: HandlerEntry<'static, ()>) -> Self {
        self.resume.push(entry);
        self
    }

    /// Adds a resumption handler for `E` and its descendants.
    #[must_use]
    pub fn on_resume<E: TypedEvent>(
        self,
        body: impl Fn(&dyn Event) -> Result<(), Raise> + 'static,
    ) -> Self {
        self.resume(HandlerEntry::on::<E>(body))
    }

    /// Enables async delivery of `types` while the body runs; an empty
    /// list enables everything.
    #[must_use]
    pub fn enable(mut self, types: impl IntoIterator<Item = &'static EventType>) -> Self {
        self.window = Some(Window {
            enabled: true,
            types: types.into_iter().collect(),
        });
        self
    }

    /// Disables async delivery of `types` while the body runs; an empty
    /// list disables everything.
    #[must_use]
    pub fn disable(mut self, types: impl IntoIterator<Item = &'static EventType>) -> Self {
        self.window = Some(Window {
            enabled: false,
            types: types.into_iter().collect(),
        });
        self
    }

    /// Sets the cleanup, run exactly once after the body and any handler.
    #[must_use]
    pub fn finally(mut self, cleanup: impl FnOnce() -> Result<(), Raise> + 'a) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Runs the block.
    ///
    /// # Errors
    ///
    /// A raise no catch handler matched, a raise from a handler, or a
    /// raise from the cleanup.
    pub fn run(self, body: impl FnOnce() -> Result<T, Raise>) -> Result<T, Raise> {
        let Self {
            catch,
            resume,
            window,
            cleanup,
        } = self;

        let guarded = move || {
            let protected_body = move || {
                let _resumption = (!resume.is_empty()).then(|| {
                    let table: ResumptionTable = resume.into_iter().collect();
                    ResumptionScope::enter(Rc::new(table))
                });
                let _window = window.map(|window| {
                    if window.enabled {
                        DeliveryScope::enable(window.types)
                    } else {
                        DeliveryScope::disable(window.types)
                    }
                });
                body()
            };
            try_catch(protected_body, &catch)
        };

        match cleanup {
            Some(cleanup) => finally(guarded, cleanup),
            None => guarded(),
        }
    }
}

impl<T> Default for Protected<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
