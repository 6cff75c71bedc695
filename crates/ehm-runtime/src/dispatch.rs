//! Raise, resume and deliver.
//!
//! Free functions acting on the [current](crate::current) context.
//!
//! # Termination
//!
//! A termination travels as the `Err` side of a `Result`:
//!
//! ```text
//!   throw(ev)? ──► ? ──► ? ──► try_catch ──► first matching entry
//!                                   │
//!                                   └─ no match: keeps propagating
//!                                      up to Context::run, which ends
//!                                      the context
//! ```
//!
//! # Resumption
//!
//! [`resume`] searches the context's resumption stack from the top and
//! calls the matching handler in place; the raise site continues when
//! the handler returns. While a handler runs, its own table and every
//! table above it are skipped, so a re-raise from inside the handler
//! reaches the next handler down.
//!
//! # Async Delivery
//!
//! [`throw_async`] and [`resume_async`] copy the event into the target's
//! queue and return immediately. The target receives it at its next
//! [`poll`].

use crate::config;
use crate::context::{self, ActiveEvent, Context, ContextHandle};
use crate::error::{EhmError, Raise};
use crate::frame::FrameId;
use crate::handler::HandlerTable;
use crate::queue::MessageId;
use ehm_event::{Event, EventType, RaiseKind, UnhandledResume};
use ehm_types::Binding;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Marks an event as raised from `context`.
fn stamp(event: &mut dyn Event, kind: RaiseKind, context: &Context, binding: Option<Binding>) {
    let header = event.header_mut();
    header.set_raise_kind(kind);
    header.set_source(context.id(), context.name());
    header.set_binding(binding);
}

/// Records a running handler; popped on drop.
struct ActiveGuard {
    context: Context,
    frame: FrameId,
}

impl ActiveGuard {
    fn push(context: &Context, kind: RaiseKind, event: Rc<dyn Event>) -> Self {
        let frame = FrameId::fresh();
        context.with_state(|state| state.active.push(ActiveEvent { frame, kind, event }));
        Self {
            context: context.clone(),
            frame,
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let frame = self.frame;
        let in_order = self.context.with_state(|state| {
            if state.active.last().map(|active| active.frame) == Some(frame) {
                state.active.pop();
                true
            } else {
                state.active.retain(|active| active.frame != frame);
                false
            }
        });
        if !in_order {
            error!(
                "context '{}': handler {} finished out of order",
                self.context.name(),
                frame
            );
        }
    }
}

/// Masks part of the resumption stack while a handler runs.
struct MaskGuard {
    context: Context,
    frame: FrameId,
}

impl MaskGuard {
    fn push(context: &Context, node: usize) -> Self {
        let frame = context.with_state(|state| state.resumption.mask_from(node));
        Self {
            context: context.clone(),
            frame,
        }
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        let frame = self.frame;
        if let Err(err) = self
            .context
            .with_state(|state| state.resumption.unmask(frame))
        {
            error!("context '{}': {}", self.context.name(), err);
        }
    }
}

// ── termination ─────────────────────────────────────────────────────

/// Raises `event` as a termination.
///
/// Always returns `Err`; use it as `return throw(ev)` or `throw(ev)?`.
///
/// # Errors
///
/// Always: the raised event.
pub fn throw<T, E: Event>(event: E) -> Result<T, Raise> {
    raise_termination(Box::new(event), None)
}

/// Raises `event` as a termination bound to `binding`, so only entries
/// bound to the same object (or unbound) match.
///
/// # Errors
///
/// Always: the raised event.
pub fn throw_bound<T, E: Event>(event: E, binding: Binding) -> Result<T, Raise> {
    raise_termination(Box::new(event), Some(binding))
}

fn raise_termination<T>(mut event: Box<dyn Event>, binding: Option<Binding>) -> Result<T, Raise> {
    let context = context::current();
    stamp(event.as_mut(), RaiseKind::Termination, &context, binding);
    debug!(
        "context '{}': throw {} ({})",
        context.name(),
        event.type_name(),
        event.message()
    );
    Err(Raise::Event(event))
}

/// Re-raises the event handled by the innermost running termination
/// handler. Source, message and binding are preserved.
///
/// # Errors
///
/// Always: a copy of the handled event, or
/// [`EhmError::InvalidRethrow`] outside a termination handler.
pub fn rethrow<T>() -> Result<T, Raise> {
    match current_exception() {
        Some(event) => {
            debug!("rethrow {}", event.type_name());
            Err(Raise::Event(event.duplicate()))
        }
        None => Err(Raise::Fatal(EhmError::InvalidRethrow)),
    }
}

/// Runs `body`; a termination raised inside it is offered to `table`.
///
/// The first matching entry runs with the event as its argument and its
/// result becomes the block's result. Unmatched raises and fatal errors
/// pass through unchanged.
///
/// # Errors
///
/// Any raise `table` does not handle, or a raise from the handler.
///
/// # Example
///
/// ```
/// use ehm_event::{impl_event, EventHeader};
/// use ehm_runtime::{throw, try_catch, HandlerEntry, HandlerTable};
///
/// #[derive(Debug, Clone)]
/// struct NotFound { header: EventHeader }
/// impl_event!(NotFound);
///
/// let table = HandlerTable::new().with(HandlerEntry::on::<NotFound>(|ev| {
///     Ok(format!("fallback after: {}", ev.message()))
/// }));
///
/// let value = try_catch(
///     || throw(NotFound { header: EventHeader::new("no such key") }),
///     &table,
/// )?;
/// assert_eq!(value, "fallback after: no such key");
/// # Ok::<(), ehm_runtime::Raise>(())
/// ```
pub fn try_catch<T>(
    body: impl FnOnce() -> Result<T, Raise>,
    table: &HandlerTable<'_, T>,
) -> Result<T, Raise> {
    match body() {
        Err(Raise::Event(event)) => catch(table, event),
        other => other,
    }
}

fn catch<T>(table: &HandlerTable<'_, T>, event: Box<dyn Event>) -> Result<T, Raise> {
    let Some(entry) = table.find(event.as_ref()) else {
        return Err(Raise::Event(event));
    };
    let context = context::current();
    debug!(
        "context '{}': caught {} from '{}'",
        context.name(),
        event.type_name(),
        event.source_name()
    );
    let event: Rc<dyn Event> = Rc::from(event);
    let _active = ActiveGuard::push(&context, RaiseKind::Termination, Rc::clone(&event));
    entry.invoke(event.as_ref())
}

// ── resumption ──────────────────────────────────────────────────────

/// Raises `event` as a resumption.
///
/// The innermost matching resumption handler runs in place, then control
/// returns here. With no match, the unhandled-resume policy applies:
/// the event's own [`unhandled_resume`](Event::unhandled_resume)
/// override, else [`config`](crate::config)'s `resume.unhandled`.
///
/// # Errors
///
/// A termination raised by the handler, or the event itself when the
/// unhandled policy is [`UnhandledResume::Terminate`].
pub fn resume<E: Event>(event: E) -> Result<(), Raise> {
    raise_resumption(Box::new(event), None)
}

/// Like [`resume`], bound to `binding`.
///
/// # Errors
///
/// As [`resume`].
pub fn resume_bound<E: Event>(event: E, binding: Binding) -> Result<(), Raise> {
    raise_resumption(Box::new(event), Some(binding))
}

fn raise_resumption(mut event: Box<dyn Event>, binding: Option<Binding>) -> Result<(), Raise> {
    let context = context::current();
    stamp(event.as_mut(), RaiseKind::Resumption, &context, binding);
    debug!(
        "context '{}': resume {} ({})",
        context.name(),
        event.type_name(),
        event.message()
    );
    deliver_resumption(&context, Rc::from(event))
}

/// Continues the innermost running resumption's search below the
/// handler that is running it.
///
/// # Errors
///
/// As [`resume`], or [`EhmError::InvalidReresume`] outside a resumption
/// handler.
pub fn reresume() -> Result<(), Raise> {
    let context = context::current();
    let Some(event) = context.with_state(|state| state.innermost(RaiseKind::Resumption)) else {
        return Err(Raise::Fatal(EhmError::InvalidReresume));
    };
    debug!("context '{}': reresume {}", context.name(), event.type_name());
    deliver_resumption(&context, event)
}

fn deliver_resumption(context: &Context, event: Rc<dyn Event>) -> Result<(), Raise> {
    let found = context.with_state(|state| state.resumption.find(event.as_ref()));
    let Some(found) = found else {
        return unhandled_resume(context, event.as_ref());
    };
    let Some(entry) = found.table.entry(found.entry) else {
        return unhandled_resume(context, event.as_ref());
    };
    let _mask = MaskGuard::push(context, found.node);
    let _active = ActiveGuard::push(context, RaiseKind::Resumption, Rc::clone(&event));
    entry.invoke(event.as_ref())
}

fn unhandled_resume(context: &Context, event: &dyn Event) -> Result<(), Raise> {
    let config = config::current();
    let policy = event
        .unhandled_resume()
        .unwrap_or(config.resume.unhandled);
    let diagnostic = format!(
        "context '{}': unhandled resumption {} raised from '{}': {}",
        context.name(),
        event.type_name(),
        event.source_name(),
        event.message()
    );

    match policy {
        UnhandledResume::Ignore => {
            warn!("{diagnostic}");
            if config.diagnostics.stderr {
                eprintln!("{diagnostic}");
            }
            Ok(())
        }
        UnhandledResume::Terminate => {
            warn!("{diagnostic}; raising as termination");
            let mut raised = event.duplicate();
            raised.header_mut().set_raise_kind(RaiseKind::Termination);
            Err(Raise::Event(raised))
        }
    }
}

// ── async delivery ──────────────────────────────────────────────────

/// Queues `event` for delivery to `target`.
///
/// Unless `forward` is set, the event is stamped with the current
/// context as its source; forwarding keeps the recorded source. Returns
/// the queue position, or `None` if `target` has been torn down.
pub fn toss(
    mut event: Box<dyn Event>,
    target: &ContextHandle,
    kind: RaiseKind,
    forward: bool,
) -> Option<MessageId> {
    if forward {
        event.header_mut().set_raise_kind(kind);
    } else {
        let binding = event.original_binding();
        stamp(event.as_mut(), kind, &context::current(), binding);
    }

    let type_name = event.type_name();
    match target.queue().push(event, kind) {
        Ok(id) => {
            debug!(
                "queued {} {} for '{}' as {}",
                kind,
                type_name,
                target.name(),
                id
            );
            Some(id)
        }
        Err(dropped) => {
            warn!(
                "context '{}' is closed, dropping {} {} from '{}'",
                target.name(),
                kind,
                dropped.type_name(),
                dropped.source_name()
            );
            None
        }
    }
}

/// Delivers a copy of `event` to `target` as a termination.
pub fn throw_async(event: &dyn Event, target: &ContextHandle) -> Option<MessageId> {
    toss(event.duplicate(), target, RaiseKind::Termination, false)
}

/// Delivers an owned event to `target` as a termination, keeping its
/// recorded source.
pub fn throw_async_owned(event: Box<dyn Event>, target: &ContextHandle) -> Option<MessageId> {
    toss(event, target, RaiseKind::Termination, true)
}

/// Delivers a copy of `event` to `target` as a resumption.
pub fn resume_async(event: &dyn Event, target: &ContextHandle) -> Option<MessageId> {
    toss(event.duplicate(), target, RaiseKind::Resumption, false)
}

/// Forwards the event handled by the innermost running termination
/// handler to `target`, source preserved.
///
/// # Errors
///
/// [`EhmError::InvalidRethrow`] outside a termination handler.
pub fn rethrow_async(target: &ContextHandle) -> Result<Option<MessageId>, Raise> {
    let event = current_exception().ok_or(Raise::Fatal(EhmError::InvalidRethrow))?;
    Ok(toss(event.duplicate(), target, RaiseKind::Termination, true))
}

/// Forwards the event handled by the innermost running resumption
/// handler to `target`, source preserved.
///
/// # Errors
///
/// [`EhmError::InvalidReresume`] outside a resumption handler.
pub fn reresume_async(target: &ContextHandle) -> Result<Option<MessageId>, Raise> {
    let event = current_resumption().ok_or(Raise::Fatal(EhmError::InvalidReresume))?;
    Ok(toss(event.duplicate(), target, RaiseKind::Resumption, true))
}

/// Delivers pending async messages to the current context.
///
/// Only messages already queued when the call starts are considered,
/// oldest first. Hidden messages and messages whose type is disabled stay
/// queued in place. Resumptions run like [`resume`]; the first
/// termination is raised from here and ends the pass, leaving the rest
/// queued.
///
/// Returns the number of resumptions delivered.
///
/// # Errors
///
/// A delivered termination, or a termination raised by a resumption
/// handler.
pub fn poll() -> Result<usize, Raise> {
    let context = context::current();
    let queue = context.queue();
    let mark = queue.mark();
    let mut delivered = 0;

    loop {
        let window = context.with_state(|state| state.delivery.clone());
        let Some(message) = queue.take_next(mark, |ty| window.is_deliverable(ty)) else {
            break;
        };
        debug!(
            "context '{}': delivering {} {} {} from '{}'",
            context.name(),
            message.id,
            message.kind,
            message.event.type_name(),
            message.event.source_name()
        );
        match message.kind {
            RaiseKind::Resumption => {
                deliver_resumption(&context, Rc::from(message.event))?;
                delivered += 1;
            }
            RaiseKind::Termination => return Err(Raise::Event(message.event)),
        }
    }

    Ok(delivered)
}

/// Returns `true` if [`poll`] would deliver at least one message now.
#[must_use]
pub fn poll_check() -> bool {
    let context = context::current();
    let window = context.with_state(|state| state.delivery.clone());
    context
        .queue()
        .has_deliverable(|ty| window.is_deliverable(ty))
}

// ── introspection ───────────────────────────────────────────────────

/// Event handled by the innermost running termination handler.
#[must_use]
pub fn current_exception() -> Option<Rc<dyn Event>> {
    context::current().with_state(|state| state.innermost(RaiseKind::Termination))
}

/// Event handled by the innermost running resumption handler.
#[must_use]
pub fn current_resumption() -> Option<Rc<dyn Event>> {
    context::current().with_state(|state| state.innermost(RaiseKind::Resumption))
}

/// Type of the event handled by the innermost running resumption handler.
#[must_use]
pub fn top_resumption_type() -> Option<&'static EventType> {
    current_resumption().map(|event| event.event_type())
}

/// Type name of the innermost handled event of `kind`.
#[must_use]
pub fn current_event_name(kind: RaiseKind) -> Option<&'static str> {
    context::current()
        .with_state(|state| state.innermost(kind))
        .map(|event| event.type_name())
}
