//! Integration tests for synchronous raise and resume.
//!
//! Covers: duplication, default termination, nested resumption order,
//! covariant matching and finally guards on every exit path.

use ehm_event::{impl_event, Event, EventHeader, RaiseKind, TypedEvent, UnhandledResume};
use ehm_runtime::{
    finally, reresume, resume, resume_bound, throw, try_catch, Context, FinallyGuard,
    HandlerEntry, HandlerTable, Protected, Raise, ResumptionScope,
};
use ehm_types::Binding;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

#[derive(Debug, Clone)]
struct Base {
    header: EventHeader,
}
impl_event!(Base);

#[derive(Debug, Clone)]
struct Derived {
    header: EventHeader,
    code: u16,
}
impl_event!(Derived: Base);

/// Escalates an unhandled resume regardless of configuration.
#[derive(Debug, Clone)]
struct Escalating {
    header: EventHeader,
}

impl TypedEvent for Escalating {
    fn static_type() -> &'static ehm_event::EventType {
        static TYPE: ehm_event::EventType =
            ehm_event::EventType::derived("Escalating", ehm_event::base_event_type);
        &TYPE
    }
}

impl Event for Escalating {
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

/// Rewrites the diagnostic reported when it ends a context.
#[derive(Debug, Clone)]
struct Annotated {
    header: EventHeader,
}

impl TypedEvent for Annotated {
    fn static_type() -> &'static ehm_event::EventType {
        static TYPE: ehm_event::EventType =
            ehm_event::EventType::derived("Annotated", ehm_event::base_event_type);
        &TYPE
    }
}

impl Event for Annotated {
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

    fn default_terminate(&self, diagnostic: String) -> String {
        format!("[annotated] {diagnostic}")
    }
}

fn base(msg: &str) -> Base {
    Base {
        header: EventHeader::new(msg),
    }
}

fn derived(msg: &str, code: u16) -> Derived {
    Derived {
        header: EventHeader::new(msg),
        code,
    }
}

/// Counts error-level log records.
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn duplicate_survives_original_after_raise() {
    let ctx = Context::new("dup-source");
    let raise = ctx
        .run(|| Ok(throw::<(), _>(derived("bad checksum", 7)).unwrap_err()))
        .expect("raise returned as value");
    let original = raise.into_event().expect("event raise");
    let copy = original.duplicate();
    drop(original);
    drop(ctx);

    assert_eq!(copy.message(), "bad checksum");
    assert_eq!(copy.raise_kind(), Some(RaiseKind::Termination));
    assert_eq!(copy.source_name(), "dup-source");
    assert_eq!(copy.downcast_ref::<Derived>().map(|d| d.code), Some(7));
}

#[test]
fn unmatched_throw_terminates_exactly_once() {
    let errors = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors)));

    let ended = tracing::subscriber::with_default(subscriber, || {
        let ctx = Context::new("doomed");
        let after = Cell::new(false);
        let ended = ctx.run(|| {
            let table: HandlerTable<'_, ()> =
                HandlerTable::new().with(HandlerEntry::on::<Derived>(|_| Ok(())));
            try_catch(|| throw(base("nobody catches this")), &table)?;
            after.set(true);
            Ok(())
        });
        assert!(!after.get(), "code after an unmatched throw must not run");
        assert!(ctx.is_closed());
        ended
    });

    let ended = ended.unwrap_err();
    assert_eq!(ended.event_type, Some("Base"));
    assert!(ended.diagnostic.contains("doomed"));
    assert!(ended.diagnostic.contains("nobody catches this"));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn escaping_event_rewrites_its_diagnostic() {
    let ended = Context::new("annotating")
        .run(|| {
            throw::<(), _>(Annotated {
                header: EventHeader::new("custom report"),
            })
        })
        .unwrap_err();
    assert!(ended.diagnostic.starts_with("[annotated] "));
    assert!(ended.diagnostic.contains("context 'annotating'"));
    assert!(ended.diagnostic.contains("custom report"));
    assert_eq!(ended.event_type, Some("Annotated"));

    let plain = Context::new("plain")
        .run(|| throw::<(), _>(base("ordinary")))
        .unwrap_err();
    assert!(!plain.diagnostic.starts_with("[annotated]"));
}

#[test]
fn nested_resumption_order_with_reresume() {
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

    let outer_log = Rc::clone(&log);
    let outer = Rc::new(HandlerTable::new().with(HandlerEntry::on::<Base>(move |_| {
        outer_log.borrow_mut().push("A");
        Ok(())
    })));

    let inner_log = Rc::clone(&log);
    let inner = Rc::new(HandlerTable::new().with(HandlerEntry::on::<Base>(move |_| {
        inner_log.borrow_mut().push("B:before");
        reresume()?;
        inner_log.borrow_mut().push("B:after");
        Ok(())
    })));

    {
        let _a = ResumptionScope::enter(outer);
        let _b = ResumptionScope::enter(inner);
        resume(base("low water")).expect("handled by both");
        log.borrow_mut().push("raise site");
    }

    assert_eq!(
        *log.borrow(),
        vec!["B:before", "A", "B:after", "raise site"]
    );
}

#[test]
fn covariant_matching_both_ways() {
    let table = HandlerTable::new().with(HandlerEntry::on::<Base>(|ev| Ok(ev.type_name())));
    assert_eq!(try_catch(|| throw(derived("d", 1)), &table).ok(), Some("Derived"));

    let narrow = HandlerTable::new().with(HandlerEntry::on::<Derived>(|_| Ok("derived")));
    let raise = try_catch(|| throw(base("b")), &narrow).unwrap_err();
    assert_eq!(raise.event().map(|e| e.type_name()), Some("Base"));

    let resumed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&resumed);
    let table = Rc::new(HandlerTable::new().with(HandlerEntry::on::<Derived>(move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    })));
    let _scope = ResumptionScope::enter(table);
    resume(base("not derived")).expect("unhandled resume is ignored");
    resume(derived("derived", 2)).expect("handled");
    assert_eq!(resumed.get(), 1);
}

#[test]
fn bound_resumption_matches_only_its_object() {
    let socket_a = 1u8;
    let socket_b = 2u8;
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

    let bound_log = Rc::clone(&log);
    let any_log = Rc::clone(&log);
    let table = Rc::new(
        HandlerTable::new()
            .with(
                HandlerEntry::on::<Base>(move |_| {
                    bound_log.borrow_mut().push("a");
                    Ok(())
                })
                .bound_to(Binding::of(&socket_a)),
            )
            .with(HandlerEntry::on::<Base>(move |_| {
                any_log.borrow_mut().push("any");
                Ok(())
            })),
    );
    let _scope = ResumptionScope::enter(table);

    resume_bound(base("for a"), Binding::of(&socket_a)).expect("bound entry handles it");
    resume_bound(base("for b"), Binding::of(&socket_b)).expect("unbound entry handles it");
    resume(base("no binding")).expect("unbound entry handles it");

    assert_eq!(*log.borrow(), vec!["a", "any", "any"]);
}

#[test]
fn catch_handler_sees_payload() {
    let code = Protected::new()
        .on::<Derived>(|ev| Ok(ev.expect_ref::<Derived>()?.code))
        .run(|| throw(derived("e", 404)))
        .expect("caught");
    assert_eq!(code, 404);
}

#[test]
fn payload_mismatch_in_handler_is_fatal() {
    let raise = Protected::<u16>::new()
        .on::<Base>(|ev| Ok(ev.expect_ref::<Derived>()?.code))
        .run(|| throw(base("plain")))
        .unwrap_err();
    assert!(raise.is_fatal());
}

#[test]
fn per_event_policy_escalates_unhandled_resume() {
    let raise = resume(Escalating {
        header: EventHeader::new("must be seen"),
    })
    .unwrap_err();
    let event = raise.event().expect("event raise");
    assert_eq!(event.type_name(), "Escalating");
    assert_eq!(event.raise_kind(), Some(RaiseKind::Termination));
    assert_eq!(event.message(), "must be seen");
}

#[test]
fn finally_runs_once_on_fall_through() {
    let runs = Cell::new(0);
    finally(
        || Ok(()),
        || {
            runs.set(runs.get() + 1);
            Ok(())
        },
    )
    .expect("no raise");
    assert_eq!(runs.get(), 1);
}

#[test]
fn finally_runs_once_when_throw_passes_through() {
    let runs = Cell::new(0);
    let table = HandlerTable::new().with(HandlerEntry::on::<Base>(|_| Ok("outer caught")));
    let outcome = try_catch(
        || {
            let _guard = FinallyGuard::new(|| {
                runs.set(runs.get() + 1);
                Ok(())
            });
            throw(base("passing through"))
        },
        &table,
    );
    assert_eq!(outcome.ok(), Some("outer caught"));
    assert_eq!(runs.get(), 1);
}

#[test]
fn finally_runs_once_after_resumption_then_unwind() {
    let runs = Rc::new(Cell::new(0));
    let handled = Rc::new(Cell::new(false));

    let flag = Rc::clone(&handled);
    let table = Rc::new(HandlerTable::new().with(HandlerEntry::on::<Base>(move |_| {
        flag.set(true);
        Ok(())
    })));
    let _scope = ResumptionScope::enter(table);

    let cleanup_runs = Rc::clone(&runs);
    let result: Result<(), Raise> = finally(
        || {
            resume(base("handled in place"))?;
            throw(derived("later unwind", 1))
        },
        move || {
            cleanup_runs.set(cleanup_runs.get() + 1);
            Ok(())
        },
    );

    assert!(handled.get());
    assert!(result.is_err());
    assert_eq!(runs.get(), 1);
}

#[test]
fn cleanup_raise_propagates_to_caller() {
    let table = HandlerTable::new().with(HandlerEntry::on::<Derived>(|ev| {
        Ok(ev.message().to_string())
    }));
    let seen = try_catch(
        || finally(|| Ok(String::from("body done")), || throw(derived("cleanup failed", 3))),
        &table,
    )
    .expect("cleanup raise caught outside");
    assert_eq!(seen, "cleanup failed");
}
