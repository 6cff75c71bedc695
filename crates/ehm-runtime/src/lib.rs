//! EHM Runtime - the event delivery engine.
//!
//! Raises, catches, resumes and asynchronously delivers typed events
//! between cooperatively scheduled execution contexts.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ehm-types   : ContextId, Binding, ErrorCode                 │
//! │  ehm-event   : Event, EventType, EventHeader, impl_event!    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  context     : Context, ContextHandle, current()             │
//! │  dispatch    : throw / resume / poll / async toss            │
//! │  handler     : HandlerEntry, HandlerTable                    │
//! │  resumption  : per-context resumption stack                  │
//! │  delivery    : enable/disable windows                        │
//! │  queue       : per-context async FIFO                        │
//! │  finally     : FinallyGuard                                  │
//! │  protect     : Protected block builder                       │
//! │  config      : EhmConfig, ConfigLoader                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Raise Semantics
//!
//! | Operation | Handler found | Control afterwards |
//! |-----------|---------------|--------------------|
//! | [`throw`] | innermost matching [`try_catch`] table | continues after the protected block |
//! | [`resume`] | innermost matching [`ResumptionScope`] table | returns to the raise site |
//! | [`throw_async`] | at the target's next [`poll`], as `throw` | sender continues at once |
//! | [`resume_async`] | at the target's next [`poll`], as `resume` | sender continues at once |
//!
//! A termination nobody handles ends the context: [`Context::run`] reports
//! the diagnostic and returns [`Terminated`].
//!
//! # Example
//!
//! ```
//! use ehm_event::{impl_event, EventHeader};
//! use ehm_runtime::{poll, throw_async, Context, Protected};
//!
//! #[derive(Debug, Clone)]
//! struct Shutdown { header: EventHeader }
//! impl_event!(Shutdown);
//!
//! let worker = Context::new("worker");
//! let handle = worker.handle();
//!
//! // Another context (here: the thread's root) asks the worker to stop.
//! throw_async(&Shutdown { header: EventHeader::new("closing") }, &handle);
//!
//! let stopped_by = worker.run(|| {
//!     Protected::new()
//!         .on::<Shutdown>(|ev| Ok(ev.source_name().to_string()))
//!         .run(|| {
//!             poll()?;
//!             Ok(String::from("still running"))
//!         })
//! });
//! assert_eq!(stopped_by.ok(), Some(ehm_runtime::current().name().to_string()));
//! ```

pub mod config;
mod context;
mod delivery;
mod dispatch;
mod error;
mod finally;
mod frame;
mod handler;
mod protect;
mod queue;
mod resumption;

pub use context::{current, is_alive, lookup, Context, ContextHandle, Entered};
pub use delivery::{
    is_deliverable, with_delivery_disabled, with_delivery_enabled, DeliveryScope,
};
pub use dispatch::{
    current_event_name, current_exception, current_resumption, poll, poll_check, reresume,
    reresume_async, resume, resume_async, resume_bound, rethrow, rethrow_async, throw,
    throw_async, throw_async_owned, throw_bound, top_resumption_type, toss, try_catch,
};
pub use error::{EhmError, Raise, Terminated};
pub use finally::{finally, FinallyGuard};
pub use handler::{HandlerEntry, HandlerFn, HandlerTable, ResumptionTable};
pub use protect::Protected;
pub use queue::{MessageId, PendingMessage};
pub use resumption::{with_resumption, ResumptionScope};
