//! Event types for the EHM engine.
//!
//! An *event* is a typed condition that can be raised in two ways:
//!
//! - **termination**: unwinds to the innermost matching handler
//! - **resumption**: runs the innermost matching handler in place and
//!   returns to the raise site
//!
//! and can be delivered asynchronously to another execution context.
//! This crate defines the event side only; dispatch lives in
//! `ehm-runtime`.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ehm-types   : ContextId, Binding, ErrorCode                 │
//! │  ehm-event   : Event, EventType, EventHeader  ◄── HERE       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Type Hierarchy
//!
//! Matching is covariant: a handler for a base type catches every type
//! derived from it. The hierarchy is explicit ([`EventType`] with an
//! [`is_a`](EventType::is_a) query), declared with [`impl_event!`].
//!
//! # Example
//!
//! ```
//! use ehm_event::{impl_event, Event, EventHeader, TypedEvent};
//!
//! #[derive(Debug, Clone)]
//! struct Cancel { header: EventHeader }
//! impl_event!(Cancel);
//!
//! #[derive(Debug, Clone)]
//! struct Shutdown { header: EventHeader, grace_ms: u64 }
//! impl_event!(Shutdown: Cancel);
//!
//! let ev: Box<dyn Event> = Box::new(Shutdown {
//!     header: EventHeader::new("stopping"),
//!     grace_ms: 100,
//! });
//! assert!(ev.is::<Cancel>());
//! assert_eq!(ev.type_name(), "Shutdown");
//! ```

mod error;
mod event;
mod kind;
mod macros;

pub use error::EventError;
pub use event::{Event, EventHeader, RaiseKind, TypedEvent, UnhandledResume, UNKNOWN_SOURCE};
pub use kind::{base_event_type, EventType, ParentFn};
