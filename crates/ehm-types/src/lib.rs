//! Core types for the EHM event engine.
//!
//! This crate holds the small, dependency-light vocabulary shared by the
//! event layer and the runtime layer.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                             │
//! │  (used by client code and generated protected blocks)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ehm-types   : ContextId, Binding, ErrorCode  ◄── HERE       │
//! │  ehm-event   : Event, EventType, EventHeader, RaiseKind      │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ehm-runtime : contexts, dispatch, async queue, guards       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ehm_types::{Binding, ContextId};
//!
//! let a = ContextId::new();
//! let b = ContextId::new();
//! assert_ne!(a, b);
//!
//! let socket = 42u32;
//! assert_eq!(Binding::of(&socket), Binding::of(&socket));
//! ```

mod error;
mod id;
mod text;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{Binding, ContextId};
pub use text::{truncate_chars, MAX_MESSAGE_CHARS, MAX_NAME_CHARS};
