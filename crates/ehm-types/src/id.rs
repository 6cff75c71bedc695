//! Identifier types for EHM.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for an execution context (coroutine or task).
///
/// Events remember the context that raised them through a `ContextId`.
/// The id is a plain value: holding one never keeps the context alive,
/// so an event may outlive the context that raised it.
///
/// # Example
///
/// ```
/// use ehm_types::ContextId;
///
/// let ctx = ContextId::new();
/// assert_eq!(ctx, ctx.clone());
/// assert!(ctx.to_string().starts_with("ctx:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

#[allow(clippy::new_without_default)] // a default id would not name any live context
impl ContextId {
    /// Creates a new [`ContextId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}

/// Identity of the object instance an event was raised on behalf of.
///
/// Handlers may be restricted to events raised for one particular
/// object (for example one socket out of many). The binding is the
/// address of that object, compared by equality only and never
/// dereferenced.
///
/// # Example
///
/// ```
/// use ehm_types::Binding;
///
/// let first = String::from("a");
/// let second = String::from("a");
///
/// assert_eq!(Binding::of(&first), Binding::of(&first));
/// assert_ne!(Binding::of(&first), Binding::of(&second));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding(usize);

impl Binding {
    /// Binding for the object behind `target`.
    #[must_use]
    pub fn of<T: ?Sized>(target: &T) -> Self {
        Self(target as *const T as *const () as usize)
    }

    /// Binding from a raw token, for objects identified by number.
    #[must_use]
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw token.
    #[must_use]
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bind:{:#x}", self.0)
    }
}
