//! Frame tokens for LIFO scope stacks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one pushed node on a context-local stack.
///
/// Guards hold the token of the node they pushed and hand it back on
/// drop; a mismatch means scopes were exited out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameId(u64);

impl FrameId {
    /// Allocates a process-unique token.
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}
