//! Scope-exit cleanup.
//!
//! [`FinallyGuard`] runs a cleanup exactly once when its scope ends,
//! whether the scope completes, a termination propagates through it, or
//! a panic unwinds it.
//!
//! Cleanup can itself raise. The guard is therefore two-phase:
//!
//! | Exit | Cleanup runs in | A cleanup raise |
//! |------|-----------------|-----------------|
//! | [`FinallyGuard::finish`] | `finish` | is returned to the caller |
//! | drop (early `?`, panic) | `Drop` | is logged at error level |
//!
//! [`finally`] wraps both phases around a closure.

use crate::error::Raise;
use tracing::{error, warn};

/// Runs a cleanup exactly once when the scope ends.
///
/// Only [`finish`](Self::finish) (or [`finally`], which calls it)
/// propagates a raise from the cleanup. If the guard is dropped instead,
/// on an early `?` return or a panic, the cleanup still runs but its
/// raise is only logged at error level.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use ehm_runtime::FinallyGuard;
///
/// let closed = Cell::new(false);
/// let guard = FinallyGuard::new(|| {
///     closed.set(true);
///     Ok(())
/// });
/// assert!(!closed.get());
/// guard.finish()?;
/// assert!(closed.get());
/// # Ok::<(), ehm_runtime::Raise>(())
/// ```
#[must_use = "the cleanup runs immediately if the guard is not bound"]
pub struct FinallyGuard<F>
where
    F: FnOnce() -> Result<(), Raise>,
{
    cleanup: Option<F>,
}

impl<F> FinallyGuard<F>
where
    F: FnOnce() -> Result<(), Raise>,
{
    /// Arms the guard.
    pub fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    /// Runs the cleanup now and returns its result.
    ///
    /// # Errors
    ///
    /// A raise from the cleanup.
    pub fn finish(mut self) -> Result<(), Raise> {
        match self.cleanup.take() {
            Some(cleanup) => cleanup(),
            None => Ok(()),
        }
    }
}

impl<F> Drop for FinallyGuard<F>
where
    F: FnOnce() -> Result<(), Raise>,
{
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Err(raise) = cleanup() {
                error!("raise from cleanup during unwinding discarded: {raise}");
            }
        }
    }
}

/// Runs `body`, then `cleanup`, exactly once on every exit path.
///
/// If both raise, the cleanup's raise wins and the body's is logged.
///
/// # Errors
///
/// The cleanup's raise, else the body's.
pub fn finally<T>(
    body: impl FnOnce() -> Result<T, Raise>,
    cleanup: impl FnOnce() -> Result<(), Raise>,
) -> Result<T, Raise> {
    let guard = FinallyGuard::new(cleanup);
    let result = body();
    match (result, guard.finish()) {
        (result, Ok(())) => result,
        (Ok(_), Err(raise)) => Err(raise),
        (Err(replaced), Err(raise)) => {
            warn!("cleanup raise replaces in-flight raise: {replaced}");
            Err(raise)
        }
    }
}
