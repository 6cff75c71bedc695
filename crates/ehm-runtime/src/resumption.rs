//! Per-context resumption handler stack.
//!
//! Entering a protected block with resumption handlers pushes its table;
//! leaving pops it. A resumption searches the stack from the top down and
//! runs the first matching entry without unwinding.
//!
//! # Masking
//!
//! While a handler found at node `i` runs, nodes `i..len` (as of the
//! invocation) are masked: a resume or reresume started inside the
//! handler continues below the matched node, so a handler never catches
//! its own re-raise. Tables the handler itself pushes sit above the mask
//! and stay searchable.
//!
//! ```text
//!   top ─► [C]   pushed inside B's handler: searchable
//!          [B]   ┐ masked while B's handler runs
//!          [A]   ┘ ... or reached by reresume
//!   bottom
//! ```

use crate::context::{self, Context};
use crate::error::EhmError;
use crate::frame::FrameId;
use crate::handler::ResumptionTable;
use ehm_event::Event;
use std::ops::Range;
use std::rc::Rc;
use tracing::error;

struct ResumptionNode {
    frame: FrameId,
    table: Rc<ResumptionTable>,
}

struct Mask {
    frame: FrameId,
    nodes: Range<usize>,
}

/// Result of a stack search.
pub(crate) struct ResumptionMatch {
    pub(crate) node: usize,
    pub(crate) entry: usize,
    pub(crate) table: Rc<ResumptionTable>,
}

#[derive(Default)]
pub(crate) struct ResumptionStack {
    nodes: Vec<ResumptionNode>,
    masks: Vec<Mask>,
}

impl ResumptionStack {
    pub(crate) fn push(&mut self, table: Rc<ResumptionTable>) -> FrameId {
        let frame = FrameId::fresh();
        self.nodes.push(ResumptionNode { frame, table });
        frame
    }

    /// Pops the node pushed under `frame`.
    ///
    /// An out-of-order pop still removes the node so the stack stays
    /// consistent, but reports the violation.
    pub(crate) fn pop(&mut self, frame: FrameId) -> Result<(), EhmError> {
        match self.nodes.last() {
            Some(top) if top.frame == frame => {
                self.nodes.pop();
                Ok(())
            }
            _ => {
                let position = self.nodes.iter().rposition(|node| node.frame == frame);
                if let Some(index) = position {
                    self.nodes.remove(index);
                }
                Err(EhmError::StackDiscipline(format!(
                    "resumption scope {frame} released out of order"
                )))
            }
        }
    }

    fn is_masked(&self, node: usize) -> bool {
        self.masks.iter().any(|mask| mask.nodes.contains(&node))
    }

    /// Finds the innermost unmasked entry matching `event`.
    pub(crate) fn find(&self, event: &dyn Event) -> Option<ResumptionMatch> {
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .filter(|(index, _)| !self.is_masked(*index))
            .find_map(|(index, node)| {
                node.table.position(event).map(|entry| ResumptionMatch {
                    node: index,
                    entry,
                    table: Rc::clone(&node.table),
                })
            })
    }

    /// Masks `node` and everything currently above it.
    pub(crate) fn mask_from(&mut self, node: usize) -> FrameId {
        let frame = FrameId::fresh();
        self.masks.push(Mask {
            frame,
            nodes: node..self.nodes.len(),
        });
        frame
    }

    pub(crate) fn unmask(&mut self, frame: FrameId) -> Result<(), EhmError> {
        match self.masks.last() {
            Some(top) if top.frame == frame => {
                self.masks.pop();
                Ok(())
            }
            _ => {
                self.masks.retain(|mask| mask.frame != frame);
                Err(EhmError::StackDiscipline(format!(
                    "resumption mask {frame} released out of order"
                )))
            }
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.nodes.len()
    }
}

/// Keeps a resumption table on the current context's stack.
///
/// The table is popped when the scope drops. Scopes must be dropped in
/// reverse order of creation, which ordinary block nesting guarantees.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ehm_event::{impl_event, EventHeader};
/// use ehm_runtime::{resume, HandlerEntry, HandlerTable, ResumptionScope};
///
/// #[derive(Debug, Clone)]
/// struct LowWater { header: EventHeader }
/// impl_event!(LowWater);
///
/// thread_local!(static REFILLS: Cell<u32> = Cell::new(0));
///
/// let table = HandlerTable::new().with(HandlerEntry::on::<LowWater>(|_| {
///     REFILLS.with(|n| n.set(n.get() + 1));
///     Ok(())
/// }));
///
/// {
///     let _scope = ResumptionScope::enter(Rc::new(table));
///     resume(LowWater { header: EventHeader::new("refill") })?;
/// }
/// assert_eq!(REFILLS.with(Cell::get), 1);
/// # Ok::<(), ehm_runtime::Raise>(())
/// ```
#[must_use = "the table is popped as soon as the scope is dropped"]
pub struct ResumptionScope {
    context: Context,
    frame: FrameId,
}

impl ResumptionScope {
    /// Pushes `table` on the current context's resumption stack.
    pub fn enter(table: Rc<ResumptionTable>) -> Self {
        Self::enter_in(&context::current(), table)
    }

    /// Pushes `table` on `context`'s resumption stack.
    pub fn enter_in(context: &Context, table: Rc<ResumptionTable>) -> Self {
        let frame = context.with_state(|state| state.resumption.push(table));
        Self {
            context: context.clone(),
            frame,
        }
    }
}

impl Drop for ResumptionScope {
    fn drop(&mut self) {
        let frame = self.frame;
        if let Err(err) = self
            .context
            .with_state(|state| state.resumption.pop(frame))
        {
            error!("context '{}': {}", self.context.name(), err);
        }
    }
}

/// Runs `body` with `table` pushed on the current resumption stack.
pub fn with_resumption<T>(table: Rc<ResumptionTable>, body: impl FnOnce() -> T) -> T {
    let _scope = ResumptionScope::enter(table);
    body()
}
