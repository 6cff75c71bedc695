//! Per-context asynchronous delivery queue.
//!
//! The queue is the only structure shared between contexts. Senders on any
//! thread append owned event copies; the owning context removes them at its
//! poll points.
//!
//! # Ordering
//!
//! ```text
//!   push ──► [m1][m2*][m3][m4] ──► take_next
//!                 │
//!                 └─ hidden or suppressed: skipped in place, keeps position
//! ```
//!
//! Messages from one sender arrive in send order. A scan returns the first
//! message that is visible and deliverable; skipped messages stay where
//! they are and are delivered in order once they become eligible.
//!
//! # Locking
//!
//! The lock is held only for list operations. Handlers never run and
//! events are never duplicated or dropped while it is held.

use ehm_event::{Event, EventType, RaiseKind};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// Position of a message in its target's queue.
///
/// Ids grow monotonically per queue, so comparing two ids of the same
/// queue compares arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

/// An event waiting for delivery.
#[derive(Debug)]
pub(crate) struct AsyncMessage {
    pub(crate) id: MessageId,
    pub(crate) event: Box<dyn Event>,
    pub(crate) kind: RaiseKind,
    pub(crate) hidden: bool,
}

/// Snapshot of one queued message, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Queue position.
    pub id: MessageId,
    /// Type of the queued event.
    pub event_type: &'static EventType,
    /// How it will be raised on delivery.
    pub kind: RaiseKind,
    /// Whether scans currently skip it.
    pub hidden: bool,
    /// Name of the sending context.
    pub source_name: String,
}

#[derive(Debug, Default)]
struct QueueInner {
    messages: VecDeque<AsyncMessage>,
    next_id: u64,
    closed: bool,
}

impl QueueInner {
    fn position(
        &self,
        before: MessageId,
        deliverable: impl Fn(&'static EventType) -> bool,
    ) -> Option<usize> {
        self.messages
            .iter()
            .take_while(|msg| msg.id < before)
            .position(|msg| !msg.hidden && deliverable(msg.event.event_type()))
    }
}

/// FIFO of pending async messages for one context.
#[derive(Debug, Default)]
pub(crate) struct AsyncQueue {
    inner: Mutex<QueueInner>,
}

impl AsyncQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a message. A closed queue hands the event back.
    pub(crate) fn push(
        &self,
        event: Box<dyn Event>,
        kind: RaiseKind,
    ) -> Result<MessageId, Box<dyn Event>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(event);
        }
        let id = MessageId(inner.next_id);
        inner.next_id += 1;
        inner.messages.push_back(AsyncMessage {
            id,
            event,
            kind,
            hidden: false,
        });
        Ok(id)
    }

    /// Id the next pushed message will get; every queued message is older.
    pub(crate) fn mark(&self) -> MessageId {
        MessageId(self.inner.lock().next_id)
    }

    /// Removes the oldest visible, deliverable message older than `before`.
    pub(crate) fn take_next(
        &self,
        before: MessageId,
        deliverable: impl Fn(&'static EventType) -> bool,
    ) -> Option<AsyncMessage> {
        let mut inner = self.inner.lock();
        let index = inner.position(before, deliverable)?;
        inner.messages.remove(index)
    }

    /// Returns `true` if some visible message is deliverable.
    pub(crate) fn has_deliverable(
        &self,
        deliverable: impl Fn(&'static EventType) -> bool,
    ) -> bool {
        let inner = self.inner.lock();
        inner.position(MessageId(u64::MAX), deliverable).is_some()
    }

    /// Returns the first visible message after `after` (or from the front).
    pub(crate) fn next_visible(&self, after: Option<MessageId>) -> Option<MessageId> {
        let inner = self.inner.lock();
        inner
            .messages
            .iter()
            .filter(|msg| after.map_or(true, |after| msg.id > after))
            .find(|msg| !msg.hidden)
            .map(|msg| msg.id)
    }

    /// Sets the hidden flag of a queued message. Returns `false` if the
    /// message is no longer queued.
    pub(crate) fn set_hidden(&self, id: MessageId, hidden: bool) -> bool {
        let mut inner = self.inner.lock();
        match inner.messages.iter_mut().find(|msg| msg.id == id) {
            Some(msg) => {
                msg.hidden = hidden;
                true
            }
            None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<PendingMessage> {
        let inner = self.inner.lock();
        inner
            .messages
            .iter()
            .map(|msg| PendingMessage {
                id: msg.id,
                event_type: msg.event.event_type(),
                kind: msg.kind,
                hidden: msg.hidden,
                source_name: msg.event.source_name().to_string(),
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Closes the queue and discards what is left.
    ///
    /// Returns the number of discarded messages, or `None` if the queue
    /// was already closed.
    pub(crate) fn close(&self) -> Option<usize> {
        let drained: Vec<AsyncMessage> = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            inner.closed = true;
            inner.messages.drain(..).collect()
        };
        let count = drained.len();
        for msg in &drained {
            debug!(
                "discarding {} {} {} from '{}'",
                msg.id,
                msg.kind,
                msg.event.type_name(),
                msg.event.source_name()
            );
        }
        Some(count)
    }
}
