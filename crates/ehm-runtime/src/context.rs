//! Execution contexts.
//!
//! A context is one independently scheduled execution: a coroutine, task
//! or thread. Each owns the stacks the dispatch engine consults
//! (resumption handlers, delivery windows, active handlers) and an async
//! queue other contexts deliver into.
//!
//! # Handles
//!
//! | Type | Thread | Use |
//! |------|--------|-----|
//! | [`Context`] | owning thread only | run code, own local stacks |
//! | [`ContextHandle`] | `Send + Sync` | address async deliveries |
//!
//! # Scheduler Interface
//!
//! The engine does not schedule. A scheduler makes a context current on
//! the running thread with [`Context::run`] (or [`Context::enter`] for
//! manual switching); code that raises, resumes or polls acts on the
//! current context. A thread that never entered a context gets an
//! implicit root context named after the thread.
//!
//! # Teardown
//!
//! Dropping the last [`Context`] clone, or calling [`Context::close`],
//! closes the queue and discards whatever is still pending. Late sends are
//! dropped with a warning.

use crate::config;
use crate::delivery::DeliveryStack;
use crate::error::{Raise, Terminated};
use crate::frame::FrameId;
use crate::queue::{AsyncQueue, MessageId, PendingMessage};
use crate::resumption::ResumptionStack;
use ehm_event::{Event, RaiseKind};
use ehm_types::{truncate_chars, ContextId, MAX_NAME_CHARS};
use parking_lot::RwLock;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, info, warn};

/// State every thread may touch: identity and the async queue.
pub(crate) struct ContextShared {
    id: ContextId,
    name: String,
    queue: AsyncQueue,
}

impl ContextShared {
    fn teardown(&self) {
        registry_remove(self.id);
        let Some(discarded) = self.queue.close() else {
            return;
        };
        if discarded == 0 {
            debug!("context '{}' ({}) closed", self.name, self.id);
        } else if config::current().queue.warn_on_discard {
            warn!(
                "context '{}' ({}) closed with {} undelivered message(s)",
                self.name, self.id, discarded
            );
        } else {
            info!(
                "context '{}' ({}) closed, discarded {} message(s)",
                self.name, self.id, discarded
            );
        }
    }
}

/// A handler currently executing on this context.
pub(crate) struct ActiveEvent {
    pub(crate) frame: FrameId,
    pub(crate) kind: RaiseKind,
    pub(crate) event: Rc<dyn Event>,
}

/// Stacks only the owning context touches.
#[derive(Default)]
pub(crate) struct LocalState {
    pub(crate) resumption: ResumptionStack,
    pub(crate) delivery: DeliveryStack,
    pub(crate) active: Vec<ActiveEvent>,
}

impl LocalState {
    /// Innermost active handler of `kind`.
    pub(crate) fn innermost(&self, kind: RaiseKind) -> Option<Rc<dyn Event>> {
        self.active
            .iter()
            .rev()
            .find(|active| active.kind == kind)
            .map(|active| Rc::clone(&active.event))
    }
}

struct ContextInner {
    shared: Arc<ContextShared>,
    state: RefCell<LocalState>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

/// An execution context, owned by the thread that runs it.
///
/// Cloning yields another reference to the same context.
///
/// # Example
///
/// ```
/// use ehm_event::{impl_event, EventHeader};
/// use ehm_runtime::{throw, Context};
///
/// #[derive(Debug, Clone)]
/// struct Abort { header: EventHeader }
/// impl_event!(Abort);
///
/// let worker = Context::new("worker");
/// let ended = worker
///     .run(|| -> Result<(), _> { throw(Abort { header: EventHeader::new("giving up") }) })
///     .unwrap_err();
/// assert_eq!(ended.event_type, Some("Abort"));
/// assert!(worker.is_closed());
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Creates a context. Names longer than 99 characters are truncated.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let shared = Arc::new(ContextShared {
            id: ContextId::new(),
            name: truncate_chars(name, MAX_NAME_CHARS),
            queue: AsyncQueue::new(),
        });
        registry_insert(&shared);
        debug!("context '{}' ({}) created", shared.name, shared.id);
        Self {
            inner: Rc::new(ContextInner {
                shared,
                state: RefCell::new(LocalState::default()),
            }),
        }
    }

    /// Returns the context's id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.shared.id
    }

    /// Returns the context's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    /// Returns a thread-safe handle for async delivery.
    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            shared: Arc::clone(&self.inner.shared),
        }
    }

    /// Returns `true` if this context is current on this thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        Rc::ptr_eq(&current().inner, &self.inner)
    }

    /// Returns `true` once the context has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shared.queue.is_closed()
    }

    /// Makes this context current until the returned guard drops.
    ///
    /// Guards nest; dropping them out of order is reported.
    pub fn enter(&self) -> Entered {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        Entered {
            context: self.clone(),
        }
    }

    /// Runs `body` with this context current.
    ///
    /// A raise escaping `body` triggers the default termination policy:
    /// an escaping event may rewrite the diagnostic through
    /// [`Event::default_terminate`], then it is logged (and printed to
    /// stderr unless disabled in [`config`](crate::config)), the context
    /// is closed and the diagnostic comes back as [`Terminated`].
    ///
    /// # Errors
    ///
    /// [`Terminated`] if a raise escaped `body`.
    pub fn run<T>(&self, body: impl FnOnce() -> Result<T, Raise>) -> Result<T, Terminated> {
        let result = {
            let _entered = self.enter();
            body()
        };
        result.map_err(|raise| self.terminate(raise))
    }

    /// Tears the context down: closes its queue and discards pending
    /// messages. Idempotent.
    pub fn close(&self) {
        self.inner.shared.teardown();
    }

    pub(crate) fn terminate(&self, raise: Raise) -> Terminated {
        let mut terminated = Terminated::new(self.id(), self.name(), &raise);
        if let Some(event) = raise.event() {
            let diagnostic = std::mem::take(&mut terminated.diagnostic);
            terminated.diagnostic = event.default_terminate(diagnostic);
        }
        error!("{}", terminated.diagnostic);
        if config::current().diagnostics.stderr {
            eprintln!("{}", terminated.diagnostic);
        }
        self.close();
        terminated
    }

    pub(crate) fn queue(&self) -> &AsyncQueue {
        &self.inner.shared.queue
    }

    /// Runs `f` on the local stacks.
    ///
    /// Never call user code from `f`; handlers may re-enter the context.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut LocalState) -> R) -> R {
        f(&mut self.inner.state.borrow_mut())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`Context::enter`].
#[must_use = "the context stops being current as soon as the guard is dropped"]
pub struct Entered {
    context: Context,
}

impl Drop for Entered {
    fn drop(&mut self) {
        let exited = CURRENT.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let position = stack
                .iter()
                .rposition(|ctx| Rc::ptr_eq(&ctx.inner, &self.context.inner));
            match position {
                Some(index) if index + 1 == stack.len() => {
                    stack.pop();
                }
                Some(index) => {
                    error!(
                        "context '{}' exited out of order",
                        self.context.name()
                    );
                    stack.remove(index);
                }
                None => error!("context '{}' exited twice", self.context.name()),
            }
        });
        if let Err(err) = exited {
            debug!(
                "context '{}' exited during thread teardown: {}",
                self.context.name(),
                err
            );
        }
    }
}

/// Thread-safe address of a context.
#[derive(Clone)]
pub struct ContextHandle {
    shared: Arc<ContextShared>,
}

impl ContextHandle {
    /// Returns the context's id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.shared.id
    }

    /// Returns the context's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns `true` until the context is torn down.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.shared.queue.is_closed()
    }

    /// Number of queued messages, hidden ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Snapshot of the queued messages in FIFO order.
    #[must_use]
    pub fn pending_messages(&self) -> Vec<PendingMessage> {
        self.shared.queue.snapshot()
    }

    /// Hides or reveals a queued message.
    ///
    /// Hidden messages keep their place but are skipped by polls until
    /// revealed. Returns `false` if the message is no longer queued.
    pub fn set_hidden(&self, id: MessageId, hidden: bool) -> bool {
        self.shared.queue.set_hidden(id, hidden)
    }

    /// Returns the first visible message after `after`, or from the front.
    #[must_use]
    pub fn next_visible(&self, after: Option<MessageId>) -> Option<MessageId> {
        self.shared.queue.next_visible(after)
    }

    pub(crate) fn queue(&self) -> &AsyncQueue {
        &self.shared.queue
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("alive", &self.is_alive())
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
    static ROOT: OnceCell<Context> = const { OnceCell::new() };
}

/// Returns the context current on this thread.
///
/// Outside any [`Context::run`] this is the thread's implicit root context.
#[must_use]
pub fn current() -> Context {
    if let Some(ctx) = CURRENT.with(|stack| stack.borrow().last().cloned()) {
        return ctx;
    }
    ROOT.with(|root| {
        root.get_or_init(|| {
            let thread = std::thread::current();
            let name = match thread.name() {
                Some(name) => name.to_string(),
                None => format!("{:?}", thread.id()),
            };
            Context::new(&name)
        })
        .clone()
    })
}

type Registry = RwLock<HashMap<ContextId, Weak<ContextShared>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn registry_insert(shared: &Arc<ContextShared>) {
    registry().write().insert(shared.id, Arc::downgrade(shared));
}

fn registry_remove(id: ContextId) {
    registry().write().remove(&id);
}

/// Finds a live context by id.
#[must_use]
pub fn lookup(id: ContextId) -> Option<ContextHandle> {
    let shared = registry().read().get(&id)?.upgrade()?;
    Some(ContextHandle { shared })
}

/// Returns `true` if the context `id` exists and has not been torn down.
#[must_use]
pub fn is_alive(id: ContextId) -> bool {
    lookup(id).is_some_and(|handle| handle.is_alive())
}
