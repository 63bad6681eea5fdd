//! Actor tasks and their messaging protocol.
//!
//! A task is an actor whose logic is an explicit state machine: the
//! scheduler resumes it, the actor runs one continuation (start, one
//! received message, or a post-yield slice), and the returned [`Step`]
//! decides whether it suspends at its receive point, stays runnable, or
//! terminates. Suspension is therefore a state transition and an early
//! return from the resume call, never a blocked thread.

pub(crate) mod core;
mod handle;
pub(crate) mod mailbox;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::scheduler::Scheduler;

pub use handle::{CallToken, Handle};

/// Global task id counter.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for a task, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for diagnostics.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Constructed but never admitted (deferred creation).
    Created = 0,
    /// Admitted to a ready set, waiting for a thread.
    Runnable = 1,
    /// Exactly one thread is executing the actor's logic.
    Running = 2,
    /// Parked at its receive point until a message arrives.
    Suspended = 3,
    /// The actor returned [`Step::Done`]; the mailbox is closed.
    Terminated = 4,
}

impl TaskState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Runnable,
            2 => TaskState::Running,
            3 => TaskState::Suspended,
            _ => TaskState::Terminated,
        }
    }
}

/// Selection order among runnable tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Priority {
    Realtime = 0,
    High = 1,
    Normal = 2,
    Low = 3,
    Background = 4,
}

impl Priority {
    /// Number of priority bands.
    pub const COUNT: usize = 5;
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Which thread category may execute a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Any worker thread.
    Worker,
    /// Only the registered main thread, via `drive()`.
    Main,
}

impl Default for Affinity {
    fn default() -> Self {
        Affinity::Worker
    }
}

/// When a newly created task first executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Dormant until the first message arrives.
    Deferred,
    /// Admitted runnable immediately; `on_start` runs on the next eligible
    /// thread.
    Queued,
    /// Resumed once on the creating thread before `create` returns.
    /// Incompatible with [`Affinity::Main`] unless the creating thread is
    /// the registered main thread.
    Inline,
}

impl Default for CreateMode {
    fn default() -> Self {
        CreateMode::Queued
    }
}

/// Options for task creation.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Scheduling priority band.
    pub priority: Priority,
    /// When the task first executes.
    pub mode: CreateMode,
    /// Which thread category runs the task.
    pub affinity: Affinity,
    /// Override of the config-level default mailbox capacity.
    pub mailbox_capacity: Option<usize>,
}

impl TaskOptions {
    /// Default options: normal priority, queued start, worker affinity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority band.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the creation mode.
    pub fn mode(mut self, mode: CreateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the thread affinity.
    pub fn affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Override the mailbox capacity for this task.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }
}

/// What a task does after running one continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend at the receive point until the next message.
    Await,
    /// Give up the thread but stay runnable; `on_run` is the next
    /// continuation.
    Yield,
    /// Terminate. The mailbox is closed and pending messages are dropped.
    Done,
}

/// Non-owning reference to the task that sent a message.
///
/// Carries only a registry key; liveness is checked at reply time. A reply
/// routed to a sender that no longer exists is dropped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderRef {
    id: Option<TaskId>,
}

impl SenderRef {
    /// A sender outside the runtime (no reply route).
    pub fn external() -> Self {
        Self { id: None }
    }

    pub(crate) fn task(id: TaskId) -> Self {
        Self { id: Some(id) }
    }

    /// The sending task's id, if the message originated inside the runtime.
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }
}

/// An immutable message envelope.
///
/// Created by a sender, owned solely by the mailbox after enqueue, and
/// consumed exactly once by the receiving task.
#[derive(Debug)]
pub struct Message<M> {
    sender: SenderRef,
    header: u64,
    payload: M,
}

impl<M> Message<M> {
    pub(crate) fn new(sender: SenderRef, header: u64, payload: M) -> Self {
        Self {
            sender,
            header,
            payload,
        }
    }

    /// Who sent this message.
    pub fn sender(&self) -> SenderRef {
        self.sender
    }

    /// Operation tag, interpreted by the receiving actor's protocol.
    pub fn header(&self) -> u64 {
        self.header
    }

    /// Borrow the payload.
    pub fn payload(&self) -> &M {
        &self.payload
    }

    /// Consume the envelope.
    pub fn into_payload(self) -> M {
        self.payload
    }

    /// Split the envelope into its parts.
    pub fn into_parts(self) -> (SenderRef, u64, M) {
        (self.sender, self.header, self.payload)
    }
}

/// An actor's logic, written as the continuations between its suspension
/// points.
///
/// `Msg` is the closed sum type of the actor's protocol; payloads on the
/// typed send path are checked at compile time. Exactly one continuation
/// runs per resumption, on exactly one thread at a time.
pub trait Actor: Send + Sized + 'static {
    /// The actor's message protocol.
    type Msg: Send + 'static;

    /// Runs once before the first receive point.
    fn on_start(&mut self, cx: &mut Context<'_>) -> Step {
        let _ = cx;
        Step::Await
    }

    /// Runs with the next message after a receive point. Strictly one
    /// message per resumption, in mailbox arrival order.
    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<Self::Msg>) -> Step;

    /// Runs after a voluntary [`Step::Yield`].
    fn on_run(&mut self, cx: &mut Context<'_>) -> Step {
        let _ = cx;
        Step::Await
    }
}

/// Execution context handed to an actor's continuations.
pub struct Context<'a> {
    id: TaskId,
    sched: &'a Scheduler,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

impl<'a> Context<'a> {
    pub(crate) fn new(id: TaskId, sched: &'a Scheduler) -> Self {
        Self { id, sched }
    }

    /// The running task's id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// A sender reference naming this task, for messages it originates.
    pub fn sender_ref(&self) -> SenderRef {
        SenderRef::task(self.id)
    }

    /// Send a message to another actor, gated by its call token. The
    /// receiver sees this task as the sender and may reply.
    pub fn send<B: Actor>(
        &self,
        target: &Handle<B>,
        token: &CallToken<B>,
        header: u64,
        payload: B::Msg,
    ) -> Result<()> {
        let _ = token;
        target.deliver(self.sender_ref(), header, payload)
    }

    /// Reply to the sender of a received message.
    ///
    /// The payload crosses a type-erased boundary and is recovered as the
    /// sender's own protocol type on delivery; a mismatch is a protocol
    /// violation between actor kinds and aborts the process. A reply to a
    /// sender that terminated is dropped silently.
    pub fn reply<P: Any + Send>(&self, to: SenderRef, header: u64, payload: P) -> Result<()> {
        self.sched
            .reply(self.sender_ref(), to, header, Box::new(payload))
    }
}
