//! Handles and call tokens.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;

use super::core::{ErasedTask, TaskCore};
use super::{Actor, Affinity, Message, Priority, SenderRef, TaskId, TaskState};

/// Capability to send to tasks of actor type `A`.
///
/// Tokens are only issued by the runtime at task creation, so the messaging
/// contract between two actor kinds is expressed in the type system: a call
/// site without a `CallToken<A>` cannot construct a send to an `A`.
pub struct CallToken<A: Actor> {
    _target: PhantomData<fn(A)>,
}

impl<A: Actor> CallToken<A> {
    pub(crate) fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }
}

impl<A: Actor> Clone for CallToken<A> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<A: Actor> fmt::Debug for CallToken<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallToken")
    }
}

/// Reference-counted handle to a task.
///
/// Any holder keeps the task alive; the task is destroyed only when every
/// reference is gone and it has terminated. A terminated task still answers
/// [`state`](Handle::state) but accepts no further messages.
pub struct Handle<A: Actor> {
    core: Arc<TaskCore<A>>,
}

impl<A: Actor> Handle<A> {
    pub(crate) fn new(core: Arc<TaskCore<A>>) -> Self {
        Self { core }
    }

    /// The task's id.
    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    /// The task's priority.
    pub fn priority(&self) -> Priority {
        self.core.priority()
    }

    /// The task's thread affinity.
    pub fn affinity(&self) -> Affinity {
        self.core.affinity()
    }

    /// Send a message from outside the runtime (no reply route), gated by
    /// the actor's call token.
    ///
    /// Fails with [`Error::MailboxFull`](crate::Error::MailboxFull) when the
    /// mailbox is at capacity and [`Error::MailboxClosed`](crate::Error::MailboxClosed)
    /// once the task has terminated.
    pub fn send(&self, token: &CallToken<A>, header: u64, payload: A::Msg) -> Result<()> {
        let _ = token;
        self.deliver(SenderRef::external(), header, payload)
    }

    pub(crate) fn deliver(&self, sender: SenderRef, header: u64, payload: A::Msg) -> Result<()> {
        self.core.deliver(Message::new(sender, header, payload))
    }
}

impl<A: Actor> Clone for Handle<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: Actor> fmt::Debug for Handle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
