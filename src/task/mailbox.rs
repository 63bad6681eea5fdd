//! Per-task mailbox over the lock-free queue.
//!
//! The mailbox is owned exclusively by its task: only the owning task
//! dequeues, while any number of threads enqueue. Closing happens once, at
//! termination, after which every enqueue fails with the closed condition.

use crate::error::Error;
use crate::queue::{MpmcQueue, PushError};

use super::Message;

pub(crate) struct Mailbox<M> {
    queue: MpmcQueue<Message<M>>,
}

impl<M: Send> Mailbox<M> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: MpmcQueue::new(capacity),
        }
    }

    pub(crate) fn push(&self, msg: Message<M>) -> Result<(), Error> {
        self.queue.push(msg).map_err(|e| match e {
            PushError::Full(_) => Error::MailboxFull,
            PushError::Closed(_) => Error::MailboxClosed,
        })
    }

    pub(crate) fn pop(&self) -> Option<Message<M>> {
        self.queue.pop()
    }

    pub(crate) fn close(&self) {
        self.queue.close();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything still queued. Called once after close.
    pub(crate) fn drain(&self) {
        while self.queue.pop().is_some() {}
    }
}
