//! Task state machine and resume path.

use std::any::Any;
use std::sync::atomic::{fence, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::error::Result;
use crate::scheduler::Scheduler;

use super::mailbox::Mailbox;
use super::{Actor, Affinity, Context, Message, Priority, SenderRef, Step, TaskId, TaskState};

/// Which continuation runs on the next resumption: the actor's captured
/// "where it left off".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// `on_start` has not run yet.
    Fresh,
    /// Parked at the receive point; next message feeds `on_message`.
    AtReceive,
    /// Yielded voluntarily; `on_run` is next.
    Yielded,
}

/// Outcome of one resumption, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resumption {
    /// Still runnable: re-admit to the ready set.
    Again,
    /// Suspended (or the entry was stale); nothing to do.
    Idle,
    /// Reached `Terminated`.
    Done,
}

/// The scheduler-facing view of a task, independent of its actor type.
pub(crate) trait ErasedTask: Send + Sync {
    fn id(&self) -> TaskId;
    fn priority(&self) -> Priority;
    fn affinity(&self) -> Affinity;
    fn state(&self) -> TaskState;

    /// Run one continuation of the actor's state machine.
    fn resume(&self, sched: &Scheduler) -> Resumption;

    /// Deliver a reply whose payload was type-erased at the sender.
    ///
    /// Recovers the payload as this task's protocol type; a mismatch is a
    /// protocol violation between actor kinds and aborts the process.
    fn deliver_erased(
        &self,
        sender: SenderRef,
        header: u64,
        payload: Box<dyn Any + Send>,
    ) -> Result<()>;
}

struct ActorSlot<A> {
    actor: A,
    phase: Phase,
}

/// Shared core of one task. Reference-counted: the scheduler's ready sets,
/// in-flight handles, and reply routes all keep it alive; it is destroyed
/// only once every reference is gone.
pub(crate) struct TaskCore<A: Actor> {
    id: TaskId,
    priority: Priority,
    affinity: Affinity,
    state: AtomicU8,
    mailbox: Mailbox<A::Msg>,
    /// Exclusive actor state. Uncontended by construction: the state machine
    /// admits a task to at most one ready set entry, so at most one thread
    /// resumes it at a time.
    slot: Mutex<ActorSlot<A>>,
    sched: Weak<Scheduler>,
    self_ref: Weak<TaskCore<A>>,
}

impl<A: Actor> TaskCore<A> {
    pub(crate) fn new(
        actor: A,
        priority: Priority,
        affinity: Affinity,
        mailbox_capacity: usize,
        sched: &Arc<Scheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            id: TaskId::next(),
            priority,
            affinity,
            state: AtomicU8::new(TaskState::Created as u8),
            mailbox: Mailbox::new(mailbox_capacity),
            slot: Mutex::new(ActorSlot {
                actor,
                phase: Phase::Fresh,
            }),
            sched: Arc::downgrade(sched),
            self_ref: self_ref.clone(),
        })
    }

    pub(crate) fn erased(&self) -> Option<Arc<dyn ErasedTask>> {
        self.self_ref
            .upgrade()
            .map(|core| -> Arc<dyn ErasedTask> { core })
    }

    /// Enqueue a message and make the task runnable if it was parked.
    pub(crate) fn deliver(&self, msg: Message<A::Msg>) -> Result<()> {
        self.mailbox.push(msg)?;
        // Pairs with the fence on the suspend path: either this thread sees
        // Suspended and admits, or the suspending thread sees the message.
        // Without it both sides can read stale values (push here vs. the
        // state load below, Suspended store there vs. its emptiness check)
        // and the message is stranded.
        fence(Ordering::SeqCst);
        self.wake();
        Ok(())
    }

    /// Transition a parked (or never-started) task to runnable and admit it.
    /// The CAS makes the winner unique, so a task is queued at most once.
    fn wake(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);
            match TaskState::from_u8(state) {
                TaskState::Suspended | TaskState::Created => {
                    if self
                        .state
                        .compare_exchange(
                            state,
                            TaskState::Runnable as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.admit();
                        return;
                    }
                }
                // A running or already-admitted task observes the mailbox
                // before it suspends; a terminated one rejected the push.
                _ => return,
            }
        }
    }

    fn admit(&self) {
        if let (Some(sched), Some(task)) = (self.sched.upgrade(), self.erased()) {
            sched.admit(task);
        }
    }

    /// Force the Created -> Runnable transition at creation time.
    pub(crate) fn mark_runnable(&self) -> bool {
        self.state
            .compare_exchange(
                TaskState::Created as u8,
                TaskState::Runnable as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn terminate(&self, sched: &Scheduler) {
        // Close before publishing Terminated: a sender that observes the
        // terminated state must get Closed, never an accepted message that
        // the drain then drops.
        self.mailbox.close();
        self.mailbox.drain();
        self.state
            .store(TaskState::Terminated as u8, Ordering::Release);
        sched.deregister(self.id);
        trace!(task = %self.id, "terminated");
    }
}

impl<A: Actor> ErasedTask for TaskCore<A> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn resume(&self, sched: &Scheduler) -> Resumption {
        // Claim execution. A stale ready entry (task already terminated or
        // re-resumed elsewhere) fails the CAS and is dropped.
        if self
            .state
            .compare_exchange(
                TaskState::Runnable as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Resumption::Idle;
        }

        let mut cx = Context::new(self.id, sched);
        let mut slot = self.slot.lock();

        let step = match slot.phase {
            Phase::Fresh => {
                slot.phase = Phase::AtReceive;
                slot.actor.on_start(&mut cx)
            }
            Phase::Yielded => {
                slot.phase = Phase::AtReceive;
                slot.actor.on_run(&mut cx)
            }
            Phase::AtReceive => match self.mailbox.pop() {
                Some(msg) => slot.actor.on_message(&mut cx, msg),
                // Spurious wakeup: fall back to the receive point.
                None => Step::Await,
            },
        };

        if step == Step::Yield {
            slot.phase = Phase::Yielded;
        }
        drop(slot);

        match step {
            Step::Await => {
                self.state
                    .store(TaskState::Suspended as u8, Ordering::Release);
                // Pairs with the fence in deliver.
                fence(Ordering::SeqCst);
                // A message may have landed between the pop and the store;
                // whoever wins this CAS re-admits exactly once.
                if !self.mailbox.is_empty()
                    && self
                        .state
                        .compare_exchange(
                            TaskState::Suspended as u8,
                            TaskState::Runnable as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    return Resumption::Again;
                }
                Resumption::Idle
            }
            Step::Yield => {
                self.state
                    .store(TaskState::Runnable as u8, Ordering::Release);
                Resumption::Again
            }
            Step::Done => {
                self.terminate(sched);
                Resumption::Done
            }
        }
    }

    fn deliver_erased(
        &self,
        sender: SenderRef,
        header: u64,
        payload: Box<dyn Any + Send>,
    ) -> Result<()> {
        match payload.downcast::<A::Msg>() {
            Ok(payload) => self.deliver(Message::new(sender, header, *payload)),
            Err(_) => {
                // Protocol violation between actor kinds: the sender routed
                // a payload this task's protocol cannot represent. There is
                // no sane partial-state recovery.
                error!(
                    task = %self.id,
                    header,
                    "payload type mismatch on delivery; aborting"
                );
                std::process::abort();
            }
        }
    }
}

impl<A: Actor> std::fmt::Debug for TaskCore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("affinity", &self.affinity)
            .field("state", &self.state())
            .finish()
    }
}
