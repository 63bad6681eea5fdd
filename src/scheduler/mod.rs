//! Task admission and thread management.
//!
//! The scheduler owns one ready set per thread affinity: worker-affine tasks
//! are drained by a fixed pool of worker threads, main-affine tasks only by
//! [`drive`](Scheduler::drive), which the embedding application calls from
//! its own loop. The runtime never spawns a thread for main-affine work.

pub(crate) mod ready;
pub(crate) mod worker;

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::task::core::{ErasedTask, Resumption, TaskCore};
use crate::task::{Actor, Affinity, CallToken, CreateMode, Handle, SenderRef, TaskId, TaskOptions};

use ready::ReadyQueue;
use worker::Worker;

#[cfg(target_os = "linux")]
fn pin_to_core(core_id: usize) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id % num_cpus::get(), &mut cpuset);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpuset);
        if rc != 0 {
            debug!(core_id, "failed to pin worker to core");
        }
    }
}

pub(crate) struct WorkerHandle {
    pub(crate) id: worker::WorkerId,
    pub(crate) thread: Option<JoinHandle<()>>,
}

/// Shared scheduler state. Accessed concurrently by every worker, the main
/// thread, and any thread delivering messages.
pub struct Scheduler {
    worker_ready: ReadyQueue,
    main_ready: ReadyQueue,
    registry: RwLock<HashMap<TaskId, Weak<dyn ErasedTask>>>,
    unparkers: RwLock<Vec<thread::Thread>>,
    next_unpark: AtomicUsize,
    shutdown: AtomicBool,
    main_thread: Option<ThreadId>,
    config: Config,
}

impl Scheduler {
    pub(crate) fn new(config: Config, main_thread: Option<ThreadId>) -> Arc<Self> {
        Arc::new(Self {
            worker_ready: ReadyQueue::new(config.ready_band_capacity),
            main_ready: ReadyQueue::new(config.ready_band_capacity),
            registry: RwLock::new(HashMap::new()),
            unparkers: RwLock::new(Vec::new()),
            next_unpark: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            main_thread,
            config,
        })
    }

    /// Spawn the worker pool. Called once, before any task is created.
    pub(crate) fn spawn_workers(self: &Arc<Self>) -> Result<Vec<WorkerHandle>> {
        let count = self.config.worker_threads();
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let sched = Arc::clone(self);
            let name = format!("{}-{}", self.config.thread_name_prefix, id);
            let pin = self.config.pin_workers;

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = self.config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let thread = builder
                .spawn(move || {
                    #[cfg(target_os = "linux")]
                    if pin {
                        pin_to_core(id);
                    }
                    #[cfg(not(target_os = "linux"))]
                    let _ = pin;

                    Worker::new(id).run(sched);
                })
                .map_err(|e| Error::spawn(e.to_string()))?;

            self.unparkers.write().push(thread.thread().clone());
            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        debug!(workers = count, "worker pool started");
        Ok(handles)
    }

    /// Allocate, register, and admit a new task.
    pub(crate) fn create<A: Actor>(
        self: &Arc<Self>,
        actor: A,
        opts: TaskOptions,
    ) -> Result<(Handle<A>, CallToken<A>)> {
        if opts.affinity == Affinity::Main && self.main_thread.is_none() {
            return Err(Error::config(
                "main-affine task on a runtime without a main thread",
            ));
        }
        if opts.affinity == Affinity::Main
            && opts.mode == CreateMode::Inline
            && Some(thread::current().id()) != self.main_thread
        {
            return Err(Error::config(
                "inline start of a main-affine task off the main thread",
            ));
        }

        let capacity = opts
            .mailbox_capacity
            .unwrap_or(self.config.mailbox_capacity);
        let core = TaskCore::new(actor, opts.priority, opts.affinity, capacity, self);

        let weak = Arc::downgrade(&core);
        let weak: Weak<dyn ErasedTask> = weak;
        self.registry.write().insert(core.id(), weak);
        trace!(task = %core.id(), ?opts.mode, ?opts.affinity, "task created");

        match opts.mode {
            CreateMode::Deferred => {}
            CreateMode::Queued => {
                if core.mark_runnable() {
                    let erased = Arc::clone(&core);
                    let erased: Arc<dyn ErasedTask> = erased;
                    self.admit(erased);
                }
            }
            CreateMode::Inline => {
                if core.mark_runnable() {
                    let erased = Arc::clone(&core);
                    let erased: Arc<dyn ErasedTask> = erased;
                    if erased.resume(self.as_ref()) == Resumption::Again {
                        self.admit(erased);
                    }
                }
            }
        }

        Ok((Handle::new(core), CallToken::new()))
    }

    /// Put a runnable task on the ready set matching its affinity.
    pub(crate) fn admit(&self, task: Arc<dyn ErasedTask>) {
        trace!(task = %task.id(), affinity = ?task.affinity(), "admitted");
        match task.affinity() {
            Affinity::Worker => {
                self.worker_ready.insert(task);
                self.unpark_one();
            }
            // Main-affine admission is polled by drive(); nothing to wake.
            Affinity::Main => self.main_ready.insert(task),
        }
    }

    pub(crate) fn next_worker_task(&self) -> Option<Arc<dyn ErasedTask>> {
        self.worker_ready.pop()
    }

    /// Resume ready main-affine tasks, once each. Returns how many ran.
    ///
    /// Invoked cooperatively by the embedding application, once per
    /// iteration of its own loop, on the registered main thread.
    pub fn drive(&self) -> Result<usize> {
        if Some(thread::current().id()) != self.main_thread {
            return Err(Error::WrongThread);
        }

        // Bound this pass by the backlog at entry so a task that stays
        // runnable cannot monopolize the embedder's loop iteration.
        let budget = self.main_ready.len();
        let mut resumed = 0;
        for _ in 0..budget {
            let Some(task) = self.main_ready.pop() else {
                break;
            };
            resumed += 1;
            if task.resume(self) == Resumption::Again {
                self.admit(task);
            }
        }
        Ok(resumed)
    }

    /// Route a type-erased reply to the task named by `to`.
    ///
    /// A missing or terminated target drops the reply silently: the sender
    /// of the original request may have legitimately gone away. A full
    /// mailbox on a live target is surfaced for the caller's retry policy.
    pub(crate) fn reply(
        &self,
        from: SenderRef,
        to: SenderRef,
        header: u64,
        payload: Box<dyn Any + Send>,
    ) -> Result<()> {
        let Some(id) = to.id() else {
            trace!("reply to external sender dropped");
            return Ok(());
        };
        let target = self.registry.read().get(&id).and_then(Weak::upgrade);
        match target {
            Some(task) => match task.deliver_erased(from, header, payload) {
                Err(Error::MailboxClosed) => {
                    trace!(task = %id, "reply to terminated task dropped");
                    Ok(())
                }
                other => other,
            },
            None => {
                trace!(task = %id, "reply to vanished task dropped");
                Ok(())
            }
        }
    }

    pub(crate) fn deregister(&self, id: TaskId) {
        self.registry.write().remove(&id);
    }

    /// Number of live (registered) tasks.
    pub fn live_tasks(&self) -> usize {
        self.registry.read().len()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for unparker in self.unparkers.read().iter() {
            unparker.unpark();
        }
    }

    fn unpark_one(&self) {
        let unparkers = self.unparkers.read();
        if unparkers.is_empty() {
            return;
        }
        let idx = self.next_unpark.fetch_add(1, Ordering::Relaxed) % unparkers.len();
        unparkers[idx].unpark();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("live_tasks", &self.live_tasks())
            .field("worker_ready", &self.worker_ready)
            .field("main_ready", &self.main_ready)
            .finish()
    }
}
