//! Worker thread loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::task::core::Resumption;
use crate::util::Backoff;

use super::Scheduler;

pub(crate) type WorkerId = usize;

/// Per-worker counters, reported in trace output.
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub(crate) tasks_resumed: AtomicU64,
    pub(crate) parks: AtomicU64,
}

pub(crate) struct Worker {
    pub(crate) id: WorkerId,
    pub(crate) stats: Arc<WorkerStats>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId) -> Self {
        Self {
            id,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Main loop: pop the highest-priority ready task, resume it, re-admit
    /// if it stayed runnable. Idle workers escalate from spinning to parking
    /// with a timeout; admission unparks one of them.
    pub(crate) fn run(&self, sched: Arc<Scheduler>) {
        let mut backoff = Backoff::new();

        loop {
            if sched.is_shutdown() {
                break;
            }

            match sched.next_worker_task() {
                Some(task) => {
                    backoff.reset();
                    self.stats.tasks_resumed.fetch_add(1, Ordering::Relaxed);
                    if task.resume(sched.as_ref()) == Resumption::Again {
                        sched.admit(task);
                    }
                }
                None => {
                    if backoff.is_saturated() {
                        self.stats.parks.fetch_add(1, Ordering::Relaxed);
                        thread::park_timeout(Duration::from_micros(100));
                    } else {
                        backoff.wait();
                    }
                }
            }
        }

        trace!(
            worker = self.id,
            resumed = self.stats.tasks_resumed.load(Ordering::Relaxed),
            parks = self.stats.parks.load(Ordering::Relaxed),
            "worker exiting"
        );
    }
}
