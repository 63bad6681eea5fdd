//! Ready sets: one lock-free band per priority.
//!
//! Selection scans bands from `Realtime` down; within a band the queue's
//! arrival order gives FIFO, which bounds the worst-case wait of any one
//! task at its own priority.

use std::sync::Arc;

use tracing::warn;

use crate::queue::{MpmcQueue, PushError};
use crate::task::core::ErasedTask;
use crate::task::Priority;
use crate::util::Backoff;

pub(crate) struct ReadyQueue {
    bands: [MpmcQueue<Arc<dyn ErasedTask>>; Priority::COUNT],
}

impl ReadyQueue {
    pub(crate) fn new(band_capacity: usize) -> Self {
        Self {
            bands: std::array::from_fn(|_| MpmcQueue::new(band_capacity)),
        }
    }

    /// Admit a task to its priority band.
    ///
    /// Bands are sized for the live-task population and each task occupies
    /// at most one entry, so a full band is transient contention; admission
    /// backs off and retries rather than dropping a runnable task.
    pub(crate) fn insert(&self, task: Arc<dyn ErasedTask>) {
        let band = &self.bands[task.priority() as usize];
        let mut backoff = Backoff::new();
        let mut task = task;
        loop {
            match band.push(task) {
                Ok(()) => return,
                Err(PushError::Full(rejected)) => {
                    task = rejected;
                    backoff.wait();
                }
                Err(PushError::Closed(rejected)) => {
                    // Ready bands are never closed.
                    warn!(task = %rejected.id(), "ready band closed; dropping admission");
                    return;
                }
            }
        }
    }

    /// Pop the highest-priority ready task, FIFO within a band.
    pub(crate) fn pop(&self) -> Option<Arc<dyn ErasedTask>> {
        self.bands.iter().find_map(|band| band.pop())
    }

    /// Approximate number of queued tasks across all bands.
    pub(crate) fn len(&self) -> usize {
        self.bands.iter().map(|band| band.len()).sum()
    }
}

impl std::fmt::Debug for ReadyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyQueue").field("len", &self.len()).finish()
    }
}
