//! Runtime construction and the global embedding surface.

use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, WorkerHandle};
use crate::task::{Actor, CallToken, Handle, TaskOptions};

/// An owned runtime instance for embedding.
///
/// The thread that constructs the runtime is registered as the main thread
/// when the config enables main-thread driving; only that thread may pump
/// [`drive`](Runtime::drive). Dropping the runtime shuts the worker pool
/// down and joins it.
pub struct Runtime {
    sched: Arc<Scheduler>,
    workers: Mutex<Vec<WorkerHandle>>,
    config: Config,
}

impl Runtime {
    /// Build a runtime and start its worker pool.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let main_thread = config.main_thread.then(|| thread::current().id());
        let sched = Scheduler::new(config.clone(), main_thread);
        let workers = sched.spawn_workers()?;
        debug!(main_thread = config.main_thread, "runtime started");

        Ok(Self {
            sched,
            workers: Mutex::new(workers),
            config,
        })
    }

    /// Create a task from an actor and admit it per its creation mode.
    ///
    /// Returns the refcounted handle plus the call token gating sends to
    /// this actor type. Fails synchronously on an invalid affinity/mode
    /// combination; the failure is fatal to this call only.
    pub fn create<A: Actor>(&self, actor: A, opts: TaskOptions) -> Result<(Handle<A>, CallToken<A>)> {
        self.sched.create(actor, opts)
    }

    /// Resume ready main-affine tasks once each; see [`Scheduler::drive`].
    pub fn drive(&self) -> Result<usize> {
        self.sched.drive()
    }

    /// The runtime's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared scheduler, for introspection.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.sched
    }

    fn join_workers(&self) {
        self.sched.begin_shutdown();
        for worker in self.workers.lock().iter_mut() {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
                trace!(worker = worker.id, "worker joined");
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.join_workers();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("workers", &self.config.worker_threads())
            .field("sched", &self.sched)
            .finish()
    }
}

// Global runtime for the simple API.
static GLOBAL_RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// Initialize the global runtime with defaults.
pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

/// Initialize the global runtime. The calling thread becomes the main
/// thread if the config enables main-thread driving.
pub fn init_with_config(config: Config) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();
    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    *runtime = Some(Arc::new(Runtime::new(config)?));
    Ok(())
}

/// Tear down the global runtime, joining its workers. Idempotent.
pub fn shutdown() {
    let taken = GLOBAL_RUNTIME.write().take();
    drop(taken);
}

pub(crate) fn current() -> Result<Arc<Runtime>> {
    GLOBAL_RUNTIME
        .read()
        .as_ref()
        .cloned()
        .ok_or(Error::NotInitialized)
}

/// Create a task on the global runtime.
pub fn create<A: Actor>(actor: A, opts: TaskOptions) -> Result<(Handle<A>, CallToken<A>)> {
    current()?.create(actor, opts)
}

/// Pump main-affine tasks on the global runtime.
pub fn drive() -> Result<usize> {
    current()?.drive()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global runtime is process-wide; tests touching it run serially by
    // taking this lock first.
    static GLOBAL_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn init_twice_fails() {
        let _guard = GLOBAL_TEST_LOCK.lock();
        shutdown();

        assert!(init().is_ok());
        assert!(matches!(init(), Err(Error::AlreadyInitialized)));

        shutdown();
    }

    #[test]
    fn global_api_without_init_fails() {
        let _guard = GLOBAL_TEST_LOCK.lock();
        shutdown();

        assert!(matches!(drive(), Err(Error::NotInitialized)));
    }

    #[test]
    fn owned_runtime_two_workers() {
        let config = Config::builder().num_workers(2).build().unwrap();
        let rt = Runtime::new(config).unwrap();
        assert_eq!(rt.config().worker_threads(), 2);
    }
}
