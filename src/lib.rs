//! strela: a cooperative actor runtime on a lock-free MPMC core.
//!
//! Actor tasks own a bounded lock-free mailbox, run on a fixed pool of
//! worker threads (or pinned to the embedding application's main thread),
//! and communicate exclusively by asynchronous message passing. The same
//! queue that carries messages also distributes ready tasks across threads.
//!
//! # Quick start
//!
//! ```no_run
//! use strela::prelude::*;
//!
//! struct Greeter;
//!
//! impl Actor for Greeter {
//!     type Msg = String;
//!
//!     fn on_message(&mut self, _cx: &mut Context<'_>, msg: Message<String>) -> Step {
//!         println!("hello, {}", msg.payload());
//!         Step::Await
//!     }
//! }
//!
//! strela::init().unwrap();
//! let (greeter, token) = strela::create(Greeter, TaskOptions::new()).unwrap();
//! greeter.send(&token, 0, "world".to_string()).unwrap();
//! strela::shutdown();
//! ```
//!
//! # Model
//!
//! - One thread executes a given task at a time; suspension happens only at
//!   the task's own receive point (or a voluntary yield), never by
//!   preemption.
//! - Messages from one sender to one receiver arrive in send order; there is
//!   no ordering across senders.
//! - Sends to a terminated task fail with [`Error::MailboxClosed`]; a full
//!   mailbox fails with [`Error::MailboxFull`] and the caller picks retry or
//!   drop.
//! - Sends are gated by a per-actor-type [`CallToken`], so the messaging
//!   contract between actor kinds is checked at compile time.

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod diag;
pub mod error;
pub mod queue;
pub mod prelude;
pub mod runtime;
pub mod scheduler;
pub mod task;
pub mod util;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use runtime::{create, drive, init, init_with_config, shutdown, Runtime};
pub use task::{
    Actor, Affinity, CallToken, Context, CreateMode, Handle, Message, Priority, SenderRef, Step,
    TaskId, TaskOptions, TaskState,
};

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct Counter {
        hits: Arc<AtomicUsize>,
    }

    impl Actor for Counter {
        type Msg = u64;

        fn on_message(&mut self, _cx: &mut Context<'_>, msg: Message<u64>) -> Step {
            self.hits.fetch_add(*msg.payload() as usize, Ordering::SeqCst);
            Step::Await
        }
    }

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            std::thread::yield_now();
        }
        cond()
    }

    #[test]
    fn messages_reach_a_worker_task() {
        let rt = Runtime::new(Config::builder().num_workers(2).build().unwrap()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let (counter, token) = rt
            .create(Counter { hits: Arc::clone(&hits) }, TaskOptions::new())
            .unwrap();

        for _ in 0..10 {
            counter.send(&token, 0, 1).unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || {
            hits.load(Ordering::SeqCst) == 10
        }));
    }
}
