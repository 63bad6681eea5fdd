//! Bounded lock-free multi-producer/multi-consumer queue.
//!
//! This queue is the runtime's single cross-thread primitive: it carries
//! messages into task mailboxes and ready tasks into the scheduler's run
//! bands. It never blocks; a full or closed queue is reported to the caller,
//! whose policy it is to retry or drop.

pub mod mpmc;
pub mod registry;

pub use mpmc::{MpmcQueue, PushError};
pub use registry::instance;
