//! Convenience re-exports for embedding applications.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::queue::{MpmcQueue, PushError};
pub use crate::runtime::{create, drive, init, init_with_config, shutdown, Runtime};
pub use crate::task::{
    Actor, Affinity, CallToken, Context, CreateMode, Handle, Message, Priority, SenderRef, Step,
    TaskId, TaskOptions, TaskState,
};
