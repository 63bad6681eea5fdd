//! Error types surfaced across the runtime's public API.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the runtime.
///
/// Two failures deliberately have no variant here: a payload-type mismatch
/// on reply delivery aborts the process (it indicates a protocol violation
/// between actor kinds), and a reply addressed to a task that no longer
/// exists is dropped silently (the sender may have legitimately terminated).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration, or an affinity/mode combination, is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The target mailbox or run band is at capacity. Non-fatal; the caller
    /// decides whether to retry or drop.
    #[error("mailbox full")]
    MailboxFull,

    /// The target task has terminated and accepts no further messages.
    #[error("mailbox closed")]
    MailboxClosed,

    /// The global runtime has not been initialized.
    #[error("runtime not initialized")]
    NotInitialized,

    /// The global runtime was already initialized.
    #[error("already initialized")]
    AlreadyInitialized,

    /// `drive` was invoked from a thread other than the registered main
    /// thread.
    #[error("not on the registered main thread")]
    WrongThread,

    /// A worker thread could not be spawned.
    #[error("worker spawn failed: {0}")]
    Spawn(String),
}

impl Error {
    /// Build a [`Error::Config`] from any message.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Build a [`Error::Spawn`] from any message.
    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::Spawn(msg.into())
    }
}
