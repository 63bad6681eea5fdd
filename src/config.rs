//! Runtime configuration and its builder.

use crate::error::{Error, Result};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker thread count. `None` means one per logical CPU.
    pub num_workers: Option<usize>,
    /// Default mailbox capacity for tasks that do not override it.
    pub mailbox_capacity: usize,
    /// Capacity of each priority band in the ready queues. Bounds how many
    /// tasks can be runnable at once; admission backs off when a band is
    /// momentarily full.
    pub ready_band_capacity: usize,
    /// Whether the embedding application will pump `drive()` from the thread
    /// that builds the runtime. Required for main-affine tasks.
    pub main_thread: bool,
    /// Pin each worker to a CPU core (Linux only).
    pub pin_workers: bool,
    /// Worker stack size in bytes.
    pub stack_size: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: None,
            mailbox_capacity: 256,
            ready_band_capacity: 4096,
            main_thread: true,
            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "strela-worker".to_string(),
        }
    }
}

impl Config {
    /// Start building a config from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Check the configuration for nonsensical values.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_workers {
            if n == 0 {
                return Err(Error::config("num_workers must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_workers too large (max 1024)"));
            }
        }
        if self.mailbox_capacity == 0 {
            return Err(Error::config("mailbox_capacity must be > 0"));
        }
        if self.ready_band_capacity < 2 {
            return Err(Error::config("ready_band_capacity must be >= 2"));
        }
        Ok(())
    }

    /// The effective worker count.
    pub fn worker_threads(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the worker thread count.
    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = Some(n);
        self
    }

    /// Set the default mailbox capacity.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Set the per-band ready queue capacity.
    pub fn ready_band_capacity(mut self, capacity: usize) -> Self {
        self.config.ready_band_capacity = capacity;
        self
    }

    /// Enable or disable main-thread driving.
    pub fn main_thread(mut self, enable: bool) -> Self {
        self.config.main_thread = enable;
        self
    }

    /// Pin workers to CPU cores (Linux only).
    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    /// Set the worker stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_workers() {
        let result = Config::builder().num_workers(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_mailbox() {
        let result = Config::builder().mailbox_capacity(0).build();
        assert!(result.is_err());
    }
}
