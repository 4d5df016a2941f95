//! Configuration for batching loaders.

use std::time::Duration;

/// Default maximum number of keys per store call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default quiescence delay before a partial batch is flushed.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(1);

/// Configuration for a batching loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// A batch is flushed as soon as it holds this many distinct keys.
    pub max_batch_size: usize,
    /// A partial batch is flushed this long after its first key was enqueued.
    pub wait: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            wait: DEFAULT_WAIT,
        }
    }
}

impl LoaderConfig {
    /// Creates a new configuration with the specified batch capacity.
    ///
    /// Capacities below one are raised to one.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Creates a new configuration with the specified window delay.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}
