//! Quota-bounded frame dispatch.
//!
//! A [`FrameDispatcher`] receives sensor notifications, acquires a frame from
//! each, numbers the successful ones and hands them to a user callback on a
//! worker pool. The (quota + 1)-th successful acquisition fires the
//! [`crate::Completion`] signal instead of being dispatched.

mod dispatcher;
mod outcome;
mod stats;

use serde::Deserialize;

use crate::error::IngestError;

pub use dispatcher::FrameDispatcher;
pub use outcome::{DispatchOutcome, DropReason};
pub use stats::DispatchStats;

/// Configuration for a [`FrameDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of frames delivered to the callback before finishing.
    pub quota: u32,
    /// Callback worker threads.
    pub workers: usize,
    /// Frames that may wait for a free worker before delivery blocks.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            quota: 30,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: 16,
        }
    }
}

impl DispatchConfig {
    /// Create a config delivering `quota` frames with default pool sizing.
    pub fn new(quota: u32) -> Self {
        Self {
            quota,
            ..Self::default()
        }
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.workers == 0 {
            return Err(IngestError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(IngestError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
