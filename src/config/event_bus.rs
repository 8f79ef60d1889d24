//! Event bus configuration

use serde::Deserialize;

use super::error::ValidationError;

const MAX_WORKERS: usize = 64;

/// Worker pool sizing for asynchronous event dispatch
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Number of workers draining the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Events buffered before `publish` reports the queue as full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for handlers before cancelling them
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl EventBusConfig {
    /// Validate event bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::MustBePositive("event_bus.workers"));
        }
        if self.workers > MAX_WORKERS {
            return Err(ValidationError::TooManyWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::MustBePositive("event_bus.queue_capacity"));
        }
        if self.shutdown_grace_secs == 0 {
            return Err(ValidationError::MustBePositive("event_bus.shutdown_grace_secs"));
        }
        Ok(())
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_shutdown_grace() -> u64 {
    30
}
