//! Live connection configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::websocket::{PumpConfig, DEFAULT_MAILBOX_CAPACITY};

use super::error::ValidationError;

/// Per-connection limits for WebSocket sessions
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Frames buffered per session before it is treated as unresponsive
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Longest silence tolerated from a peer
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    /// Deadline for a single outbound write
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,

    /// Largest inbound message, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl RealtimeConfig {
    /// Timing and size limits for the connection pumps
    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            max_message_size: self.max_message_size,
        }
    }

    /// Validate live connection configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.mailbox_capacity == 0 {
            return Err(ValidationError::MustBePositive("realtime.mailbox_capacity"));
        }
        if self.max_message_size == 0 {
            return Err(ValidationError::MustBePositive("realtime.max_message_size"));
        }
        if self.write_wait_secs == 0 {
            return Err(ValidationError::MustBePositive("realtime.write_wait_secs"));
        }
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::MustBePositive("realtime.ping_interval_secs"));
        }
        // The peer's pong must arrive before the read deadline expires.
        if self.ping_interval_secs >= self.pong_wait_secs {
            return Err(ValidationError::PingNotBeforePongWait);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            ping_interval_secs: default_ping_interval(),
            pong_wait_secs: default_pong_wait(),
            write_wait_secs: default_write_wait(),
            max_message_size: default_max_message_size(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_ping_interval() -> u64 {
    54
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    512
}
