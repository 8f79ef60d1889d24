//! DooTask task platform adapter.
//!
//! Files one task per support conversation and relays customer messages
//! into the task's dialog through the bot webhook.

mod client;

pub use client::{DooTaskClient, DooTaskConfig};
