//! Domain layer containing the relay's value types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, event envelope, errors)
//! - `chat` - Roles, wire envelope and the chat events published on the bus

pub mod chat;
pub mod foundation;
