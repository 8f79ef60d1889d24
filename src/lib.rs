//! Support Relay - live chat fan-out and event dispatch for customer support.
//!
//! Customers and agents hold WebSocket sessions registered in a [`Hub`],
//! which fans chat frames out to the sessions bound to a conversation and to
//! every agent. Slower side effects, such as filing a task on the external
//! task platform, run on a worker pool event bus behind the [`ports`] traits.
//!
//! [`Hub`]: adapters::websocket::Hub

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod runtime;
pub mod telemetry;

pub use runtime::{IntegrationPorts, RealtimeRuntime, RuntimeError};
