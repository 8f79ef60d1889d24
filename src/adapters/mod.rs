//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay to external systems:
//! - `events` - Event bus implementations (worker pool, in-memory)
//! - `websocket` - Live connections, hub and fan-out
//! - `dootask` - Task platform client

pub mod dootask;
pub mod events;
pub mod websocket;

pub use dootask::{DooTaskClient, DooTaskConfig};
pub use events::{InMemoryEventBus, WorkerPoolEventBus};
pub use websocket::{BroadcastReport, Hub, RealtimeError};
