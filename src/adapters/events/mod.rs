//! Event bus adapters.
//!
//! Adapters implement the event publishing and subscribing ports:
//!
//! - `WorkerPoolEventBus` - Bounded queue drained by a pool of Tokio workers
//! - `InMemoryEventBus` - Recording bus for tests

mod in_memory;
mod worker_pool;

pub use in_memory::InMemoryEventBus;
pub use worker_pool::WorkerPoolEventBus;
