//! EventPublisher port - Interface for publishing events.
//!
//! Request handlers publish after they have committed state; the publisher
//! decides when (and on which task) the subscribed handlers run.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Errors returned to a publisher.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The bus has been stopped; nothing will be dispatched any more.
    #[error("event bus is closed")]
    Closed,

    /// The bounded queue has no free slot. The event was dropped.
    #[error("event queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// `start` was called on a bus that is already running.
    #[error("event bus is already running")]
    AlreadyStarted,

    /// `start` was called after `stop`; the bus is single-shot.
    #[error("event bus was stopped and cannot be restarted")]
    AlreadyStopped,

    /// A handler failed during synchronous dispatch.
    #[error("handler {handler} failed: {source}")]
    Handler {
        handler: &'static str,
        #[source]
        source: DomainError,
    },
}

/// Port for publishing events.
///
/// Delivery is best-effort: an event accepted by `publish` is handed to every
/// handler subscribed at dispatch time, but a rejected event is simply lost.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Queue an event for asynchronous dispatch.
    ///
    /// Never blocks. Fails with [`EventBusError::QueueFull`] when the queue
    /// is saturated and [`EventBusError::Closed`] after shutdown.
    fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError>;

    /// Dispatch an event on the caller's task, bypassing the queue.
    ///
    /// Handlers run in registration order; the first failure stops the
    /// remaining handlers and is returned. No subscriber is not an error.
    async fn publish_sync(&self, event: EventEnvelope) -> Result<(), EventBusError>;
}
