//! EventSubscriber port - Interface for subscribing to events.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for processing events.
///
/// A failing handler never prevents its siblings from seeing the same event
/// during asynchronous dispatch; errors are only logged there.
///
/// # Example
///
/// ```ignore
/// struct AuditTrail;
///
/// #[async_trait]
/// impl EventHandler for AuditTrail {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         tracing::info!(event_type = %event.event_type, "seen");
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "AuditTrail"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to events.
///
/// Subscriptions are additive; there is no unsubscribe. A handler added
/// after an event was dispatched does not see that event.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe handler to a specific event type.
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    /// Subscribe the same handler instance to several event types.
    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        for event_type in event_types {
            self.subscribe(event_type, Arc::clone(&handler));
        }
    }
}

/// Combined trait for event bus implementations.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
