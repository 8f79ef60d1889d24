//! In-memory event bus for tests.
//!
//! Records every published event and runs subscribed handlers inline on the
//! publisher's task, so assertions can be made right after the call returns.
//! Not meant for production: `publish` awaits nothing and a slow handler
//! would block its caller.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::EventEnvelope;
use crate::ports::{EventBusError, EventHandler, EventPublisher, EventSubscriber};

/// In-memory event bus for testing.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// dispatcher_using(bus.clone()).conversation_created(id).await;
///
/// assert!(bus.has_event("conversation.created"));
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all published events.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Checks if a specific event type was published.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    fn record(&self, event: &EventEnvelope) {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    /// Records the event only. Handlers run through `publish_sync`.
    fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        self.record(&event);
        Ok(())
    }

    async fn publish_sync(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        self.record(&event);

        for handler in self.handlers_for(&event.event_type) {
            handler
                .handle(event.clone())
                .await
                .map_err(|source| EventBusError::Handler {
                    handler: handler.name(),
                    source,
                })?;
        }

        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}
