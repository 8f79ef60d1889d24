//! LiveDispatcher - what request handlers call after they commit chat state.
//!
//! Every committed change is pushed to the live connections that care about
//! it and then announced on the event bus for slower side effects. Neither
//! step can undo the commit: delivery failures are reported, never raised.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::adapters::websocket::{BroadcastReport, Hub};
use crate::domain::chat::{ConversationCreated, Envelope, MessageCreated, MessageType, SenderRole};
use crate::domain::foundation::{ConversationId, ConversationUuid, DomainError, EventEnvelope};
use crate::ports::EventPublisher;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub broadcast: BroadcastReport,
    /// Whether the bus accepted the event.
    pub event_published: bool,
}

/// Broadcast-then-publish facade over the hub and the bus.
#[derive(Clone)]
pub struct LiveDispatcher {
    hub: Hub,
    events: Arc<dyn EventPublisher>,
}

impl LiveDispatcher {
    pub fn new(hub: Hub, events: Arc<dyn EventPublisher>) -> Self {
        Self { hub, events }
    }

    /// A customer opened a conversation.
    ///
    /// Agents get a `new_conversation` notice carrying `conversation`, then
    /// `conversation.created` is published.
    pub async fn conversation_created(
        &self,
        conversation_id: ConversationId,
        conversation: JsonValue,
    ) -> Result<Dispatched, DomainError> {
        let frame = Envelope::system(MessageType::NewConversation, conversation).to_frame()?;
        let broadcast = self.hub.broadcast_to_agents(frame).await;

        let event = EventEnvelope::from_event(&ConversationCreated::new(conversation_id))?;
        let event_published = self.publish(event);

        Ok(Dispatched {
            broadcast,
            event_published,
        })
    }

    /// A chat message was stored.
    ///
    /// Customer messages are announced to every agent as `new_message`;
    /// agent messages are delivered to the customer's conversation as
    /// `message`. Either way `message.created` is published.
    pub async fn message_created(
        &self,
        conv_uuid: &ConversationUuid,
        message: MessageCreated,
        data: JsonValue,
    ) -> Result<Dispatched, DomainError> {
        let broadcast = match message.sender {
            SenderRole::Customer => {
                let envelope = Envelope::new(
                    conv_uuid.as_str(),
                    MessageType::NewMessage,
                    SenderRole::Customer,
                    data,
                );
                self.hub.broadcast_to_agents(envelope.to_frame()?).await
            }
            sender => {
                let envelope = Envelope::new(conv_uuid.as_str(), MessageType::Message, sender, data);
                self.hub
                    .broadcast_to_conversation(conv_uuid, envelope.to_frame()?)
                    .await
            }
        };

        let event = EventEnvelope::from_event(&message)?
            .with_correlation_id(conv_uuid.as_str());
        let event_published = self.publish(event);

        Ok(Dispatched {
            broadcast,
            event_published,
        })
    }

    /// Push an arbitrary envelope to the customer sessions of a
    /// conversation. Nothing is published.
    pub async fn notify_conversation(
        &self,
        conv_uuid: &ConversationUuid,
        kind: MessageType,
        sender: SenderRole,
        data: JsonValue,
    ) -> Result<BroadcastReport, DomainError> {
        let frame = Envelope::new(conv_uuid.as_str(), kind, sender, data).to_frame()?;
        Ok(self.hub.broadcast_to_conversation(conv_uuid, frame).await)
    }

    fn publish(&self, event: EventEnvelope) -> bool {
        let event_type = event.event_type.clone();
        match self.events.publish(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(event_type = %event_type, error = %e, "Event not published");
                false
            }
        }
    }
}
