//! Facts published on the event bus after chat state changes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, ConversationUuid, DomainEvent, MessageId, Timestamp,
};

use super::SenderRole;

pub const CONVERSATION_CREATED: &str = "conversation.created";
pub const MESSAGE_CREATED: &str = "message.created";
pub const LIVE_MESSAGE_RECEIVED: &str = "live_message.received";

/// A customer conversation was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCreated {
    pub conversation_id: ConversationId,
    pub created_at: Timestamp,
}

impl ConversationCreated {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            created_at: Timestamp::now(),
        }
    }
}

impl DomainEvent for ConversationCreated {
    fn event_type(&self) -> &'static str {
        CONVERSATION_CREATED
    }

    fn occurred_at(&self) -> Timestamp {
        self.created_at
    }
}

/// A chat message was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreated {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub content: String,
    pub sender: SenderRole,
    /// Content kind as stored by the persistence layer ("text", "image", ...).
    pub message_type: String,
    pub created_at: Timestamp,
}

impl DomainEvent for MessageCreated {
    fn event_type(&self) -> &'static str {
        MESSAGE_CREATED
    }

    fn occurred_at(&self) -> Timestamp {
        self.created_at
    }
}

/// A customer typed a message straight into a live connection.
///
/// Unlike [`MessageCreated`] nothing was persisted, so the conversation is
/// only known by its public id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessageReceived {
    pub conv_uuid: ConversationUuid,
    pub content: String,
    pub received_at: Timestamp,
}

impl DomainEvent for LiveMessageReceived {
    fn event_type(&self) -> &'static str {
        LIVE_MESSAGE_RECEIVED
    }

    fn occurred_at(&self) -> Timestamp {
        self.received_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventEnvelope;

    #[test]
    fn conversation_created_wraps_into_routable_envelope() {
        let event = ConversationCreated::new(ConversationId::new(42));
        let envelope = EventEnvelope::from_event(&event).unwrap();

        assert_eq!(envelope.event_type, CONVERSATION_CREATED);
        assert_eq!(envelope.payload["conversation_id"], 42);
    }

    #[test]
    fn message_created_payload_roundtrips() {
        let event = MessageCreated {
            message_id: MessageId::new(9),
            conversation_id: ConversationId::new(42),
            content: "hello".to_string(),
            sender: SenderRole::Customer,
            message_type: "text".to_string(),
            created_at: Timestamp::now(),
        };

        let envelope = EventEnvelope::from_event(&event).unwrap();
        let decoded: MessageCreated = envelope.payload_as().unwrap();

        assert_eq!(envelope.event_type, MESSAGE_CREATED);
        assert_eq!(decoded, event);
    }
}
