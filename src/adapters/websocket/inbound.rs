//! Routing of frames that peers send over their connection.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::domain::chat::{ClientRole, Envelope, InboundEnvelope, LiveMessageReceived, MessageType};
use crate::domain::foundation::{ConversationUuid, EventEnvelope, Timestamp};
use crate::ports::EventPublisher;

use super::hub::{BroadcastReport, Hub};
use super::session::Session;

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Not a valid envelope; skipped.
    Malformed,
    /// No conversation could be determined for the frame; skipped.
    Unaddressed,
    /// Fanned out. `agents` is empty for agent-authored frames.
    Routed {
        conversation: BroadcastReport,
        agents: BroadcastReport,
    },
}

/// Stamps inbound frames with their origin and fans them out.
#[derive(Clone)]
pub struct InboundRouter {
    hub: Hub,
    events: Arc<dyn EventPublisher>,
}

impl InboundRouter {
    pub fn new(hub: Hub, events: Arc<dyn EventPublisher>) -> Self {
        Self { hub, events }
    }

    /// Route one text frame received from `session`.
    ///
    /// The sender is always the session's role. Customers always talk in
    /// their bound conversation; an agent uses its binding if it has one,
    /// otherwise the `conv_uuid` carried by the frame. Customer frames are
    /// also copied to every agent, and customer chat messages are announced
    /// on the bus as [`LiveMessageReceived`].
    pub async fn handle_frame(&self, session: &Session, text: &str) -> InboundOutcome {
        let inbound: InboundEnvelope = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(session_id = %session.id(), error = %e, "Ignoring malformed frame");
                return InboundOutcome::Malformed;
            }
        };

        let Some(conversation) = resolve_conversation(session, inbound.conv_uuid.as_deref())
        else {
            tracing::debug!(session_id = %session.id(), "Ignoring frame without conversation");
            return InboundOutcome::Unaddressed;
        };

        let role = session.role();
        let kind = inbound.kind;
        let content = message_content(&inbound.data);
        let envelope = Envelope::new(conversation.as_str(), kind, role.as_sender(), inbound.data);

        let frame = match envelope.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Failed to encode frame");
                return InboundOutcome::Malformed;
            }
        };

        let conversation_report = self
            .hub
            .broadcast_to_conversation(&conversation, Arc::clone(&frame))
            .await;

        let mut agents_report = BroadcastReport::default();
        if role == ClientRole::Customer {
            agents_report = self.hub.broadcast_to_agents(frame).await;

            if kind == MessageType::Message {
                self.announce(session, conversation, content);
            }
        }

        InboundOutcome::Routed {
            conversation: conversation_report,
            agents: agents_report,
        }
    }

    fn announce(&self, session: &Session, conv_uuid: ConversationUuid, content: String) {
        let event = LiveMessageReceived {
            conv_uuid,
            content,
            received_at: Timestamp::now(),
        };

        let envelope = match EventEnvelope::from_event(&event) {
            Ok(envelope) => envelope.with_correlation_id(session.id().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode live message event");
                return;
            }
        };

        if let Err(e) = self.events.publish(envelope) {
            tracing::warn!(session_id = %session.id(), error = %e, "Live message event not published");
        }
    }
}

fn resolve_conversation(session: &Session, requested: Option<&str>) -> Option<ConversationUuid> {
    match session.role() {
        ClientRole::Customer => session.conversation().cloned(),
        ClientRole::Agent => session
            .conversation()
            .cloned()
            .or_else(|| requested.and_then(|id| ConversationUuid::new(id).ok())),
    }
}

/// Text of a chat message: `data.content` when it is a string, otherwise
/// the raw `data` JSON.
fn message_content(data: &JsonValue) -> String {
    match data.get("content").and_then(JsonValue::as_str) {
        Some(content) => content.to_string(),
        None => data.to_string(),
    }
}
