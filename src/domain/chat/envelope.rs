//! Wire envelope exchanged over a live connection.
//!
//! ```json
//! {"conv_uuid": "c-1", "data": {...}, "sender": "agent", "type": "message"}
//! ```
//!
//! `data` is opaque: the relay never looks inside it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::SenderRole;

/// Tag describing what an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Regular chat message.
    Message,
    /// Out-of-band notice (e.g. conversation transferred).
    Notification,
    /// A customer opened a new conversation.
    NewConversation,
    /// A new message landed in some conversation.
    NewMessage,
    AgentOnlineStatus,
    AgentTypingStatus,
    CustomerTypingStatus,
}

/// One frame of the live protocol.
///
/// Transient: built per send, never persisted by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Conversation the frame belongs to. Empty for agent-wide notices.
    #[serde(default)]
    pub conv_uuid: String,

    #[serde(default)]
    pub data: JsonValue,

    pub sender: SenderRole,

    #[serde(rename = "type")]
    pub kind: MessageType,
}

impl Envelope {
    pub fn new(
        conv_uuid: impl Into<String>,
        kind: MessageType,
        sender: SenderRole,
        data: JsonValue,
    ) -> Self {
        Self {
            conv_uuid: conv_uuid.into(),
            data,
            sender,
            kind,
        }
    }

    /// A system-authored notice that is not tied to a conversation.
    pub fn system(kind: MessageType, data: JsonValue) -> Self {
        Self::new(String::new(), kind, SenderRole::System, data)
    }

    /// Serializes the envelope into the shared frame handed to mailboxes.
    pub fn to_frame(&self) -> Result<Arc<str>, serde_json::Error> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}

/// Frame sent by a peer.
///
/// Peers may omit routing fields; the server stamps `sender` and
/// `conv_uuid` from the session that received the frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub conv_uuid: Option<String>,

    #[serde(default)]
    pub data: JsonValue,

    #[serde(rename = "type")]
    pub kind: MessageType,
}
