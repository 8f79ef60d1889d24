//! Chat vocabulary shared by the hub, the bus handlers and the HTTP layer.

mod envelope;
mod events;
mod role;

pub use envelope::{Envelope, InboundEnvelope, MessageType};
pub use events::{
    ConversationCreated, LiveMessageReceived, MessageCreated, CONVERSATION_CREATED,
    LIVE_MESSAGE_RECEIVED, MESSAGE_CREATED,
};
pub use role::{ClientRole, SenderRole};
