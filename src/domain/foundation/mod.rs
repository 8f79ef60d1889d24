//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, event plumbing and error types
//! that form the vocabulary of the support relay.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{AgentId, ConversationId, ConversationUuid, MessageId, SessionId};
pub use timestamp::Timestamp;
