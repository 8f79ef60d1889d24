//! Conversation repository port.
//!
//! The relay does not own chat persistence. It only needs to read the
//! conversation a bus event refers to, read the source (channel) that
//! conversation came through, and remember which external task and dialog
//! were opened for it.

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, ConversationUuid, DomainError};

/// The slice of a persisted conversation the integration handlers read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub uuid: ConversationUuid,
    pub title: String,
    /// Key of the source (widget, channel) the conversation started from.
    pub source_key: String,
    /// Task created on the task platform, once linked.
    pub task_id: Option<i64>,
    /// Dialog attached to that task, once linked.
    pub dialog_id: Option<i64>,
}

/// A conversation source and where its tasks are filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_key: String,
    pub name: String,
    /// Target project; `None` means tasks are not created for this source.
    pub project_id: Option<i64>,
    pub column_id: Option<i64>,
}

/// Read/link access to conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by row id.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<ConversationRecord>, DomainError>;

    /// Find a conversation by its public id.
    ///
    /// Returns `None` if not found.
    async fn find_by_uuid(
        &self,
        uuid: &ConversationUuid,
    ) -> Result<Option<ConversationRecord>, DomainError>;

    /// Find the source a conversation came through.
    async fn find_source(&self, source_key: &str) -> Result<Option<SourceRecord>, DomainError>;

    /// Record the task and dialog opened for a conversation.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn link_task(
        &self,
        id: ConversationId,
        task_id: i64,
        dialog_id: i64,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ConversationRepository) {}
}
