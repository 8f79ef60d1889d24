//! CreateSupportTaskHandler - files a task for every new conversation.
//!
//! Listens for `conversation.created` and, when the integration is enabled
//! and the conversation's source is mapped to a project:
//! 1. Creates a task named after the source and conversation title
//! 2. Opens the task's dialog
//! 3. Links both ids to the conversation so later messages can be relayed

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::chat::ConversationCreated;
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{
    ConversationRepository, EventHandler, IntegrationSettingsReader, NewTask, TaskPlatform,
};

/// Handles `conversation.created` events.
pub struct CreateSupportTaskHandler {
    conversations: Arc<dyn ConversationRepository>,
    settings: Arc<dyn IntegrationSettingsReader>,
    tasks: Arc<dyn TaskPlatform>,
}

impl CreateSupportTaskHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        settings: Arc<dyn IntegrationSettingsReader>,
        tasks: Arc<dyn TaskPlatform>,
    ) -> Self {
        Self {
            conversations,
            settings,
            tasks,
        }
    }
}

#[async_trait]
impl EventHandler for CreateSupportTaskHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload: ConversationCreated = event.payload_as()?;
        let conversation_id = payload.conversation_id;

        let settings = self.settings.load().await?;
        if !settings.create_task {
            debug!(conversation_id = %conversation_id, "Task creation disabled; skipping");
            return Ok(());
        }

        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found")
                    .with_detail("conversation_id", conversation_id.to_string())
            })?;

        let source = self
            .conversations
            .find_source(&conversation.source_key)
            .await?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::SourceNotFound, "Conversation source not found")
                    .with_detail("source_key", conversation.source_key.clone())
            })?;

        let Some(project_id) = source.project_id else {
            debug!(source_key = %source.source_key, "Source has no project; skipping");
            return Ok(());
        };

        let task = NewTask {
            name: format!("[{}] - {}", source.name, conversation.title),
            content: format!("Source: {}", source.name),
            project_id,
            column_id: source.column_id,
        };

        let created = self.tasks.create_task(&task, &settings.bot_token).await?;
        let dialog_id = self
            .tasks
            .open_task_dialog(created.task_id, &settings.bot_token)
            .await?;

        self.conversations
            .link_task(conversation_id, created.task_id, dialog_id)
            .await?;

        info!(
            conversation_id = %conversation_id,
            task_id = created.task_id,
            dialog_id,
            "Support task linked to conversation"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "CreateSupportTaskHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{
        conversation, source, FakeConversations, FakeTaskPlatform, FixedSettings,
    };
    use crate::domain::foundation::ConversationId;

    fn created_event(id: u64) -> EventEnvelope {
        EventEnvelope::from_event(&ConversationCreated::new(ConversationId::new(id))).unwrap()
    }

    fn handler(
        conversations: Arc<FakeConversations>,
        settings: FixedSettings,
        tasks: Arc<FakeTaskPlatform>,
    ) -> CreateSupportTaskHandler {
        CreateSupportTaskHandler::new(conversations, Arc::new(settings), tasks)
    }

    #[tokio::test]
    async fn creates_task_and_links_dialog() {
        let conversations = Arc::new(
            FakeConversations::default()
                .with_conversation(conversation(7, "c-7", None))
                .with_source(source(Some(3))),
        );
        let tasks = Arc::new(FakeTaskPlatform::default());
        let handler = handler(
            conversations.clone(),
            FixedSettings::new(true, "bot"),
            tasks.clone(),
        );

        handler.handle(created_event(7)).await.unwrap();

        let created = tasks.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "[Website] - Billing question");
        assert_eq!(created[0].content, "Source: Website");
        assert_eq!(created[0].project_id, 3);
        assert_eq!(created[0].column_id, Some(4));

        let linked = conversations.get(7).unwrap();
        assert_eq!(linked.task_id, Some(501));
        assert_eq!(linked.dialog_id, Some(1501));
    }

    #[tokio::test]
    async fn skips_when_integration_disabled() {
        let conversations = Arc::new(
            FakeConversations::default()
                .with_conversation(conversation(7, "c-7", None))
                .with_source(source(Some(3))),
        );
        let tasks = Arc::new(FakeTaskPlatform::default());
        let handler = handler(conversations, FixedSettings::new(false, "bot"), tasks.clone());

        handler.handle(created_event(7)).await.unwrap();

        assert!(tasks.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_sources_without_project() {
        let conversations = Arc::new(
            FakeConversations::default()
                .with_conversation(conversation(7, "c-7", None))
                .with_source(source(None)),
        );
        let tasks = Arc::new(FakeTaskPlatform::default());
        let handler = handler(conversations, FixedSettings::new(true, "bot"), tasks.clone());

        handler.handle(created_event(7)).await.unwrap();

        assert!(tasks.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_conversation_is_an_error() {
        let tasks = Arc::new(FakeTaskPlatform::default());
        let handler = handler(
            Arc::new(FakeConversations::default()),
            FixedSettings::new(true, "bot"),
            tasks,
        );

        let err = handler.handle(created_event(99)).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ConversationNotFound);
    }

    #[tokio::test]
    async fn platform_failure_leaves_conversation_unlinked() {
        let conversations = Arc::new(
            FakeConversations::default()
                .with_conversation(conversation(7, "c-7", None))
                .with_source(source(Some(3))),
        );
        let tasks = Arc::new(FakeTaskPlatform {
            fail_create: true,
            ..FakeTaskPlatform::default()
        });
        let handler = handler(conversations.clone(), FixedSettings::new(true, "bot"), tasks);

        let err = handler.handle(created_event(7)).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::TaskPlatformError);
        assert_eq!(conversations.get(7).unwrap().task_id, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let handler = handler(
            Arc::new(FakeConversations::default()),
            FixedSettings::new(true, "bot"),
            Arc::new(FakeTaskPlatform::default()),
        );

        let err = handler
            .handle(EventEnvelope::new("conversation.created", serde_json::json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidEventPayload);
    }
}
