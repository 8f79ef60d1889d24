//! NotifyTaskDialogHandler - relays customer messages into the task dialog.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::domain::chat::{
    LiveMessageReceived, MessageCreated, SenderRole, LIVE_MESSAGE_RECEIVED, MESSAGE_CREATED,
};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{
    ConversationRecord, ConversationRepository, EventHandler, IntegrationSettingsReader,
    TaskPlatform,
};

/// Handles `message.created` and `live_message.received` events.
///
/// Only customer messages are relayed, and only for conversations that
/// already have a linked dialog. An empty bot token disables relaying.
pub struct NotifyTaskDialogHandler {
    conversations: Arc<dyn ConversationRepository>,
    settings: Arc<dyn IntegrationSettingsReader>,
    tasks: Arc<dyn TaskPlatform>,
}

/// Event types this handler subscribes to.
pub const NOTIFY_TASK_DIALOG_EVENTS: [&str; 2] = [MESSAGE_CREATED, LIVE_MESSAGE_RECEIVED];

impl NotifyTaskDialogHandler {
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

    /// Resolve the conversation and text of a customer message, or `None`
    /// when the event is not something to relay.
    async fn customer_message(
        &self,
        event: &EventEnvelope,
    ) -> Result<Option<(ConversationRecord, String)>, DomainError> {
        match event.event_type.as_str() {
            MESSAGE_CREATED => {
                let message: MessageCreated = event.payload_as()?;
                if message.sender != SenderRole::Customer {
                    return Ok(None);
                }
                let conversation = self
                    .conversations
                    .find_by_id(message.conversation_id)
                    .await?
                    .ok_or_else(|| not_found(message.conversation_id.to_string()))?;
                Ok(Some((conversation, message.content)))
            }
            LIVE_MESSAGE_RECEIVED => {
                let message: LiveMessageReceived = event.payload_as()?;
                let conversation = self
                    .conversations
                    .find_by_uuid(&message.conv_uuid)
                    .await?
                    .ok_or_else(|| not_found(message.conv_uuid.to_string()))?;
                Ok(Some((conversation, message.content)))
            }
            _ => Ok(None),
        }
    }
}

fn not_found(conversation: String) -> DomainError {
    DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found")
        .with_detail("conversation", conversation)
}

/// Line posted into the dialog for one customer message.
pub fn dialog_text(title: &str, content: &str) -> String {
    format!("[{title}] new message:\n{content}")
}

#[async_trait]
impl EventHandler for NotifyTaskDialogHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let Some((conversation, content)) = self.customer_message(&event).await? else {
            return Ok(());
        };

        let Some(dialog_id) = conversation.dialog_id.filter(|id| *id > 0) else {
            debug!(conversation_id = %conversation.id, "No task dialog linked; skipping");
            return Ok(());
        };

        let settings = self.settings.load().await?;
        if settings.bot_token.expose_secret().is_empty() {
            debug!("Bot token not configured; skipping dialog notification");
            return Ok(());
        }

        self.tasks
            .send_dialog_message(
                dialog_id,
                &dialog_text(&conversation.title, &content),
                &settings.bot_token,
            )
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "NotifyTaskDialogHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::testing::{
        conversation, FakeConversations, FakeTaskPlatform, FixedSettings,
    };
    use crate::domain::foundation::{ConversationId, ConversationUuid, MessageId, Timestamp};

    fn message_created(conversation_id: u64, sender: SenderRole) -> EventEnvelope {
        EventEnvelope::from_event(&MessageCreated {
            message_id: MessageId::new(1),
            conversation_id: ConversationId::new(conversation_id),
            content: "Where is my invoice?".to_string(),
            sender,
            message_type: "text".to_string(),
            created_at: Timestamp::now(),
        })
        .unwrap()
    }

    fn live_message(uuid: &str) -> EventEnvelope {
        EventEnvelope::from_event(&LiveMessageReceived {
            conv_uuid: ConversationUuid::new(uuid).unwrap(),
            content: "hello?".to_string(),
            received_at: Timestamp::now(),
        })
        .unwrap()
    }

    fn setup(
        dialog_id: Option<i64>,
        token: &str,
    ) -> (NotifyTaskDialogHandler, Arc<FakeTaskPlatform>) {
        let conversations = Arc::new(
            FakeConversations::default().with_conversation(conversation(7, "c-7", dialog_id)),
        );
        let tasks = Arc::new(FakeTaskPlatform::default());
        let handler = NotifyTaskDialogHandler::new(
            conversations,
            Arc::new(FixedSettings::new(true, token)),
            tasks.clone(),
        );
        (handler, tasks)
    }

    #[test]
    fn dialog_text_format() {
        assert_eq!(dialog_text("Billing", "hi"), "[Billing] new message:\nhi");
    }

    #[tokio::test]
    async fn relays_customer_message() {
        let (handler, tasks) = setup(Some(29), "bot");

        handler
            .handle(message_created(7, SenderRole::Customer))
            .await
            .unwrap();

        let messages = tasks.messages.lock().unwrap().clone();
        assert_eq!(
            messages,
            vec![(29, "[Billing question] new message:\nWhere is my invoice?".to_string())]
        );
    }

    #[tokio::test]
    async fn relays_live_message_by_uuid() {
        let (handler, tasks) = setup(Some(29), "bot");

        handler.handle(live_message("c-7")).await.unwrap();

        assert_eq!(tasks.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ignores_agent_messages() {
        let (handler, tasks) = setup(Some(29), "bot");

        handler
            .handle(message_created(7, SenderRole::Agent))
            .await
            .unwrap();

        assert!(tasks.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_conversation_without_dialog() {
        let (handler, tasks) = setup(None, "bot");

        handler
            .handle(message_created(7, SenderRole::Customer))
            .await
            .unwrap();

        assert!(tasks.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_when_bot_token_empty() {
        let (handler, tasks) = setup(Some(29), "");

        handler
            .handle(message_created(7, SenderRole::Customer))
            .await
            .unwrap();

        assert!(tasks.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_an_error() {
        let (handler, _tasks) = setup(Some(29), "bot");

        let err = handler.handle(live_message("c-404")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ConversationNotFound);
    }
}
