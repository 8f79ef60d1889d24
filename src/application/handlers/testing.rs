//! In-memory port fakes shared by the handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::foundation::{ConversationId, ConversationUuid, DomainError, ErrorCode};
use crate::ports::{
    ConversationRecord, ConversationRepository, CreatedTask, IntegrationSettings,
    IntegrationSettingsReader, NewTask, SourceRecord, TaskPlatform, TaskPlatformError,
};

#[derive(Default)]
pub struct FakeConversations {
    pub conversations: Mutex<HashMap<u64, ConversationRecord>>,
    pub sources: Mutex<HashMap<String, SourceRecord>>,
}

impl FakeConversations {
    pub fn with_conversation(self, record: ConversationRecord) -> Self {
        self.conversations
            .lock()
            .unwrap()
            .insert(record.id.value(), record);
        self
    }

    pub fn with_source(self, record: SourceRecord) -> Self {
        self.sources
            .lock()
            .unwrap()
            .insert(record.source_key.clone(), record);
        self
    }

    pub fn get(&self, id: u64) -> Option<ConversationRecord> {
        self.conversations.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ConversationRepository for FakeConversations {
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<ConversationRecord>, DomainError> {
        Ok(self.get(id.value()))
    }

    async fn find_by_uuid(
        &self,
        uuid: &ConversationUuid,
    ) -> Result<Option<ConversationRecord>, DomainError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .values()
            .find(|c| &c.uuid == uuid)
            .cloned())
    }

    async fn find_source(&self, source_key: &str) -> Result<Option<SourceRecord>, DomainError> {
        Ok(self.sources.lock().unwrap().get(source_key).cloned())
    }

    async fn link_task(
        &self,
        id: ConversationId,
        task_id: i64,
        dialog_id: i64,
    ) -> Result<(), DomainError> {
        let mut conversations = self.conversations.lock().unwrap();
        let record = conversations
            .get_mut(&id.value())
            .ok_or_else(|| DomainError::new(ErrorCode::ConversationNotFound, "missing"))?;
        record.task_id = Some(task_id);
        record.dialog_id = Some(dialog_id);
        Ok(())
    }
}

pub struct FixedSettings(pub IntegrationSettings);

impl FixedSettings {
    pub fn new(create_task: bool, bot_token: &str) -> Self {
        Self(IntegrationSettings {
            create_task,
            bot_token: SecretString::new(bot_token.to_string()),
        })
    }
}

#[async_trait]
impl IntegrationSettingsReader for FixedSettings {
    async fn load(&self) -> Result<IntegrationSettings, DomainError> {
        Ok(self.0.clone())
    }
}

/// Records every call and answers with fixed ids.
#[derive(Default)]
pub struct FakeTaskPlatform {
    pub created: Mutex<Vec<NewTask>>,
    pub messages: Mutex<Vec<(i64, String)>>,
    pub fail_create: bool,
}

#[async_trait]
impl TaskPlatform for FakeTaskPlatform {
    async fn create_task(
        &self,
        task: &NewTask,
        _token: &SecretString,
    ) -> Result<CreatedTask, TaskPlatformError> {
        if self.fail_create {
            return Err(TaskPlatformError::Rejected("project archived".to_string()));
        }
        self.created.lock().unwrap().push(task.clone());
        Ok(CreatedTask { task_id: 501 })
    }

    async fn open_task_dialog(
        &self,
        task_id: i64,
        _token: &SecretString,
    ) -> Result<i64, TaskPlatformError> {
        Ok(task_id + 1000)
    }

    async fn send_dialog_message(
        &self,
        dialog_id: i64,
        text: &str,
        _token: &SecretString,
    ) -> Result<(), TaskPlatformError> {
        self.messages
            .lock()
            .unwrap()
            .push((dialog_id, text.to_string()));
        Ok(())
    }
}

pub fn conversation(id: u64, uuid: &str, dialog_id: Option<i64>) -> ConversationRecord {
    ConversationRecord {
        id: ConversationId::new(id),
        uuid: ConversationUuid::new(uuid).unwrap(),
        title: "Billing question".to_string(),
        source_key: "web".to_string(),
        task_id: dialog_id.map(|_| 501),
        dialog_id,
    }
}

pub fn source(project_id: Option<i64>) -> SourceRecord {
    SourceRecord {
        source_key: "web".to_string(),
        name: "Website".to_string(),
        project_id,
        column_id: Some(4),
    }
}
