//! Task platform port - the external task tracker support work is filed in.
//!
//! One conversation maps to one task, and every task carries a dialog that
//! receives a line per inbound customer message.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Request to file a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub content: String,
    pub project_id: i64,
    pub column_id: Option<i64>,
}

/// Task as created by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedTask {
    pub task_id: i64,
}

/// Errors from the task platform.
#[derive(Debug, Error)]
pub enum TaskPlatformError {
    /// The platform answered but refused the request.
    #[error("task platform rejected request: {0}")]
    Rejected(String),

    /// The platform answered with a body we could not interpret.
    #[error("unexpected task platform response: {0}")]
    InvalidResponse(String),

    #[error("task platform request timed out")]
    Timeout,

    /// Transport failure before an answer arrived.
    #[error("task platform unreachable: {0}")]
    Network(String),
}

impl From<TaskPlatformError> for DomainError {
    fn from(err: TaskPlatformError) -> Self {
        DomainError::new(ErrorCode::TaskPlatformError, err.to_string())
    }
}

/// Operations on the external task tracker.
#[async_trait]
pub trait TaskPlatform: Send + Sync {
    /// File a task and return its id.
    async fn create_task(
        &self,
        task: &NewTask,
        token: &SecretString,
    ) -> Result<CreatedTask, TaskPlatformError>;

    /// Open (or fetch) the dialog attached to a task and return its id.
    async fn open_task_dialog(
        &self,
        task_id: i64,
        token: &SecretString,
    ) -> Result<i64, TaskPlatformError>;

    /// Post a text line into a dialog as the bot.
    async fn send_dialog_message(
        &self,
        dialog_id: i64,
        text: &str,
        token: &SecretString,
    ) -> Result<(), TaskPlatformError>;
}
