//! DooTask client - Implementation of TaskPlatform over DooTask's HTTP API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = DooTaskConfig::new("https://tasks.example.com")
//!     .with_webhook_url("https://tasks.example.com/api/dialog/msg/sendtext")
//!     .with_timeout(Duration::from_secs(5));
//!
//! let client = DooTaskClient::new(config)?;
//! ```
//!
//! # Responses
//!
//! API endpoints answer `{"ret": 1, "msg": "...", "data": {...}}`. Any `ret`
//! other than 1 is a rejection carrying `msg`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::ports::{CreatedTask, NewTask, TaskPlatform, TaskPlatformError};

const CREATE_TASK_PATH: &str = "/api/project/task/add";
const TASK_DIALOG_PATH: &str = "/api/project/task/dialog";

/// Configuration for the DooTask client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DooTaskConfig {
    /// Base URL of the DooTask server, without trailing slash.
    pub base_url: String,
    /// Bot webhook used to post dialog messages.
    pub webhook_url: String,
    /// API version sent with webhook messages.
    pub version: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl DooTaskConfig {
    /// Creates a configuration whose webhook lives on the same server.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            webhook_url: format!("{base_url}/api/dialog/msg/sendtext"),
            base_url,
            version: String::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// DooTask HTTP client.
pub struct DooTaskClient {
    config: DooTaskConfig,
    client: Client,
}

impl DooTaskClient {
    /// Creates a client with the given configuration.
    pub fn new(config: DooTaskConfig) -> Result<Self, TaskPlatformError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TaskPlatformError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DooTaskConfig {
        &self.config
    }

    fn create_task_request(&self, task: &NewTask, token: &SecretString) -> RequestBuilder {
        let body = CreateTaskBody {
            name: &task.name,
            content: &task.content,
            owner: Vec::new(),
            assist: Vec::new(),
            project_id: task.project_id,
            column_id: task.column_id,
        };

        self.client
            .post(format!("{}{}", self.config.base_url, CREATE_TASK_PATH))
            .query(&[("token", token.expose_secret().as_str())])
            .json(&body)
    }

    fn task_dialog_request(&self, task_id: i64, token: &SecretString) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.config.base_url, TASK_DIALOG_PATH))
            .query(&[
                ("task_id", task_id.to_string().as_str()),
                ("token", token.expose_secret().as_str()),
            ])
    }

    fn dialog_message_request(
        &self,
        dialog_id: i64,
        text: &str,
        token: &SecretString,
    ) -> RequestBuilder {
        self.client.post(&self.config.webhook_url).form(&[
            ("version", self.config.version.as_str()),
            ("text", text),
            ("dialog_id", dialog_id.to_string().as_str()),
            ("token", token.expose_secret().as_str()),
        ])
    }

    /// Sends a request and returns the raw body.
    async fn send(&self, request: RequestBuilder) -> Result<String, TaskPlatformError> {
        let response = request.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(TaskPlatformError::InvalidResponse(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        Ok(body)
    }

    fn map_transport(&self, e: reqwest::Error) -> TaskPlatformError {
        if e.is_timeout() {
            TaskPlatformError::Timeout
        } else if e.is_connect() {
            TaskPlatformError::Network(format!("Connection failed: {e}"))
        } else {
            TaskPlatformError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl TaskPlatform for DooTaskClient {
    async fn create_task(
        &self,
        task: &NewTask,
        token: &SecretString,
    ) -> Result<CreatedTask, TaskPlatformError> {
        let body = self.send(self.create_task_request(task, token)).await?;
        let data = parse_api_response(&body)?;

        let task_id = int_field(&data, "id")?;
        tracing::info!(task_id, project_id = task.project_id, "DooTask task created");

        Ok(CreatedTask { task_id })
    }

    async fn open_task_dialog(
        &self,
        task_id: i64,
        token: &SecretString,
    ) -> Result<i64, TaskPlatformError> {
        let body = self.send(self.task_dialog_request(task_id, token)).await?;
        let data = parse_api_response(&body)?;

        int_field(&data, "dialog_id")
    }

    async fn send_dialog_message(
        &self,
        dialog_id: i64,
        text: &str,
        token: &SecretString,
    ) -> Result<(), TaskPlatformError> {
        let body = self
            .send(self.dialog_message_request(dialog_id, text, token))
            .await?;

        // The webhook may answer with plain text; only a JSON envelope can reject.
        if let Ok(envelope) = serde_json::from_str::<ApiResponse>(&body) {
            if envelope.ret.is_some() {
                envelope.into_data()?;
            }
        }

        tracing::debug!(dialog_id, "DooTask dialog message sent");
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateTaskBody<'a> {
    name: &'a str,
    content: &'a str,
    owner: Vec<i64>,
    assist: Vec<i64>,
    project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    column_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ret: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: JsonValue,
}

impl ApiResponse {
    fn into_data(self) -> Result<JsonValue, TaskPlatformError> {
        match self.ret {
            Some(1) => Ok(self.data),
            Some(_) => Err(TaskPlatformError::Rejected(
                self.msg.unwrap_or_else(|| "DooTask request failed".to_string()),
            )),
            None => Err(TaskPlatformError::InvalidResponse(
                "missing ret field".to_string(),
            )),
        }
    }
}

/// Decodes an API envelope and returns its `data` on success.
fn parse_api_response(body: &str) -> Result<JsonValue, TaskPlatformError> {
    let envelope: ApiResponse = serde_json::from_str(body)
        .map_err(|e| TaskPlatformError::InvalidResponse(e.to_string()))?;
    envelope.into_data()
}

/// Reads an integer field, tolerating numeric strings.
fn int_field(data: &JsonValue, field: &str) -> Result<i64, TaskPlatformError> {
    let value = data.get(field);
    value
        .and_then(JsonValue::as_i64)
        .or_else(|| value.and_then(JsonValue::as_str).and_then(|s| s.parse().ok()))
        .ok_or_else(|| TaskPlatformError::InvalidResponse(format!("missing {field} in data")))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
