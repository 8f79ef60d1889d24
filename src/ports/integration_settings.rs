//! Integration settings port.
//!
//! Settings are edited by administrators at runtime, so handlers read them
//! per event instead of caching them at startup.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::foundation::DomainError;

/// Task platform integration switches.
#[derive(Debug, Clone)]
pub struct IntegrationSettings {
    /// Open a task for every new conversation.
    pub create_task: bool,
    /// Bot token used to post into task dialogs. Empty disables notifications.
    pub bot_token: SecretString,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            create_task: false,
            bot_token: SecretString::new(String::new()),
        }
    }
}

/// Reads the current integration settings.
#[async_trait]
pub trait IntegrationSettingsReader: Send + Sync {
    async fn load(&self) -> Result<IntegrationSettings, DomainError>;
}
