//! Task platform configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::dootask::DooTaskConfig;

use super::error::ValidationError;
use super::server::Environment;

/// DooTask server location
///
/// Credentials are not configured here; the bot token is read at runtime
/// through the integration settings port.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DooTaskSettings {
    /// Base URL of the DooTask server
    pub base_url: String,

    /// Bot webhook for dialog messages; defaults to the server's send-text endpoint
    pub webhook_url: Option<String>,

    /// API version sent with webhook messages
    #[serde(default)]
    pub version: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl DooTaskSettings {
    /// Build the HTTP client configuration
    pub fn to_client_config(&self) -> DooTaskConfig {
        let mut config = DooTaskConfig::new(&self.base_url)
            .with_version(&self.version)
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(webhook_url) = &self.webhook_url {
            config = config.with_webhook_url(webhook_url);
        }
        config
    }

    /// Validate task platform configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("dootask.base_url"));
        }
        if !is_http_url(&self.base_url) {
            return Err(ValidationError::InvalidUrl("dootask.base_url"));
        }
        if let Some(webhook_url) = &self.webhook_url {
            if !is_http_url(webhook_url) {
                return Err(ValidationError::InvalidUrl("dootask.webhook_url"));
            }
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::TaskPlatformMustBeHttps);
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn default_request_timeout() -> u64 {
    5
}
