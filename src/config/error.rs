//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Ping interval must be shorter than pong wait")]
    PingNotBeforePongWait,

    #[error("Worker count exceeds maximum allowed (64)")]
    TooManyWorkers,

    #[error("Task platform URL must use HTTPS in production")]
    TaskPlatformMustBeHttps,
}
