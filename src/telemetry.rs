//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Returns `false` when a
/// subscriber was already installed, which happens when tests share a
/// process.
pub fn init_tracing(log_level: &str, json: bool) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// [`init_tracing`] driven by the server section.
pub fn init_from_config(server: &ServerConfig) -> bool {
    init_tracing(&server.log_level, server.log_json)
}
