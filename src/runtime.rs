//! Composition root for the live relay.
//!
//! Wires the hub, the event bus and the integration handlers together and
//! owns their lifecycle.
//!
//! ```ignore
//! let config = AppConfig::load_validated()?;
//! let ports = IntegrationPorts::with_dootask(conversations, settings, &config.dootask)?;
//! let runtime = RealtimeRuntime::start(&config, ports)?;
//!
//! let app = Router::new().merge(runtime.router());
//! // ... serve, then:
//! runtime.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::dootask::DooTaskClient;
use crate::adapters::events::WorkerPoolEventBus;
use crate::adapters::websocket::{websocket_router, Hub, InboundRouter, WebSocketState};
use crate::application::{
    CreateSupportTaskHandler, LiveDispatcher, NotifyTaskDialogHandler, NOTIFY_TASK_DIALOG_EVENTS,
};
use crate::config::{AppConfig, DooTaskSettings, ValidationError};
use crate::domain::chat::CONVERSATION_CREATED;
use crate::ports::{
    ConversationRepository, EventBusError, EventPublisher, EventSubscriber,
    IntegrationSettingsReader, TaskPlatform, TaskPlatformError,
};

/// Collaborators the integration handlers need.
#[derive(Clone)]
pub struct IntegrationPorts {
    pub conversations: Arc<dyn ConversationRepository>,
    pub settings: Arc<dyn IntegrationSettingsReader>,
    pub tasks: Arc<dyn TaskPlatform>,
}

impl IntegrationPorts {
    /// Use DooTask as the task platform.
    pub fn with_dootask(
        conversations: Arc<dyn ConversationRepository>,
        settings: Arc<dyn IntegrationSettingsReader>,
        dootask: &DooTaskSettings,
    ) -> Result<Self, TaskPlatformError> {
        let client = DooTaskClient::new(dootask.to_client_config())?;
        Ok(Self {
            conversations,
            settings,
            tasks: Arc::new(client),
        })
    }
}

/// Why the runtime could not start.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("event bus failed to start: {0}")]
    EventBus(#[from] EventBusError),
}

/// Running hub and bus.
pub struct RealtimeRuntime {
    hub: Hub,
    bus: Arc<WorkerPoolEventBus>,
    dispatcher: LiveDispatcher,
    ws_state: WebSocketState,
    shutdown_grace: Duration,
}

impl RealtimeRuntime {
    /// Validate `config`, then build and start everything.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &AppConfig, ports: IntegrationPorts) -> Result<Self, RuntimeError> {
        config.validate()?;

        let hub = Hub::new();
        let bus = Arc::new(WorkerPoolEventBus::new(
            config.event_bus.workers,
            config.event_bus.queue_capacity,
        ));

        bus.subscribe(
            CONVERSATION_CREATED,
            Arc::new(CreateSupportTaskHandler::new(
                Arc::clone(&ports.conversations),
                Arc::clone(&ports.settings),
                Arc::clone(&ports.tasks),
            )),
        );
        bus.subscribe_all(
            &NOTIFY_TASK_DIALOG_EVENTS,
            Arc::new(NotifyTaskDialogHandler::new(
                ports.conversations,
                ports.settings,
                ports.tasks,
            )),
        );

        bus.start()?;

        let events: Arc<dyn EventPublisher> = bus.clone();
        let dispatcher = LiveDispatcher::new(hub.clone(), Arc::clone(&events));
        let ws_state = WebSocketState::new(hub.clone(), InboundRouter::new(hub.clone(), events))
            .with_pump_config(config.realtime.pump_config())
            .with_mailbox_capacity(config.realtime.mailbox_capacity);

        tracing::info!(
            workers = config.event_bus.workers,
            queue_capacity = config.event_bus.queue_capacity,
            mailbox_capacity = config.realtime.mailbox_capacity,
            "Realtime runtime started"
        );

        Ok(Self {
            hub,
            bus,
            dispatcher,
            ws_state,
            shutdown_grace: Duration::from_secs(config.event_bus.shutdown_grace_secs),
        })
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn bus(&self) -> &Arc<WorkerPoolEventBus> {
        &self.bus
    }

    /// Facade for request handlers that commit chat state.
    pub fn dispatcher(&self) -> &LiveDispatcher {
        &self.dispatcher
    }

    pub fn ws_state(&self) -> &WebSocketState {
        &self.ws_state
    }

    /// `GET /ws`, ready to merge into the application router.
    pub fn router(&self) -> axum::Router {
        websocket_router().with_state(self.ws_state.clone())
    }

    /// Close every live session, then drain the bus.
    ///
    /// Handlers still running when the configured grace period ends are
    /// cancelled. Idempotent.
    pub async fn shutdown(&self) {
        let closed = self.hub.shutdown().await;
        let drained = self.bus.stop_within(self.shutdown_grace).await;
        tracing::info!(sessions_closed = closed, drained, "Realtime runtime stopped");
    }
}
