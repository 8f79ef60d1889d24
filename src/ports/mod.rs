//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay core and the outside world. Adapters implement these ports.
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing events
//! - `EventSubscriber` - Port for subscribing to events
//! - `EventHandler` - Handler that processes incoming events
//!
//! ## Integration Ports
//!
//! - `ConversationRepository` - Conversation lookups and task linking
//! - `IntegrationSettingsReader` - Runtime task platform switches
//! - `TaskPlatform` - External task tracker

mod conversation_repository;
mod event_publisher;
mod event_subscriber;
mod integration_settings;
mod task_platform;

pub use conversation_repository::{ConversationRecord, ConversationRepository, SourceRecord};
pub use event_publisher::{EventBusError, EventPublisher};
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use integration_settings::{IntegrationSettings, IntegrationSettingsReader};
pub use task_platform::{CreatedTask, NewTask, TaskPlatform, TaskPlatformError};
