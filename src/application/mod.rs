//! Application layer - Dispatch facade and event handlers.
//!
//! This layer orchestrates the hub, the bus and the integration ports.

pub mod handlers;
mod live_dispatcher;

pub use handlers::{CreateSupportTaskHandler, NotifyTaskDialogHandler, NOTIFY_TASK_DIALOG_EVENTS};
pub use live_dispatcher::{Dispatched, LiveDispatcher};
