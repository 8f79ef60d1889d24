//! Application handlers.
//!
//! Event handlers that carry chat activity over to the task platform.

mod create_support_task;
mod notify_task_dialog;

#[cfg(test)]
pub(crate) mod testing;

pub use create_support_task::CreateSupportTaskHandler;
pub use notify_task_dialog::{dialog_text, NotifyTaskDialogHandler, NOTIFY_TASK_DIALOG_EVENTS};
