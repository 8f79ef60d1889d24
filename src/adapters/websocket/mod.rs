//! WebSocket adapters for live chat.
//!
//! # Architecture
//!
//! ```text
//!   widget / console ──ws──▶ read pump ──▶ InboundRouter ──┐
//!                                                          │ broadcast
//!   LiveDispatcher ────────────────────────────────────────▶ Hub
//!                                                          │ try_send
//!   widget / console ◀──ws── write pump ◀── Mailbox ◀──────┘
//! ```
//!
//! # Components
//!
//! - [`session`] - Producer/consumer halves of one connection
//! - [`hub`] - Registry of live sessions and fan-out
//! - [`inbound`] - Stamping and routing of peer frames
//! - [`pumps`] - Keep-alive read and write loops
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod hub;
pub mod inbound;
pub mod pumps;
pub mod session;

pub use handler::{
    websocket_router, ws_handler, AuthenticatedAgent, ConnectQuery, ConnectRejection,
    WebSocketState,
};
pub use hub::{BroadcastReport, Hub, RealtimeError};
pub use inbound::{InboundOutcome, InboundRouter};
pub use pumps::{read_pump, write_pump, PumpConfig, PumpError};
pub use session::{
    DeliveryFailure, Mailbox, Session, SessionBinding, DEFAULT_MAILBOX_CAPACITY,
};
