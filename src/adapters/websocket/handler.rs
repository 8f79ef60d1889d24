//! WebSocket upgrade handler for live chat connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Resolve who is connecting (customer widget or authenticated agent)
//! 2. Upgrade to WebSocket
//! 3. Register the session with the hub
//! 4. Run the read and write pumps until either side gives up
//! 5. Unregister the session

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures::StreamExt;
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::domain::chat::ClientRole;
use crate::domain::foundation::{AgentId, ConversationUuid};

use super::hub::Hub;
use super::inbound::InboundRouter;
use super::pumps::{read_pump, write_pump, PumpConfig, PumpError};
use super::session::{Session, SessionBinding, DEFAULT_MAILBOX_CAPACITY};

/// Agent identity attached to the request by the authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAgent {
    pub agent_id: AgentId,
}

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Hub,
    pub router: InboundRouter,
    pub pumps: Arc<PumpConfig>,
    pub mailbox_capacity: usize,
}

impl WebSocketState {
    /// Create a new WebSocket state with default limits.
    pub fn new(hub: Hub, router: InboundRouter) -> Self {
        Self {
            hub,
            router,
            pumps: Arc::new(PumpConfig::default()),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }

    pub fn with_pump_config(mut self, pumps: PumpConfig) -> Self {
        self.pumps = Arc::new(pumps);
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }
}

/// Query string of the upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectQuery {
    pub conv_uuid: Option<String>,
    pub client_type: Option<String>,
}

/// Reasons an upgrade request is refused before the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectRejection {
    #[error("invalid client type, must be 'agent' or 'customer'")]
    InvalidClientType,

    #[error("missing conversation UUID")]
    MissingConversation,

    #[error("agent connections require authentication")]
    Unauthenticated,
}

impl ConnectRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            ConnectRejection::InvalidClientType | ConnectRejection::MissingConversation => {
                StatusCode::BAD_REQUEST
            }
            ConnectRejection::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ConnectRejection {
    fn into_response(self) -> Response {
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl SessionBinding {
    /// Decide what a connection is bound to from its upgrade request.
    ///
    /// Customers must name their conversation. Agents must have been
    /// authenticated upstream and may optionally focus on a conversation.
    pub fn from_query(
        query: &ConnectQuery,
        agent: Option<&AuthenticatedAgent>,
    ) -> Result<Self, ConnectRejection> {
        let role: ClientRole = query
            .client_type
            .as_deref()
            .ok_or(ConnectRejection::InvalidClientType)?
            .parse()
            .map_err(|_| ConnectRejection::InvalidClientType)?;

        let conversation = query
            .conv_uuid
            .as_deref()
            .and_then(|id| ConversationUuid::new(id).ok());

        match role {
            ClientRole::Customer => conversation
                .map(SessionBinding::customer)
                .ok_or(ConnectRejection::MissingConversation),
            ClientRole::Agent => {
                let agent = agent.ok_or(ConnectRejection::Unauthenticated)?;
                Ok(SessionBinding::agent(agent.agent_id.clone(), conversation))
            }
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?conv_uuid=<id>&client_type=customer|agent`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<WebSocketState>,
    agent: Option<Extension<AuthenticatedAgent>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response, ConnectRejection> {
    let binding = SessionBinding::from_query(&query, agent.as_deref())?;
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);

    // Oversized frames are refused by the transport as soon as their header
    // is read; read_pump still checks the decoded length.
    let limit = state.pumps.max_message_size;
    Ok(ws
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, binding, remote_addr, state)))
}

/// Handle an established WebSocket connection.
///
/// Runs for the lifetime of the connection. When the reader stops the
/// session is unregistered, which closes the mailbox and lets the writer
/// send a close frame on its own.
async fn handle_socket(
    socket: WebSocket,
    binding: SessionBinding,
    remote_addr: Option<SocketAddr>,
    state: WebSocketState,
) {
    let (session, mailbox) = Session::new(binding, remote_addr, state.mailbox_capacity);
    let session_id = session.id();

    if let Err(e) = state.hub.register(Arc::clone(&session)).await {
        tracing::debug!(session_id = %session_id, error = %e, "Refusing connection");
        // The mailbox is already closed; this only sends the close frame.
        if let Err(e) = write_pump(socket, mailbox, &state.pumps).await {
            tracing::debug!(session_id = %session_id, error = %e, "Close frame to refused peer failed");
        }
        return;
    }

    let (sink, stream) = socket.split();

    let pumps = Arc::clone(&state.pumps);
    let mut write_task = tokio::spawn(async move { write_pump(sink, mailbox, &pumps).await });

    let pumps = Arc::clone(&state.pumps);
    let router = state.router.clone();
    let reader = Arc::clone(&session);
    let mut read_task =
        tokio::spawn(async move { read_pump(stream, &reader, &router, &pumps).await });

    tokio::select! {
        result = &mut write_task => {
            log_pump_exit("write", session_id, result);
            read_task.abort();
        }
        result = &mut read_task => {
            log_pump_exit("read", session_id, result);
        }
    }

    state.hub.unregister(session_id).await;
}

fn log_pump_exit(
    pump: &'static str,
    session_id: crate::domain::foundation::SessionId,
    result: Result<Result<(), PumpError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => tracing::debug!(session_id = %session_id, pump, "Pump finished"),
        Ok(Err(e)) => tracing::debug!(session_id = %session_id, pump, error = %e, "Pump stopped"),
        Err(e) => tracing::warn!(session_id = %session_id, pump, error = %e, "Pump task failed"),
    }
}

/// Create axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router())
///     .with_state(ws_state);
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::WorkerPoolEventBus;

    fn query(client_type: Option<&str>, conv_uuid: Option<&str>) -> ConnectQuery {
        ConnectQuery {
            conv_uuid: conv_uuid.map(str::to_string),
            client_type: client_type.map(str::to_string),
        }
    }

    fn agent() -> AuthenticatedAgent {
        AuthenticatedAgent {
            agent_id: AgentId::new("agent-1").unwrap(),
        }
    }

    #[test]
    fn customer_binds_to_conversation() {
        let binding =
            SessionBinding::from_query(&query(Some("customer"), Some("c-1")), None).unwrap();

        assert_eq!(binding.role, ClientRole::Customer);
        assert_eq!(binding.conversation.unwrap().as_str(), "c-1");
    }

    #[test]
    fn customer_without_conversation_is_rejected() {
        let missing = SessionBinding::from_query(&query(Some("customer"), None), None);
        let blank = SessionBinding::from_query(&query(Some("customer"), Some("  ")), None);

        assert_eq!(missing, Err(ConnectRejection::MissingConversation));
        assert_eq!(blank, Err(ConnectRejection::MissingConversation));
    }

    #[test]
    fn unknown_or_missing_client_type_is_rejected() {
        let unknown = SessionBinding::from_query(&query(Some("robot"), Some("c-1")), None);
        let missing = SessionBinding::from_query(&query(None, Some("c-1")), None);

        assert_eq!(unknown, Err(ConnectRejection::InvalidClientType));
        assert_eq!(missing, Err(ConnectRejection::InvalidClientType));
    }

    #[test]
    fn agent_requires_authentication() {
        let result = SessionBinding::from_query(&query(Some("agent"), None), None);

        assert_eq!(result, Err(ConnectRejection::Unauthenticated));
        assert_eq!(
            ConnectRejection::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn authenticated_agent_may_skip_conversation() {
        let agent = agent();
        let binding = SessionBinding::from_query(&query(Some("agent"), None), Some(&agent)).unwrap();

        assert_eq!(binding.role, ClientRole::Agent);
        assert!(binding.conversation.is_none());
        assert_eq!(binding.agent_id, Some(agent.agent_id));
    }

    #[test]
    fn rejection_maps_to_bad_request() {
        let response = ConnectRejection::MissingConversation.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn websocket_state_applies_limits() {
        let hub = Hub::new();
        let router = InboundRouter::new(hub.clone(), Arc::new(WorkerPoolEventBus::new(1, 4)));
        let pumps = PumpConfig {
            max_message_size: 1024,
            ..PumpConfig::default()
        };

        let state = WebSocketState::new(hub, router)
            .with_pump_config(pumps.clone())
            .with_mailbox_capacity(32);

        assert_eq!(*state.pumps, pumps);
        assert_eq!(state.mailbox_capacity, 32);
    }

    #[test]
    fn websocket_router_creates_successfully() {
        let hub = Hub::new();
        let router = InboundRouter::new(hub.clone(), Arc::new(WorkerPoolEventBus::new(1, 4)));
        let _app: axum::Router = websocket_router().with_state(WebSocketState::new(hub, router));
    }
}
