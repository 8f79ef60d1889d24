//! Connection registry and fan-out.
//!
//! The hub tracks every live session in three indices behind a single
//! `RwLock`:
//!
//! - every session by id
//! - customer sessions by the conversation they are bound to
//! - every agent session
//!
//! Broadcasts only take the read lock and never wait on a mailbox. A
//! session whose mailbox is full or closed is treated as dead and removed
//! by a separately spawned task once the read lock has been released.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::chat::ClientRole;
use crate::domain::foundation::{ConversationUuid, SessionId};

use super::session::Session;

/// Errors returned by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// The hub was shut down and accepts no new sessions.
    #[error("realtime hub is shut down")]
    HubClosed,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions whose mailbox accepted the frame.
    pub delivered: usize,
    /// Sessions that could not take the frame and are being removed.
    pub dropped: usize,
}

impl BroadcastReport {
    /// Total number of sessions the broadcast was attempted on.
    pub fn attempted(&self) -> usize {
        self.delivered + self.dropped
    }
}

#[derive(Default)]
struct Registry {
    closed: bool,
    all_sessions: HashMap<SessionId, Arc<Session>>,
    by_conversation: HashMap<ConversationUuid, Vec<Arc<Session>>>,
    agent_sessions: Vec<Arc<Session>>,
}

impl Registry {
    fn remove(&mut self, session_id: SessionId) -> Option<Arc<Session>> {
        let session = self.all_sessions.remove(&session_id)?;

        match session.role() {
            ClientRole::Customer => {
                if let Some(conversation) = session.conversation() {
                    if let Some(members) = self.by_conversation.get_mut(conversation) {
                        members.retain(|member| member.id() != session_id);
                        if members.is_empty() {
                            self.by_conversation.remove(conversation);
                        }
                    }
                }
            }
            ClientRole::Agent => {
                self.agent_sessions.retain(|member| member.id() != session_id);
            }
        }

        Some(session)
    }
}

/// Registry of live sessions.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct Hub {
    registry: Arc<RwLock<Registry>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to the indices matching its role and binding.
    ///
    /// Customers without a binding are tracked but receive nothing until
    /// they reconnect with one. Registering the same session twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::HubClosed`] after [`Hub::shutdown`]; the session's
    /// mailbox is closed so its writer terminates.
    pub async fn register(&self, session: Arc<Session>) -> Result<(), RealtimeError> {
        let mut registry = self.registry.write().await;

        if registry.closed {
            drop(registry);
            session.close();
            return Err(RealtimeError::HubClosed);
        }

        if registry.all_sessions.contains_key(&session.id()) {
            return Ok(());
        }

        match session.role() {
            ClientRole::Customer => {
                if let Some(conversation) = session.conversation() {
                    registry
                        .by_conversation
                        .entry(conversation.clone())
                        .or_default()
                        .push(Arc::clone(&session));
                }
            }
            ClientRole::Agent => registry.agent_sessions.push(Arc::clone(&session)),
        }
        registry
            .all_sessions
            .insert(session.id(), Arc::clone(&session));

        tracing::info!(
            session_id = %session.id(),
            role = %session.role(),
            conv_uuid = session.conversation().map(ConversationUuid::as_str).unwrap_or(""),
            "Session registered"
        );

        Ok(())
    }

    /// Remove a session from every index and close its mailbox.
    ///
    /// Returns `false` when the session was not registered (already removed
    /// or never added).
    pub async fn unregister(&self, session_id: SessionId) -> bool {
        let removed = self.registry.write().await.remove(session_id);

        match removed {
            Some(session) => {
                session.close();
                tracing::info!(session_id = %session_id, role = %session.role(), "Session unregistered");
                true
            }
            None => false,
        }
    }

    /// Send a frame to every customer session bound to a conversation.
    pub async fn broadcast_to_conversation(
        &self,
        conversation: &ConversationUuid,
        frame: Arc<str>,
    ) -> BroadcastReport {
        let (report, failed) = {
            let registry = self.registry.read().await;
            match registry.by_conversation.get(conversation) {
                Some(members) => deliver(members, &frame),
                None => (BroadcastReport::default(), Vec::new()),
            }
        };

        tracing::debug!(
            conv_uuid = %conversation,
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast to conversation"
        );

        self.schedule_removal(failed);
        report
    }

    /// Send a frame to every agent session.
    pub async fn broadcast_to_agents(&self, frame: Arc<str>) -> BroadcastReport {
        let (report, failed) = {
            let registry = self.registry.read().await;
            deliver(&registry.agent_sessions, &frame)
        };

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast to agents"
        );

        self.schedule_removal(failed);
        report
    }

    /// Number of customer sessions bound to a conversation.
    pub async fn count_for_conversation(&self, conversation: &ConversationUuid) -> usize {
        self.registry
            .read()
            .await
            .by_conversation
            .get(conversation)
            .map_or(0, Vec::len)
    }

    /// Number of registered sessions of any role.
    pub async fn count_all(&self) -> usize {
        self.registry.read().await.all_sessions.len()
    }

    pub async fn count_agents(&self) -> usize {
        self.registry.read().await.agent_sessions.len()
    }

    /// Whether a session is currently registered.
    pub async fn contains(&self, session_id: SessionId) -> bool {
        self.registry.read().await.all_sessions.contains_key(&session_id)
    }

    /// Close the hub.
    ///
    /// Drains every index and closes each mailbox so the writers send a
    /// close frame. Later registrations are refused. Returns the number of
    /// sessions that were closed.
    pub async fn shutdown(&self) -> usize {
        let sessions: Vec<Arc<Session>> = {
            let mut registry = self.registry.write().await;
            registry.closed = true;
            registry.by_conversation.clear();
            registry.agent_sessions.clear();
            registry.all_sessions.drain().map(|(_, session)| session).collect()
        };

        for session in &sessions {
            session.close();
        }

        tracing::info!(sessions = sessions.len(), "Realtime hub shut down");
        sessions.len()
    }

    pub async fn is_closed(&self) -> bool {
        self.registry.read().await.closed
    }

    fn schedule_removal(&self, failed: Vec<SessionId>) {
        if failed.is_empty() {
            return;
        }

        let hub = self.clone();
        tokio::spawn(async move {
            for session_id in failed {
                if hub.unregister(session_id).await {
                    tracing::warn!(session_id = %session_id, "Dropped unresponsive session");
                }
            }
        });
    }
}

fn deliver(members: &[Arc<Session>], frame: &Arc<str>) -> (BroadcastReport, Vec<SessionId>) {
    let mut report = BroadcastReport::default();
    let mut failed = Vec::new();

    for session in members {
        match session.try_deliver(Arc::clone(frame)) {
            Ok(()) => report.delivered += 1,
            Err(reason) => {
                tracing::debug!(session_id = %session.id(), ?reason, "Frame not delivered");
                report.dropped += 1;
                failed.push(session.id());
            }
        }
    }

    (report, failed)
}
