//! One live connection as the hub sees it.
//!
//! A [`Session`] is the producer half: the hub keeps an `Arc<Session>` in its
//! indices and pushes serialized frames into it without ever waiting. The
//! matching [`Mailbox`] is the consumer half, owned by the connection's
//! write pump.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::domain::chat::ClientRole;
use crate::domain::foundation::{AgentId, ConversationUuid, SessionId};

/// Default number of frames a mailbox holds before the session is
/// considered dead.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Who is on the other end of a connection and which conversation it
/// follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub role: ClientRole,
    pub conversation: Option<ConversationUuid>,
    pub agent_id: Option<AgentId>,
}

impl SessionBinding {
    /// A customer widget following one conversation.
    pub fn customer(conversation: ConversationUuid) -> Self {
        Self {
            role: ClientRole::Customer,
            conversation: Some(conversation),
            agent_id: None,
        }
    }

    /// An agent console, optionally focused on one conversation.
    pub fn agent(agent_id: AgentId, conversation: Option<ConversationUuid>) -> Self {
        Self {
            role: ClientRole::Agent,
            conversation,
            agent_id: Some(agent_id),
        }
    }
}

/// Why a frame could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The mailbox is at capacity; the consumer is too slow.
    Full,
    /// The session was closed or its consumer is gone.
    Closed,
}

/// Producer side of a live connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    binding: SessionBinding,
    remote_addr: Option<SocketAddr>,
    outbox: mpsc::Sender<Arc<str>>,
    closed: watch::Sender<bool>,
}

impl Session {
    /// Create a session and the mailbox its writer drains.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(
        binding: SessionBinding,
        remote_addr: Option<SocketAddr>,
        capacity: usize,
    ) -> (Arc<Self>, Mailbox) {
        let (outbox, frames) = mpsc::channel(capacity.max(1));
        let (closed, closed_rx) = watch::channel(false);

        let session = Arc::new(Self {
            id: SessionId::new(),
            binding,
            remote_addr,
            outbox,
            closed,
        });

        let mailbox = Mailbox {
            session_id: session.id,
            frames,
            closed: closed_rx,
        };

        (session, mailbox)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> ClientRole {
        self.binding.role
    }

    /// Conversation the session is bound to, if any.
    pub fn conversation(&self) -> Option<&ConversationUuid> {
        self.binding.conversation.as_ref()
    }

    pub fn agent_id(&self) -> Option<&AgentId> {
        self.binding.agent_id.as_ref()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Queue a frame without waiting.
    pub fn try_deliver(&self, frame: Arc<str>) -> Result<(), DeliveryFailure> {
        if self.is_closed() {
            return Err(DeliveryFailure::Closed);
        }

        self.outbox.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    /// Close the mailbox.
    ///
    /// Returns `true` only for the call that actually closed it; every later
    /// call is a no-op.
    pub fn close(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Consumer side of a live connection.
#[derive(Debug)]
pub struct Mailbox {
    session_id: SessionId,
    frames: mpsc::Receiver<Arc<str>>,
    closed: watch::Receiver<bool>,
}

impl Mailbox {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Wait for the next frame.
    ///
    /// Frames already queued are handed out before closure is observed.
    /// Returns `None` once the session is closed (or dropped) and the queue
    /// is empty.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        tokio::select! {
            biased;
            frame = self.frames.recv() => frame,
            _ = self.closed.wait_for(|closed| *closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn customer(capacity: usize) -> (Arc<Session>, Mailbox) {
        let conv = ConversationUuid::new("c-1").unwrap();
        Session::new(SessionBinding::customer(conv), None, capacity)
    }

    #[tokio::test]
    async fn delivered_frames_arrive_in_order() {
        let (session, mut mailbox) = customer(4);

        session.try_deliver(Arc::from("one")).unwrap();
        session.try_deliver(Arc::from("two")).unwrap();

        assert_eq!(mailbox.recv().await.as_deref(), Some("one"));
        assert_eq!(mailbox.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn full_mailbox_rejects_without_waiting() {
        let (session, _mailbox) = customer(1);

        session.try_deliver(Arc::from("first")).unwrap();
        let second = session.try_deliver(Arc::from("second"));

        assert_eq!(second, Err(DeliveryFailure::Full));
    }

    #[test]
    fn close_reports_true_exactly_once() {
        let (session, _mailbox) = customer(1);

        assert!(session.close());
        assert!(!session.close());
        assert!(!session.close());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn closed_session_rejects_frames() {
        let (session, _mailbox) = customer(4);
        session.close();

        assert_eq!(
            session.try_deliver(Arc::from("late")),
            Err(DeliveryFailure::Closed)
        );
    }

    #[tokio::test]
    async fn mailbox_drains_queued_frames_before_reporting_close() {
        let (session, mut mailbox) = customer(4);
        session.try_deliver(Arc::from("pending")).unwrap();
        session.close();

        assert_eq!(mailbox.recv().await.as_deref(), Some("pending"));
        assert_eq!(mailbox.recv().await, None);
    }

    #[tokio::test]
    async fn close_wakes_a_waiting_consumer() {
        let (session, mut mailbox) = customer(4);

        let waiter = tokio::spawn(async move { mailbox.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.close();

        let received = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn dropping_the_session_ends_the_mailbox() {
        let (session, mut mailbox) = customer(4);
        drop(session);

        assert_eq!(mailbox.recv().await, None);
    }

    #[test]
    fn agent_binding_keeps_optional_focus() {
        let binding = SessionBinding::agent(AgentId::new("agent-7").unwrap(), None);
        let (session, _mailbox) = Session::new(binding, None, 1);

        assert_eq!(session.role(), ClientRole::Agent);
        assert!(session.conversation().is_none());
        assert_eq!(session.agent_id().map(AgentId::as_str), Some("agent-7"));
    }
}
