//! Per-connection read and write loops.
//!
//! Both pumps are generic over the transport halves so they can be driven by
//! an axum `WebSocket` in production and by in-memory channels in tests.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use super::inbound::InboundRouter;
use super::session::{Mailbox, Session};

/// Timing and size limits applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpConfig {
    /// Interval between keep-alive pings. Must be shorter than `pong_wait`.
    pub ping_interval: Duration,
    /// Longest silence tolerated from the peer.
    pub pong_wait: Duration,
    /// Deadline for a single write.
    pub write_wait: Duration,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

/// Why a pump stopped abnormally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PumpError {
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("peer silent for {0:?}")]
    IdleTimeout(Duration),

    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Drain `mailbox` into `sink`, pinging the peer periodically.
///
/// Ends with `Ok` after sending a close frame once the mailbox reports
/// closure. Any failed or late write ends the pump with an error.
pub async fn write_pump<S>(
    mut sink: S,
    mut mailbox: Mailbox,
    config: &PumpConfig,
) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let session_id = mailbox.session_id();
    let mut ticker = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = mailbox.recv() => match frame {
                Some(frame) => {
                    send_within(&mut sink, Message::Text(frame.to_string()), config.write_wait).await?;
                }
                None => {
                    if let Err(e) = send_within(&mut sink, Message::Close(None), config.write_wait).await {
                        tracing::debug!(session_id = %session_id, error = %e, "Close frame not sent");
                    }
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                send_within(&mut sink, Message::Ping(Vec::new()), config.write_wait).await?;
            }
        }
    }
}

async fn send_within<S>(sink: &mut S, message: Message, deadline: Duration) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpError::Transport(e.to_string())),
        Err(_) => Err(PumpError::WriteTimeout(deadline)),
    }
}

/// Feed frames from `stream` into the router until the peer leaves.
///
/// Every received frame, pongs included, resets the idle deadline. Ends with
/// `Ok` on a close frame or end of stream.
pub async fn read_pump<R, E>(
    mut stream: R,
    session: &Session,
    router: &InboundRouter,
    config: &PumpConfig,
) -> Result<(), PumpError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let message = match timeout(config.pong_wait, stream.next()).await {
            Err(_) => return Err(PumpError::IdleTimeout(config.pong_wait)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(PumpError::Transport(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                check_size(text.len(), config.max_message_size)?;
                router.handle_frame(session, &text).await;
            }
            Message::Binary(bytes) => {
                check_size(bytes.len(), config.max_message_size)?;
                match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        router.handle_frame(session, text).await;
                    }
                    Err(_) => {
                        tracing::debug!(session_id = %session.id(), "Ignoring non UTF-8 binary frame");
                    }
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                tracing::debug!(session_id = %session.id(), "Peer sent close frame");
                return Ok(());
            }
        }
    }
}

fn check_size(size: usize, limit: usize) -> Result<(), PumpError> {
    if size > limit {
        return Err(PumpError::MessageTooLarge { size, limit });
    }
    Ok(())
}
