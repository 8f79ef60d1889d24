//! Asynchronous event bus backed by a bounded queue and a pool of workers.
//!
//! `publish` never waits: it either places the event in the queue or fails
//! immediately. A fixed number of workers pull events one at a time and run
//! every handler subscribed to the event type, in subscription order.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──▶ Stopped
//!   └──────────────stop()──────────────────▲
//! ```
//!
//! Events published while `Idle` wait in the queue until `start`. `stop`
//! closes the queue to new events and lets the workers drain what is
//! already buffered before returning. `stop_within` does the same but, once
//! its grace period runs out, cancels the workers: in-flight handler futures
//! are dropped and whatever is still queued is discarded. A stopped bus
//! cannot be restarted.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventBusError, EventHandler, EventPublisher, EventSubscriber};

type HandlerMap = HashMap<String, Vec<Arc<dyn EventHandler>>>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<EventEnvelope>>>;

enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    Stopped,
}

/// Worker-pool event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(WorkerPoolEventBus::new(4, 1000));
/// bus.subscribe(CONVERSATION_CREATED, Arc::new(handler));
/// bus.start()?;
///
/// bus.publish(EventEnvelope::from_event(&event)?)?;
///
/// bus.stop_within(Duration::from_secs(30)).await;
/// ```
pub struct WorkerPoolEventBus {
    handlers: Arc<RwLock<HandlerMap>>,
    sender: Mutex<Option<mpsc::Sender<EventEnvelope>>>,
    receiver: SharedReceiver,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
    /// `None` until the stop that won the lifecycle transition has finished;
    /// then whether every buffered event was dispatched.
    finished: watch::Sender<Option<bool>>,
    workers: usize,
    capacity: usize,
}

impl WorkerPoolEventBus {
    /// Creates an idle bus.
    ///
    /// `workers` and `queue_capacity` are clamped to at least one.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            lifecycle: Mutex::new(Lifecycle::Idle),
            cancel: CancellationToken::new(),
            finished: watch::Sender::new(None),
            workers: workers.max(1),
            capacity,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock_lifecycle(), Lifecycle::Running(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(*self.lock_lifecycle(), Lifecycle::Stopped)
    }

    /// Number of handlers subscribed to an event type.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Spawn the workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), EventBusError> {
        let mut lifecycle = self.lock_lifecycle();

        match *lifecycle {
            Lifecycle::Running(_) => return Err(EventBusError::AlreadyStarted),
            Lifecycle::Stopped => return Err(EventBusError::AlreadyStopped),
            Lifecycle::Idle => {}
        }

        let handles = (0..self.workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&self.receiver);
                let handlers = Arc::clone(&self.handlers);
                let cancel = self.cancel.clone();
                tokio::spawn(run_worker(worker_id, receiver, handlers, cancel))
            })
            .collect();

        *lifecycle = Lifecycle::Running(handles);
        tracing::info!(workers = self.workers, capacity = self.capacity, "Event bus started");
        Ok(())
    }

    /// Stop accepting events and wait for the workers to drain the queue.
    ///
    /// Idempotent: every caller, including ones racing the first, returns
    /// only after the drain has finished. When the bus was never started the
    /// buffered events are discarded, since no worker will ever run them.
    pub async fn stop(&self) {
        self.shutdown(None).await;
    }

    /// Like [`stop`](Self::stop), but cancels the workers once `grace` has
    /// elapsed.
    ///
    /// Returns `true` when every buffered event was dispatched, `false` when
    /// handlers were cancelled or queued events discarded.
    pub async fn stop_within(&self, grace: Duration) -> bool {
        self.shutdown(Some(grace)).await
    }

    async fn shutdown(&self, grace: Option<Duration>) -> bool {
        // Dropping the only sender closes the queue once it is drained.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::Stopped);

        let drained = match previous {
            Lifecycle::Running(handles) => {
                let drained = self.join_workers(handles, grace).await;
                let discarded = self.discard_queued().await;
                if drained && discarded == 0 {
                    tracing::info!("Event bus stopped");
                } else {
                    tracing::warn!(discarded, "Event bus stopped before the queue drained");
                }
                drained && discarded == 0
            }
            Lifecycle::Idle => {
                let discarded = self.discard_queued().await;
                if discarded > 0 {
                    tracing::warn!(discarded, "Event bus stopped before start; buffered events discarded");
                } else {
                    tracing::info!("Event bus stopped before start");
                }
                discarded == 0
            }
            Lifecycle::Stopped => {
                // Another caller owns the transition; wait for its outcome.
                let mut finished = self.finished.subscribe();
                return match finished.wait_for(Option::is_some).await {
                    Ok(outcome) => (*outcome).unwrap_or(false),
                    Err(_) => false,
                };
            }
        };

        self.finished.send_replace(Some(drained));
        drained
    }

    /// Wait for every worker, cancelling them if `grace` runs out. Returns
    /// `false` when cancellation was needed.
    async fn join_workers(&self, handles: Vec<JoinHandle<()>>, grace: Option<Duration>) -> bool {
        let mut joined = Box::pin(join_all_logged(handles));

        match grace {
            None => {
                joined.await;
                true
            }
            Some(grace) => match tokio::time::timeout(grace, &mut joined).await {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!(
                        grace_ms = grace.as_millis() as u64,
                        "Event bus drain timed out; cancelling workers"
                    );
                    self.cancel.cancel();
                    joined.await;
                    false
                }
            },
        }
    }

    async fn discard_queued(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        let mut discarded = 0usize;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        snapshot(&self.handlers, event_type)
    }
}

impl Default for WorkerPoolEventBus {
    fn default() -> Self {
        Self::new(4, 1000)
    }
}

#[async_trait]
impl EventPublisher for WorkerPoolEventBus {
    fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(EventBusError::Closed);
        };

        match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    event_type = %event.event_type,
                    event_id = %event.event_id,
                    capacity = self.capacity,
                    "Event queue full; event dropped"
                );
                Err(EventBusError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EventBusError::Closed),
        }
    }

    async fn publish_sync(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        if self.is_stopped() {
            return Err(EventBusError::Closed);
        }

        for handler in self.handlers_for(&event.event_type) {
            let outcome = AssertUnwindSafe(handler.handle(event.clone()))
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(panic) => DomainError::new(
                    ErrorCode::InternalError,
                    format!("handler panicked: {}", panic_message(&*panic)),
                ),
            };

            tracing::error!(
                handler = handler.name(),
                event_type = %event.event_type,
                event_id = %event.event_id,
                error = %error,
                "Synchronous event handler failed"
            );
            return Err(EventBusError::Handler {
                handler: handler.name(),
                source: error,
            });
        }

        Ok(())
    }
}

impl EventSubscriber for WorkerPoolEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        tracing::debug!(event_type, handler = handler.name(), "Handler subscribed");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}

fn snapshot(handlers: &RwLock<HandlerMap>, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
    handlers
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(event_type)
        .cloned()
        .unwrap_or_default()
}

async fn run_worker(
    worker_id: usize,
    receiver: SharedReceiver,
    handlers: Arc<RwLock<HandlerMap>>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker_id, "Event bus worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = async { receiver.lock().await.recv().await } => next,
        };
        let Some(event) = next else {
            break;
        };

        if !dispatch(worker_id, &handlers, event, &cancel).await {
            break;
        }
    }

    tracing::debug!(worker_id, "Event bus worker exited");
}

/// Run every handler for one event. Failures and panics are logged and do
/// not stop the remaining handlers. Returns `false` when cancelled.
async fn dispatch(
    worker_id: usize,
    handlers: &RwLock<HandlerMap>,
    event: EventEnvelope,
    cancel: &CancellationToken,
) -> bool {
    for handler in snapshot(handlers, &event.event_type) {
        let outcome = tokio::select! {
            biased;
            outcome = AssertUnwindSafe(handler.handle(event.clone())).catch_unwind() => outcome,
            _ = cancel.cancelled() => {
                tracing::warn!(
                    worker_id,
                    handler = handler.name(),
                    event_type = %event.event_type,
                    event_id = %event.event_id,
                    "Event handler cancelled at shutdown"
                );
                return false;
            }
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(
                worker_id,
                handler = handler.name(),
                event_type = %event.event_type,
                event_id = %event.event_id,
                error = %e,
                "Event handler failed"
            ),
            Err(panic) => tracing::warn!(
                worker_id,
                handler = handler.name(),
                event_type = %event.event_type,
                event_id = %event.event_id,
                panic = %panic_message(&*panic),
                "Event handler panicked"
            ),
        }
    }
    true
}

async fn join_all_logged(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Event bus worker ended abnormally");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        name: &'static str,
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            Err(DomainError::new(ErrorCode::InternalError, "nope"))
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    fn event(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, json!({}))
    }

    fn counting(name: &'static str) -> (Arc<Counting>, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Counting {
                name,
                seen: Arc::clone(&seen),
            }),
            seen,
        )
    }

    #[test]
    fn sizes_are_clamped() {
        let bus = WorkerPoolEventBus::new(0, 0);
        assert_eq!(bus.worker_count(), 1);
        assert_eq!(bus.queue_capacity(), 1);
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let bus = WorkerPoolEventBus::new(1, 4);

        bus.start().unwrap();
        assert!(matches!(bus.start(), Err(EventBusError::AlreadyStarted)));

        bus.stop().await;
        assert!(matches!(bus.start(), Err(EventBusError::AlreadyStopped)));
    }

    #[tokio::test]
    async fn stop_drains_buffered_events() {
        let bus = WorkerPoolEventBus::new(2, 16);
        let (handler, seen) = counting("Counting");
        bus.subscribe("thing.happened", handler);

        for _ in 0..10 {
            bus.publish(event("thing.happened")).unwrap();
        }
        bus.start().unwrap();
        bus.stop().await;

        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let bus = WorkerPoolEventBus::new(1, 4);
        bus.start().unwrap();

        bus.stop().await;
        bus.stop().await;

        assert!(bus.is_stopped());
    }

    #[tokio::test]
    async fn stop_without_start_discards_queue() {
        let bus = WorkerPoolEventBus::new(1, 4);
        let (handler, seen) = counting("Counting");
        bus.subscribe("thing.happened", handler);
        bus.publish(event("thing.happened")).unwrap();

        bus.stop().await;

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(matches!(
            bus.publish(event("thing.happened")),
            Err(EventBusError::Closed)
        ));
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_siblings() {
        let bus = WorkerPoolEventBus::new(1, 4);
        let (after, seen) = counting("After");
        bus.subscribe("thing.happened", Arc::new(Failing));
        bus.subscribe("thing.happened", after);
        bus.start().unwrap();

        bus.publish(event("thing.happened")).unwrap();
        bus.stop().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handlers_only_see_their_event_type() {
        let bus = WorkerPoolEventBus::new(1, 4);
        let (handler, seen) = counting("Counting");
        bus.subscribe("a", handler);
        bus.start().unwrap();

        bus.publish(event("b")).unwrap();
        bus.publish(event("a")).unwrap();
        bus.stop().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_sync_runs_in_order_and_stops_at_first_error() {
        let bus = WorkerPoolEventBus::new(1, 4);
        let (before, before_seen) = counting("Before");
        let (after, after_seen) = counting("After");
        bus.subscribe("thing.happened", before);
        bus.subscribe("thing.happened", Arc::new(Failing));
        bus.subscribe("thing.happened", after);

        let result = bus.publish_sync(event("thing.happened")).await;

        assert!(matches!(
            result,
            Err(EventBusError::Handler { handler: "Failing", .. })
        ));
        assert_eq!(before_seen.load(Ordering::SeqCst), 1);
        assert_eq!(after_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn publish_sync_without_handlers_is_ok() {
        let bus = WorkerPoolEventBus::new(1, 4);
        assert!(bus.publish_sync(event("nobody.listens")).await.is_ok());
    }

    #[tokio::test]
    async fn publish_sync_after_stop_is_closed() {
        let bus = WorkerPoolEventBus::new(1, 4);
        bus.stop().await;

        assert!(matches!(
            bus.publish_sync(event("thing.happened")).await,
            Err(EventBusError::Closed)
        ));
    }

    #[tokio::test]
    async fn subscribe_all_registers_one_instance_per_type() {
        let bus = WorkerPoolEventBus::new(1, 4);
        let (handler, seen) = counting("Counting");
        bus.subscribe_all(&["a", "b"], handler);
        bus.start().unwrap();

        bus.publish(event("a")).unwrap();
        bus.publish(event("b")).unwrap();
        tokio::time::timeout(Duration::from_secs(1), bus.stop())
            .await
            .unwrap();

        assert_eq!(bus.handler_count("a"), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    struct Slow {
        delay: Duration,
        done: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for Slow {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            tokio::time::sleep(self.delay).await;
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    fn slow(delay: Duration) -> (Arc<Slow>, Arc<AtomicUsize>) {
        let done = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Slow {
                delay,
                done: Arc::clone(&done),
            }),
            done,
        )
    }

    #[tokio::test]
    async fn concurrent_stop_waits_for_drain() {
        let bus = Arc::new(WorkerPoolEventBus::new(1, 8));
        let (handler, done) = slow(Duration::from_millis(30));
        bus.subscribe("thing.happened", handler);
        for _ in 0..3 {
            bus.publish(event("thing.happened")).unwrap();
        }
        bus.start().unwrap();

        let first = tokio::spawn({
            let bus = Arc::clone(&bus);
            async move { bus.stop().await }
        });
        while !bus.is_stopped() {
            tokio::task::yield_now().await;
        }

        bus.stop().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        first.await.unwrap();
    }

    #[tokio::test]
    async fn stop_within_drains_when_handlers_are_quick() {
        let bus = WorkerPoolEventBus::new(2, 8);
        let (handler, seen) = counting("Counting");
        bus.subscribe("thing.happened", handler);
        bus.start().unwrap();
        bus.publish(event("thing.happened")).unwrap();

        assert!(bus.stop_within(Duration::from_secs(5)).await);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_within_cancels_hung_handlers() {
        let bus = WorkerPoolEventBus::new(1, 8);
        let (handler, done) = slow(Duration::from_secs(30));
        bus.subscribe("thing.happened", handler);
        bus.start().unwrap();
        bus.publish(event("thing.happened")).unwrap();
        bus.publish(event("thing.happened")).unwrap();

        let drained = tokio::time::timeout(
            Duration::from_secs(2),
            bus.stop_within(Duration::from_millis(50)),
        )
        .await
        .expect("stop_within must not wait for a hung handler");

        assert!(!drained);
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert!(bus.is_stopped());
        // A later caller sees the same outcome.
        assert!(!bus.stop_within(Duration::from_millis(50)).await);
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(literal.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
