//! Publish/subscribe fan-out of pipeline events.

use crate::core::PipelineEvent;
use crate::events::EventSink;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What to do when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room (default).
    #[default]
    DropOldest,
    /// Suspend the publisher until the subscriber frees space.
    Block,
}

/// Event bus configuration.
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    /// Per-subscriber queue capacity.
    pub capacity: usize,
    /// Overflow policy applied to every subscriber.
    pub policy: OverflowPolicy,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Counters for bus monitoring.
#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
}

impl BusMetrics {
    /// Number of events published to the bus.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of events evicted from subscriber queues.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct SubscriberQueue {
    queue: Mutex<VecDeque<PipelineEvent>>,
    /// Wakes the subscriber when an event arrives or the queue closes.
    ready: tokio::sync::Notify,
    /// Wakes a blocked publisher when space frees up.
    space: tokio::sync::Notify,
    closed: AtomicBool,
}

impl SubscriberQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            ready: tokio::sync::Notify::new(),
            space: tokio::sync::Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.ready.notify_waiters();
        self.space.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A handle to one subscriber's event queue.
///
/// Dropping the subscription closes the queue; a publisher blocked on it is
/// released.
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// The subscriber's identity, usable with [`EventBus::unsubscribe`].
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<PipelineEvent> {
        loop {
            // Register interest before checking to avoid a missed wakeup.
            let ready = self.queue.ready.notified();
            {
                let mut queue = self.queue.queue.lock();
                if let Some(event) = queue.pop_front() {
                    drop(queue);
                    self.queue.space.notify_one();
                    return Some(event);
                }
            }
            if self.queue.is_closed() {
                return None;
            }
            ready.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// Fan-out bus delivering events to zero or more subscribers.
///
/// Per-producer ordering is preserved: events published by one task arrive at
/// every subscriber in publication order. A slow subscriber never stalls the
/// publisher indefinitely under [`OverflowPolicy::DropOldest`]; under
/// [`OverflowPolicy::Block`] the publisher waits for space.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<u64, Arc<SubscriberQueue>>>,
    next_id: AtomicU64,
    config: EventBusConfig,
    metrics: BusMetrics,
}

impl EventBus {
    /// Creates a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Creates a bus with an explicit configuration.
    #[must_use]
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            config,
            metrics: BusMetrics::default(),
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = SubscriberQueue::new();
        self.subscribers.write().insert(id, queue.clone());
        Subscription { id, queue }
    }

    /// Removes and closes a subscriber.
    pub fn unsubscribe(&self, id: u64) {
        if let Some(queue) = self.subscribers.write().remove(&id) {
            queue.close();
        }
    }

    /// Publishes an event to every live subscriber.
    pub async fn publish(&self, event: PipelineEvent) {
        // Prune subscribers whose handle was dropped.
        self.subscribers.write().retain(|_, q| !q.is_closed());

        let queues: Vec<Arc<SubscriberQueue>> =
            self.subscribers.read().values().cloned().collect();

        for queue in queues {
            match self.config.policy {
                OverflowPolicy::DropOldest => {
                    {
                        let mut q = queue.queue.lock();
                        if q.len() >= self.config.capacity {
                            q.pop_front();
                            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        q.push_back(event.clone());
                    }
                    queue.ready.notify_one();
                }
                OverflowPolicy::Block => loop {
                    let space = queue.space.notified();
                    {
                        let mut q = queue.queue.lock();
                        if q.len() < self.config.capacity {
                            q.push_back(event.clone());
                            drop(q);
                            queue.ready.notify_one();
                            break;
                        }
                    }
                    if queue.is_closed() {
                        break;
                    }
                    space.await;
                },
            }
        }
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Attaches a sink on its own task, returning the forwarder handle.
    ///
    /// The task ends when the bus is closed and the sink has drained its
    /// queue. Fan-out through a task keeps a slow sink from stalling stage
    /// execution.
    pub fn attach(&self, sink: Arc<dyn EventSink>) -> tokio::task::JoinHandle<()> {
        let subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                sink.accept(&event).await;
            }
        })
    }

    /// Closes every subscriber queue. Subscribers drain what is already
    /// queued, then see end-of-stream.
    pub fn close(&self) {
        for queue in self.subscribers.write().drain().map(|(_, q)| q) {
            queue.close();
        }
    }

    /// Bus counters.
    #[must_use]
    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
