//! The broadcast hub event loop.
//!
//! One task owns the subscriber map. Everything else talks to it through
//! three queues:
//!
//! ```text
//! HubHandle::subscribe ──register (bounded, acked)──┐
//! Subscription::drop   ──unregister (unbounded)─────┼──> hub loop ──try_send──> outbox ──> Subscription
//! HubHandle::publish   ──publish (bounded)──────────┘        (drop on full, evict on closed/too slow)
//! ```
//!
//! The loop never awaits a subscriber. A full outbox drops that delivery for
//! that subscriber only.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use skywatch_core::error::BroadcastError;
use skywatch_core::event::{BroadcastEvent, EventSink};
use skywatch_core::metrics as m;
use skywatch_core::types::{BoxFuture, TenantId};

use crate::config::HubConfig;
use crate::subscription::Subscription;

/// Point-in-time hub counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    subscribers: AtomicUsize,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    evicted: AtomicU64,
}

struct Registration {
    id: String,
    tenant: TenantId,
    outbox: mpsc::Sender<BroadcastEvent>,
    ack: oneshot::Sender<()>,
}

struct Subscriber {
    tenant: TenantId,
    outbox: mpsc::Sender<BroadcastEvent>,
    consecutive_drops: u32,
}

/// Spawns the hub loop.
pub struct BroadcastHub;

impl BroadcastHub {
    /// Start the loop. It runs until `shutdown_rx` fires or every handle is
    /// dropped; on exit every outbox is closed.
    pub fn spawn(
        config: HubConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (register_tx, register_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let hub = HubLoop {
            subscribers: HashMap::new(),
            next_sequence: 0,
            max_consecutive_drops: config.max_consecutive_drops,
            counters: Arc::clone(&counters),
        };
        let task = tokio::spawn(hub.run(register_rx, unregister_rx, publish_rx, shutdown_rx));

        let handle = HubHandle {
            register_tx,
            unregister_tx,
            publish_tx,
            counters,
            outbox_capacity: config.outbox_capacity.max(1),
        };
        (handle, task)
    }
}

struct HubLoop {
    subscribers: HashMap<String, Subscriber>,
    next_sequence: u64,
    max_consecutive_drops: u32,
    counters: Arc<Counters>,
}

impl HubLoop {
    async fn run(
        mut self,
        mut register_rx: mpsc::Receiver<Registration>,
        mut unregister_rx: mpsc::UnboundedReceiver<String>,
        mut publish_rx: mpsc::Receiver<BroadcastEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(
            max_consecutive_drops = self.max_consecutive_drops,
            "broadcast hub started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("broadcast hub shutting down");
                    break;
                }
                Some(id) = unregister_rx.recv() => self.unregister(&id),
                Some(registration) = register_rx.recv() => self.register(registration),
                event = publish_rx.recv() => match event {
                    Some(event) => self.deliver(event),
                    None => {
                        debug!("all hub handles dropped");
                        break;
                    }
                },
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        self.sync_subscriber_count();
        info!(closed_subscribers = remaining, "broadcast hub stopped");
    }

    fn register(&mut self, registration: Registration) {
        let Registration {
            id,
            tenant,
            outbox,
            ack,
        } = registration;

        // The outbox is fresh and at least one slot deep.
        if outbox.try_send(BroadcastEvent::connected(&id, tenant)).is_err() {
            debug!(subscriber_id = %id, "subscriber gone before registration");
            return;
        }
        if ack.send(()).is_err() {
            debug!(subscriber_id = %id, "subscribe call abandoned, not registering");
            return;
        }

        self.subscribers.insert(
            id.clone(),
            Subscriber {
                tenant,
                outbox,
                consecutive_drops: 0,
            },
        );
        self.sync_subscriber_count();
        debug!(subscriber_id = %id, tenant = %tenant, "subscriber registered");
    }

    fn unregister(&mut self, id: &str) {
        if self.subscribers.remove(id).is_some() {
            self.sync_subscriber_count();
            debug!(subscriber_id = %id, "subscriber unregistered");
        } else {
            debug!(subscriber_id = %id, "unregister for unknown subscriber ignored");
        }
    }

    fn deliver(&mut self, mut event: BroadcastEvent) {
        self.next_sequence += 1;
        event.sequence = self.next_sequence;
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            m::BROADCAST_EVENTS_PUBLISHED_TOTAL,
            m::LABEL_EVENT => event.kind.as_str()
        )
        .increment(1);

        let mut gone = Vec::new();
        for (id, subscriber) in &mut self.subscribers {
            if !event.is_visible_to(subscriber.tenant) {
                continue;
            }
            match subscriber.outbox.try_send(event.clone()) {
                Ok(()) => {
                    subscriber.consecutive_drops = 0;
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    subscriber.consecutive_drops += 1;
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::BROADCAST_EVENTS_DROPPED_TOTAL).increment(1);
                    debug!(
                        subscriber_id = %id,
                        event = %event,
                        consecutive_drops = subscriber.consecutive_drops,
                        "outbox full, event dropped for subscriber"
                    );
                    if self.max_consecutive_drops > 0
                        && subscriber.consecutive_drops >= self.max_consecutive_drops
                    {
                        warn!(
                            subscriber_id = %id,
                            consecutive_drops = subscriber.consecutive_drops,
                            "subscriber too slow, disconnecting"
                        );
                        self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!(m::BROADCAST_SUBSCRIBERS_EVICTED_TOTAL).increment(1);
                        gone.push(id.clone());
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = %id, "outbox closed, removing subscriber");
                    gone.push(id.clone());
                }
            }
        }

        if !gone.is_empty() {
            for id in &gone {
                self.subscribers.remove(id);
            }
            self.sync_subscriber_count();
        }
    }

    fn sync_subscriber_count(&self) {
        let count = self.subscribers.len();
        self.counters.subscribers.store(count, Ordering::Relaxed);
        metrics::gauge!(m::BROADCAST_SUBSCRIBERS).set(count as f64);
    }
}

/// Cloneable access to a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::UnboundedSender<String>,
    publish_tx: mpsc::Sender<BroadcastEvent>,
    counters: Arc<Counters>,
    outbox_capacity: usize,
}

impl HubHandle {
    /// Register a new subscriber for `tenant`.
    ///
    /// Returns once the hub has registered it: every event published after
    /// this call returns is offered to the new subscriber.
    pub async fn subscribe(&self, tenant: TenantId) -> Result<Subscription, BroadcastError> {
        let id = Uuid::new_v4().to_string();
        let (outbox_tx, outbox_rx) = mpsc::channel(self.outbox_capacity);
        let (ack_tx, ack_rx) = oneshot::channel();

        self.register_tx
            .send(Registration {
                id: id.clone(),
                tenant,
                outbox: outbox_tx,
                ack: ack_tx,
            })
            .await
            .map_err(|_| BroadcastError::HubClosed)?;
        ack_rx.await.map_err(|_| BroadcastError::HubClosed)?;

        Ok(Subscription::new(
            id,
            tenant,
            outbox_rx,
            self.unregister_tx.clone(),
        ))
    }

    /// Queue an event, waiting for space in the publish queue.
    pub async fn publish(&self, event: BroadcastEvent) -> Result<(), BroadcastError> {
        self.publish_tx
            .send(event)
            .await
            .map_err(|_| BroadcastError::HubClosed)
    }

    /// Queue an event without waiting.
    pub fn try_publish(&self, event: BroadcastEvent) -> Result<(), BroadcastError> {
        self.publish_tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => BroadcastError::QueueFull,
            TrySendError::Closed(_) => BroadcastError::HubClosed,
        })
    }

    /// Unregister by id. Unknown ids are ignored.
    pub fn unregister(&self, subscriber_id: &str) {
        // a stopped hub has no subscribers left to remove
        let _ = self.unregister_tx.send(subscriber_id.to_owned());
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    /// Whether the hub loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.publish_tx.is_closed()
    }
}

impl EventSink for HubHandle {
    fn publish(&self, event: BroadcastEvent) -> BoxFuture<'_, Result<(), BroadcastError>> {
        Box::pin(HubHandle::publish(self, event))
    }
}
