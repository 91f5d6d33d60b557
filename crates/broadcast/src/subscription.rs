//! Subscriber side of the hub.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use skywatch_core::event::BroadcastEvent;
use skywatch_core::types::TenantId;

/// A live subscription: the receiving end of one subscriber's outbox.
///
/// The first item is always the `connected` greeting. The stream ends when
/// the hub evicts the subscriber or shuts down. Dropping the subscription
/// unregisters it.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    tenant: TenantId,
    outbox: mpsc::Receiver<BroadcastEvent>,
    unregister_tx: mpsc::UnboundedSender<String>,
    unregistered: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        tenant: TenantId,
        outbox: mpsc::Receiver<BroadcastEvent>,
        unregister_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            tenant,
            outbox,
            unregister_tx,
            unregistered: false,
        }
    }

    /// Subscriber id, also carried in the `connected` greeting.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Next event, or `None` once the hub has let go of this subscriber.
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.outbox.recv().await
    }

    /// Ask the hub to forget this subscriber. Safe to call repeatedly.
    pub fn unregister(&mut self) {
        if self.unregistered {
            return;
        }
        self.unregistered = true;
        // a closed hub has already forgotten everyone
        if self.unregister_tx.send(self.id.clone()).is_err() {
            debug!(subscriber_id = %self.id, "hub already stopped");
        }
    }
}

impl Stream for Subscription {
    type Item = BroadcastEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().outbox.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unregister();
    }
}
