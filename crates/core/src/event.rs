//! Broadcast events.
//!
//! [`BroadcastEvent`] is the single message type that flows from producers
//! (the scan orchestrator, the provider API) through the broadcast hub to live
//! subscribers. Events are ephemeral: they exist only while being delivered.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::BroadcastError;
use crate::types::{BoxFuture, ProviderId, TenantId};

/// Event type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First event on every new subscription.
    Connected,
    /// A scan job was accepted.
    ScanStarted,
    /// A scan job advanced past one provider.
    ScanProgress,
    /// Terminal event of a scan job.
    ScanCompleted,
    /// The inventory changed between two snapshots.
    DriftDetected,
    /// A provider was connected.
    ProviderConnected,
    /// A provider was disconnected.
    ProviderDisconnected,
}

impl EventKind {
    /// Wire name, also used as the SSE `event:` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::ScanStarted => "scan_started",
            Self::ScanProgress => "scan_progress",
            Self::ScanCompleted => "scan_completed",
            Self::DriftDetected => "drift_detected",
            Self::ProviderConnected => "provider_connected",
            Self::ProviderDisconnected => "provider_disconnected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event distributed by the broadcast hub.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEvent {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event-specific data.
    pub payload: Value,
    /// Tenant the event is addressed to. `None` or tenant 0 reaches everyone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tenant: Option<TenantId>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Hub-assigned sequence number, 0 until published.
    pub sequence: u64,
}

impl BroadcastEvent {
    /// Untargeted event.
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            target_tenant: None,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    /// Address the event to one tenant. Tenant 0 keeps it untargeted.
    pub fn for_tenant(mut self, tenant: TenantId) -> Self {
        self.target_tenant = (!tenant.is_all()).then_some(tenant);
        self
    }

    /// Whether a subscriber of `tenant` should receive this event.
    pub fn is_visible_to(&self, tenant: TenantId) -> bool {
        match self.target_tenant {
            None => true,
            Some(target) => target.is_all() || target == tenant,
        }
    }

    /// `connected` greeting carrying the new subscriber's id.
    pub fn connected(subscriber_id: &str, tenant: TenantId) -> Self {
        Self::new(
            EventKind::Connected,
            json!({ "subscriberId": subscriber_id, "tenantId": tenant }),
        )
    }

    /// `scan_started` for a freshly accepted job.
    pub fn scan_started(job_id: &str, providers: &[ProviderId]) -> Self {
        Self::new(
            EventKind::ScanStarted,
            json!({ "jobId": job_id, "providers": providers }),
        )
    }

    /// `scan_progress` after one provider has been attempted.
    pub fn scan_progress(
        job_id: &str,
        provider: ProviderId,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            EventKind::ScanProgress,
            json!({
                "jobId": job_id,
                "provider": provider,
                "progress": progress,
                "message": message.into(),
            }),
        )
    }

    /// `scan_completed`, the terminal event of a job. `status` is the final
    /// serialized job status.
    pub fn scan_completed(status: Value) -> Self {
        Self::new(EventKind::ScanCompleted, status)
    }

    /// `drift_detected` with a serialized drift report.
    pub fn drift_detected(report: Value) -> Self {
        Self::new(EventKind::DriftDetected, report)
    }

    /// `provider_connected` / `provider_disconnected`.
    pub fn provider_changed(provider: ProviderId, connected: bool) -> Self {
        let kind = if connected {
            EventKind::ProviderConnected
        } else {
            EventKind::ProviderDisconnected
        };
        Self::new(kind, json!({ "provider": provider }))
    }
}

impl fmt::Display for BroadcastEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_tenant {
            Some(tenant) => write!(f, "{}#{} tenant={}", self.kind, self.sequence, tenant),
            None => write!(f, "{}#{} tenant=all", self.kind, self.sequence),
        }
    }
}

/// Destination for published events.
///
/// Implemented by the broadcast hub handle. Producers only see this trait, so
/// the scan orchestrator can be driven in tests with a plain channel.
pub trait EventSink: Send + Sync {
    /// Hand an event over for delivery. Resolves once the event is queued,
    /// never once it is delivered.
    fn publish(&self, event: BroadcastEvent) -> BoxFuture<'_, Result<(), BroadcastError>>;
}

impl EventSink for mpsc::Sender<BroadcastEvent> {
    fn publish(&self, event: BroadcastEvent) -> BoxFuture<'_, Result<(), BroadcastError>> {
        Box::pin(async move { self.send(event).await.map_err(|_| BroadcastError::HubClosed) })
    }
}
