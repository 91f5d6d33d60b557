//! Aggregated health reporting.
//!
//! The daemon is healthy when the broadcast hub is running, the last scan
//! did not fail and at least one provider is connected. The overall status
//! is the worst status among the components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use skywatch_broadcast::HubStats;
use skywatch_core::ProviderAccount;
use skywatch_inventory::{ScanOutcome, ScanStatus};

/// Health of one component, or of the whole daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonHealth {
    /// Worst status of all components.
    pub status: HealthStatus,
    /// Seconds since the daemon started.
    pub uptime_secs: u64,
    /// Per-component reports.
    pub components: Vec<ComponentHealth>,
    /// Hub delivery counters.
    pub broadcast: HubStats,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "broadcast-hub", "scanner").
    pub name: String,
    /// Current health status of the component.
    pub status: HealthStatus,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_owned(),
            status,
        }
    }
}

/// Hub health: unhealthy once its loop has exited.
pub fn hub_health(closed: bool) -> ComponentHealth {
    let status = if closed {
        HealthStatus::Unhealthy("event loop stopped".to_owned())
    } else {
        HealthStatus::Healthy
    };
    ComponentHealth::new("broadcast-hub", status)
}

/// Scanner health, derived from the last finished job.
pub fn scanner_health(status: &ScanStatus) -> ComponentHealth {
    let health = match status.outcome {
        _ if status.running => HealthStatus::Healthy,
        Some(ScanOutcome::Failed) => HealthStatus::Degraded(format!(
            "last scan failed: {}",
            status.message
        )),
        _ if !status.failed_providers.is_empty() => {
            let failed: Vec<&str> = status
                .failed_providers
                .iter()
                .map(|p| p.as_str())
                .collect();
            HealthStatus::Degraded(format!("last scan missed {}", failed.join(", ")))
        }
        _ => HealthStatus::Healthy,
    };
    ComponentHealth::new("scanner", health)
}

/// Provider health: degraded while nothing is connected.
pub fn providers_health(accounts: &[ProviderAccount]) -> ComponentHealth {
    let status = if accounts.iter().any(|a| a.is_connected) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded("no provider connected".to_owned())
    };
    ComponentHealth::new("providers", status)
}

/// Aggregate component statuses into one.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for component in components {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", component.name, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                if !worst.is_unhealthy() {
                    reasons.clear();
                }
                reasons.push(format!("{}: {}", component.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

/// Build the full report.
pub fn report(
    uptime_secs: u64,
    hub_closed: bool,
    broadcast: HubStats,
    scan: &ScanStatus,
    accounts: &[ProviderAccount],
) -> DaemonHealth {
    let components = vec![
        hub_health(hub_closed),
        scanner_health(scan),
        providers_health(accounts),
    ];
    DaemonHealth {
        status: aggregate_status(&components),
        uptime_secs,
        components,
        broadcast,
    }
}
