//! Scan orchestration.
//!
//! [`ScanOrchestrator`] owns the single shared [`ScanStatus`] and drives at
//! most one job at a time.
//!
//! # Job flow
//!
//! ```text
//! start() ──lock──> Running ──spawn──> run_job
//!                                        │ list_connected()       (provider set fixed here)
//!                                        │ scan_started
//!                                        │ for each provider:
//!                                        │   fetch (deadline, cancel token)
//!                                        │   progress ──lock──> scan_progress
//!                                        │ store.replace()        (one pointer swap)
//!                                        │ mark_synced, drift_detected
//!                                        └─lock──> Completed ──> scan_completed
//! ```
//!
//! The status lock is only ever held for field updates. Fetches and event
//! publication happen with it released.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use skywatch_core::event::{BroadcastEvent, EventSink};
use skywatch_core::metrics as m;
use skywatch_core::types::{ProviderAccount, ProviderId, Resource, TenantId};

use crate::config::InventoryConfig;
use crate::drift::DriftReport;
use crate::error::{FetchError, StoreError};
use crate::fetcher::{Fetcher, FetcherSet};
use crate::registry::ProviderRegistry;
use crate::store::{ResourceSnapshot, ResourceStore};

/// Lifecycle phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// No job has run since startup.
    Idle,
    /// A job is in flight.
    Running,
    /// The last job finished; its status stays until the next start.
    Completed,
}

/// How a completed job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Every provider was attempted and the snapshot was published.
    Succeeded,
    /// Cancelled before all providers were attempted. Inventory unchanged.
    Aborted,
    /// The snapshot could not be published. Inventory unchanged.
    Failed,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// Status of the current or most recent job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub job_id: Option<String>,
    pub phase: ScanPhase,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 0-100, never decreases within a job.
    pub progress: u8,
    /// Filled in on completion.
    pub num_resources: usize,
    /// Filled in on completion. Failed and skipped providers count 0.
    pub provider_counts: BTreeMap<ProviderId, usize>,
    /// Providers whose fetch failed or timed out.
    pub failed_providers: Vec<ProviderId>,
    pub outcome: Option<ScanOutcome>,
    /// Tenant that triggered the job.
    pub tenant: TenantId,
    pub message: String,
}

impl ScanStatus {
    /// Status before the first job.
    pub fn idle() -> Self {
        Self {
            job_id: None,
            phase: ScanPhase::Idle,
            running: false,
            started_at: None,
            completed_at: None,
            progress: 0,
            num_resources: 0,
            provider_counts: BTreeMap::new(),
            failed_providers: Vec::new(),
            outcome: None,
            tenant: TenantId::ALL,
            message: "no scan has run yet".to_owned(),
        }
    }

    fn started(job_id: String, tenant: TenantId) -> Self {
        Self {
            job_id: Some(job_id),
            phase: ScanPhase::Running,
            running: true,
            started_at: Some(Utc::now()),
            message: "scan started".to_owned(),
            tenant,
            ..Self::idle()
        }
    }
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::idle()
    }
}

/// Result of [`ScanOrchestrator::start`].
#[derive(Debug, Clone)]
pub struct ScanTicket {
    /// True if this call created the job, false if one was already running.
    pub accepted: bool,
    /// Status right after the call.
    pub status: ScanStatus,
}

struct ActiveJob {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct ScanState {
    status: ScanStatus,
    active: Option<ActiveJob>,
}

/// What a job collected before concluding.
#[derive(Default)]
struct Tally {
    resources: Vec<Resource>,
    counts: BTreeMap<ProviderId, usize>,
    failed: Vec<ProviderId>,
    /// Providers fetched successfully, with the connection generation used.
    synced: Vec<(ProviderId, u64)>,
    attempted: usize,
}

/// Single-flight scan driver.
pub struct ScanOrchestrator {
    config: InventoryConfig,
    registry: Arc<ProviderRegistry>,
    fetchers: FetcherSet,
    store: Arc<ResourceStore>,
    events: Arc<dyn EventSink>,
    shutdown: CancellationToken,
    state: Mutex<ScanState>,
}

impl ScanOrchestrator {
    pub fn new(
        config: InventoryConfig,
        registry: Arc<ProviderRegistry>,
        fetchers: FetcherSet,
        store: Arc<ResourceStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            registry,
            fetchers,
            store,
            events,
            shutdown: CancellationToken::new(),
            state: Mutex::new(ScanState {
                status: ScanStatus::idle(),
                active: None,
            }),
        }
    }

    /// Start a job unless one is running.
    ///
    /// Never fails: a second caller gets the in-flight status with
    /// `accepted == false`. Must be called inside a tokio runtime.
    pub fn start(self: &Arc<Self>, tenant: TenantId) -> ScanTicket {
        let mut state = self.state.lock();
        if state.status.running || self.shutdown.is_cancelled() {
            debug!(
                job_id = ?state.status.job_id,
                running = state.status.running,
                "scan start ignored"
            );
            return ScanTicket {
                accepted: false,
                status: state.status.clone(),
            };
        }

        let job_id = Uuid::new_v4().to_string();
        let cancel = self.shutdown.child_token();
        state.status = ScanStatus::started(job_id.clone(), tenant);
        state.active = Some(ActiveJob {
            cancel: cancel.clone(),
            task: None,
        });
        let status = state.status.clone();
        drop(state);

        let task = tokio::spawn(Arc::clone(self).run_job(job_id.clone(), tenant, cancel));
        let mut state = self.state.lock();
        if state.status.job_id.as_deref() == Some(job_id.as_str()) {
            if let Some(job) = state.active.as_mut() {
                job.task = Some(task);
            }
        }
        drop(state);

        metrics::gauge!(m::SCAN_PROGRESS).set(0.0);
        info!(job_id = %job_id, tenant = %tenant, "scan accepted");
        ScanTicket {
            accepted: true,
            status,
        }
    }

    /// Copy of the current status.
    pub fn status(&self) -> ScanStatus {
        self.state.lock().status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().status.running
    }

    /// Abort the running job. Returns false if there is none or it is
    /// already being aborted.
    pub fn cancel(&self) -> bool {
        let state = self.state.lock();
        match &state.active {
            Some(job) if state.status.running && !job.cancel.is_cancelled() => {
                job.cancel.cancel();
                info!(job_id = ?state.status.job_id, "scan cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Refuse new jobs, abort the running one and wait for it to conclude.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        loop {
            let (task, running) = {
                let mut state = self.state.lock();
                let running = state.status.running;
                (state.active.as_mut().and_then(|job| job.task.take()), running)
            };
            match task {
                Some(task) => {
                    if let Err(e) = task.await {
                        error!(error = %e, "scan task did not finish cleanly");
                    }
                    return;
                }
                // `start` has spawned the job but not yet stored its handle.
                None if running => tokio::task::yield_now().await,
                None => return,
            }
        }
    }

    async fn run_job(self: Arc<Self>, job_id: String, tenant: TenantId, cancel: CancellationToken) {
        let clock = Instant::now();
        let deadline = clock + self.config.job_timeout;
        let accounts = self.registry.list_connected();
        let providers: Vec<ProviderId> = accounts.iter().map(|a| a.id).collect();
        let total = accounts.len();

        info!(job_id = %job_id, providers = total, "scan running");
        self.emit(BroadcastEvent::scan_started(&job_id, &providers).for_tenant(tenant))
            .await;

        let mut tally = Tally::default();
        let mut aborted = false;

        for account in &accounts {
            if cancel.is_cancelled() {
                aborted = true;
                break;
            }
            let provider = account.id;

            let message = match self.fetchers.get(provider) {
                None => {
                    debug!(job_id = %job_id, provider = %provider, "no fetcher registered, skipping");
                    tally.counts.insert(provider, 0);
                    format!("{provider}: no fetcher registered, skipped")
                }
                Some(fetcher) => {
                    let budget = self
                        .config
                        .fetch_timeout
                        .min(deadline.saturating_duration_since(Instant::now()));
                    match fetch_bounded(fetcher.as_ref(), account, budget, &cancel).await {
                        Ok(resources) => {
                            let count = resources.len();
                            debug!(job_id = %job_id, provider = %provider, count, "provider fetched");
                            tally.counts.insert(provider, count);
                            tally.synced.push((provider, account.generation));
                            tally.resources.extend(resources);
                            format!("{provider}: {count} resources")
                        }
                        Err(FetchError::Cancelled) if cancel.is_cancelled() => {
                            aborted = true;
                            break;
                        }
                        Err(e) => {
                            warn!(job_id = %job_id, provider = %provider, error = %e, "provider fetch failed");
                            metrics::counter!(
                                m::SCAN_FETCH_FAILURES_TOTAL,
                                m::LABEL_PROVIDER => provider.as_str()
                            )
                            .increment(1);
                            tally.counts.insert(provider, 0);
                            tally.failed.push(provider);
                            format!("{provider}: failed ({e})")
                        }
                    }
                }
            };

            tally.attempted += 1;
            let progress = progress_after(tally.attempted, total);
            self.advance(&job_id, progress, &message);
            self.emit(
                BroadcastEvent::scan_progress(&job_id, provider, progress, message).for_tenant(tenant),
            )
            .await;
        }

        let (outcome, message) = if aborted {
            info!(job_id = %job_id, attempted = tally.attempted, total, "scan aborted");
            (
                ScanOutcome::Aborted,
                format!(
                    "scan aborted after {} of {} providers; previous inventory kept",
                    tally.attempted, total
                ),
            )
        } else {
            match self.publish_snapshot(&job_id, tenant, &mut tally).await {
                Ok(()) => (
                    ScanOutcome::Succeeded,
                    completion_message(&tally, total),
                ),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "snapshot rejected, keeping previous inventory");
                    (
                        ScanOutcome::Failed,
                        format!("scan failed: {e}; previous inventory kept"),
                    )
                }
            }
        };

        let status = self.conclude(&job_id, outcome, message, tally);
        let elapsed = clock.elapsed();

        metrics::counter!(m::SCAN_JOBS_TOTAL, m::LABEL_OUTCOME => outcome.as_str()).increment(1);
        metrics::histogram!(m::SCAN_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(
            job_id = %job_id,
            outcome = outcome.as_str(),
            resources = status.num_resources,
            failed = status.failed_providers.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan completed"
        );

        let payload = serde_json::to_value(&status).unwrap_or_default();
        self.emit(BroadcastEvent::scan_completed(payload).for_tenant(tenant))
            .await;
    }

    /// Swap the aggregate into the store, stamp `last_synced` and report drift.
    async fn publish_snapshot(
        &self,
        job_id: &str,
        tenant: TenantId,
        tally: &mut Tally,
    ) -> Result<(), StoreError> {
        let resources = std::mem::take(&mut tally.resources);
        let next = Arc::new(ResourceSnapshot::new(job_id, resources));
        let previous = self.store.replace(Arc::clone(&next))?;
        metrics::gauge!(m::SCAN_SNAPSHOT_RESOURCES).set(next.len() as f64);

        let synced_at = next.taken_at();
        for (provider, generation) in &tally.synced {
            if !self.registry.mark_synced(*provider, *generation, synced_at) {
                debug!(job_id = %job_id, provider = %provider, "provider reconnected or disconnected during scan, last_synced untouched");
            }
        }

        // The startup snapshot is not an observed inventory; diffing against
        // it would report everything as added.
        if previous.job_id().is_some() {
            let observed: Vec<ProviderId> = tally.synced.iter().map(|(p, _)| *p).collect();
            let drift = DriftReport::between_observed(&previous, &next, &observed);
            if !drift.is_empty() {
                info!(
                    job_id = %job_id,
                    added = drift.added.len(),
                    removed = drift.removed.len(),
                    changed = drift.changed.len(),
                    "inventory drift detected"
                );
                let payload = serde_json::to_value(&drift).unwrap_or_default();
                self.emit(BroadcastEvent::drift_detected(payload).for_tenant(tenant))
                    .await;
            }
        }

        Ok(())
    }

    fn advance(&self, job_id: &str, progress: u8, message: &str) {
        let mut state = self.state.lock();
        if state.status.job_id.as_deref() == Some(job_id) {
            state.status.progress = state.status.progress.max(progress);
            state.status.message = message.to_owned();
        }
        drop(state);
        metrics::gauge!(m::SCAN_PROGRESS).set(f64::from(progress));
    }

    fn conclude(
        &self,
        job_id: &str,
        outcome: ScanOutcome,
        message: String,
        tally: Tally,
    ) -> ScanStatus {
        let num_resources = tally.counts.values().sum();
        let mut state = self.state.lock();
        let status = &mut state.status;
        if status.job_id.as_deref() == Some(job_id) {
            status.running = false;
            status.phase = ScanPhase::Completed;
            status.completed_at = Some(Utc::now());
            status.outcome = Some(outcome);
            status.provider_counts = tally.counts;
            status.num_resources = num_resources;
            status.failed_providers = tally.failed;
            status.message = message;
            if outcome != ScanOutcome::Aborted {
                status.progress = 100;
            }
        }
        let status = status.clone();
        state.active = None;
        status
    }

    async fn emit(&self, event: BroadcastEvent) {
        let kind = event.kind;
        if let Err(e) = self.events.publish(event).await {
            warn!(event = %kind, error = %e, "failed to publish event");
        }
    }
}

/// Run one fetch bounded by `budget` and the job's cancellation token.
async fn fetch_bounded(
    fetcher: &dyn Fetcher,
    account: &ProviderAccount,
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<Resource>, FetchError> {
    let credentials = account.credentials.clone().unwrap_or_default();
    let token = cancel.child_token();
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        outcome = tokio::time::timeout(budget, fetcher.fetch(&credentials, token.clone())) => {
            match outcome {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    provider: account.id,
                    elapsed: budget,
                }),
            }
        }
    };
    // stop anything the fetcher left running
    token.cancel();
    result
}

/// Progress after `done` of `total` providers: `done * (100 / total)`, with
/// the last provider landing on exactly 100.
fn progress_after(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let step = 100 / total;
    u8::try_from(done * step).unwrap_or(100)
}

fn completion_message(tally: &Tally, total: usize) -> String {
    let resources: usize = tally.counts.values().sum();
    if tally.failed.is_empty() {
        format!("scan completed: {resources} resources from {total} providers")
    } else {
        format!(
            "scan completed: {resources} resources from {total} providers, {} failed",
            tally.failed.len()
        )
    }
}
