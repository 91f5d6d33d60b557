//! Daemon assembly and lifecycle.
//!
//! [`Daemon`] wires the provider registry, fetchers, resource store,
//! broadcast hub and scan orchestrator together, serves the HTTP API and
//! tears everything down in order on SIGTERM/SIGINT.
//!
//! # Shutdown Order
//!
//! 1. Broadcast the shutdown signal (hub loop, scheduler, uptime updater)
//! 2. Cancel the running scan and wait for its task
//! 3. Wait for the hub loop; its exit closes every SSE stream
//! 4. Wait for the HTTP server to drain

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use skywatch_broadcast::{BroadcastHub, HubConfig, HubHandle};
use skywatch_core::{ProviderId, SkywatchConfig, TenantId};
use skywatch_inventory::{
    InventoryConfig, ProviderRegistry, ResourceStore, ScanOrchestrator,
};

use crate::http::{self, AppState};
use crate::{fetchers, metrics_server};

/// The assembled daemon.
pub struct Daemon {
    /// Loaded and validated configuration.
    config: SkywatchConfig,
    /// Shared handler state (orchestrator, registry, store, hub).
    state: AppState,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Hub event loop; taken on shutdown.
    hub_task: Option<JoinHandle<()>>,
    start_time: Instant,
}

impl Daemon {
    /// Load configuration and build the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated, or
    /// if any component fails to build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SkywatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Providers with startup credentials are connected before the daemon
    /// accepts requests.
    pub async fn build_from_config(config: SkywatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            metrics_server::record_build_info();
        }

        let registry = Arc::new(ProviderRegistry::with_providers(ProviderId::ALL));
        for (provider, section) in config.provider_sections() {
            if let Some(credentials) = section.startup_credentials() {
                registry
                    .set_connected(provider, credentials)
                    .map_err(|e| anyhow::anyhow!("failed to connect {}: {}", provider, e))?;
            }
        }

        let fetchers = fetchers::from_config(&config);
        tracing::info!(fetchers = fetchers.len(), "file fetchers registered");

        let inventory_config = InventoryConfig::from_core(&config.scan);
        inventory_config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid scan config: {}", e))?;
        let hub_config = HubConfig::from_core(&config.broadcast);
        hub_config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid broadcast config: {}", e))?;

        let store = Arc::new(ResourceStore::new(inventory_config.max_resources));
        let (shutdown_tx, _) = broadcast::channel(16);
        let (hub, hub_task) = BroadcastHub::spawn(hub_config, shutdown_tx.subscribe());

        let orchestrator = Arc::new(ScanOrchestrator::new(
            inventory_config,
            Arc::clone(&registry),
            fetchers,
            Arc::clone(&store),
            Arc::new(hub.clone()),
        ));

        let state = AppState::new(&config.server, orchestrator, registry, store, hub);
        tracing::info!("daemon initialized");

        Ok(Self {
            config,
            state,
            shutdown_tx,
            hub_task: Some(hub_task),
            start_time: Instant::now(),
        })
    }

    /// The API router over this daemon's state.
    pub fn router(&self) -> Router {
        http::router(self.state.clone())
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handle to the broadcast hub.
    pub fn hub(&self) -> &HubHandle {
        &self.state.hub
    }

    /// Loaded configuration.
    pub fn config(&self) -> &SkywatchConfig {
        &self.config
    }

    /// Bind the configured address and serve until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.listen_addr)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "failed to bind {}: {}",
                    self.config.server.listen_addr,
                    e
                )
            })?;

        self.run_until(listener, async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Serve on `listener` until `shutdown` resolves, then shut down.
    pub async fn run_until<F>(&mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        let pid_file = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_file {
            write_pid_file(Path::new(path))?;
        }

        let mut server_shutdown = self.shutdown_tx.subscribe();
        let app = self.router();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.recv().await;
                })
                .await
        });
        tracing::info!(listen_addr = %local_addr, "HTTP API listening");

        let uptime_task = self.config.metrics.enabled.then(|| {
            metrics_server::spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe())
        });

        let scheduler_task = (self.config.scan.interval_secs > 0).then(|| {
            spawn_scan_scheduler(
                Arc::clone(&self.state.orchestrator),
                Duration::from_secs(self.config.scan.interval_secs),
                self.shutdown_tx.subscribe(),
            )
        });

        shutdown.await;
        self.shutdown().await;

        if let Some(task) = uptime_task {
            join_background("uptime updater", task).await;
        }
        if let Some(task) = scheduler_task {
            join_background("scan scheduler", task).await;
        }

        let served = match server.await {
            Ok(result) => result.map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e)),
            Err(e) => Err(anyhow::anyhow!("HTTP server task panicked: {}", e)),
        };

        if let Some(path) = &pid_file {
            remove_pid_file(Path::new(path));
        }

        tracing::info!("skywatch-daemon shut down");
        served
    }

    /// Stop background work: hub, scheduler, running scan.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        self.state.orchestrator.shutdown().await;

        if let Some(task) = self.hub_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "broadcast hub task failed");
            }
        }
    }
}

/// Await a background task, logging how it ended. Returns true on a clean exit.
async fn join_background(name: &'static str, task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => {
            tracing::debug!(task = name, "background task stopped");
            true
        }
        Err(e) => {
            tracing::error!(task = name, error = %e, "background task failed");
            false
        }
    }
}

/// Periodically trigger a broadcast-wide scan.
///
/// The first scan fires one period after startup. A tick that lands while a
/// job is still running is skipped, never queued.
pub fn spawn_scan_scheduler(
    orchestrator: Arc<ScanOrchestrator>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let ticket = orchestrator.start(TenantId::ALL);
                    if ticket.accepted {
                        tracing::info!(job_id = ?ticket.status.job_id, "scheduled scan started");
                    } else {
                        tracing::debug!(
                            job_id = ?ticket.status.job_id,
                            "previous scan still running, tick skipped"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("scan scheduler shutting down");
                    break;
                }
            }
        }
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Fails when the file already exists, so a second instance refuses to
/// start.
///
/// # Security
///
/// - `create_new(true)` creates the file atomically (no TOCTOU race)
/// - the created file must be a regular file (no symlink tricks)
/// - parent directory 0o700, file 0o600
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Logs instead of failing.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}
