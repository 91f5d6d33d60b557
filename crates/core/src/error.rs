//! Error types shared across the workspace.
//!
//! [`SkywatchError`] is the top-level error. Each domain has its own enum and
//! converts into the top-level type through `#[from]`, so `?` works across
//! crate boundaries.

/// Skywatch top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum SkywatchError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Provider registry errors.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Scan orchestration errors.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Broadcast hub errors.
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file could not be parsed.
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range or malformed.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Provider registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The provider id is not one of the known providers.
    #[error("unknown provider: {0}")]
    NotFound(String),

    /// The credential bundle was rejected.
    #[error("invalid credentials for {provider}: {reason}")]
    InvalidCredentials { provider: String, reason: String },
}

/// Scan orchestration errors.
///
/// Individual provider failures are never surfaced through this type; they
/// are recorded on the job status instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The aggregated snapshot could not be published.
    #[error("snapshot rejected: {0}")]
    SnapshotRejected(String),

    /// The job was cancelled before completion.
    #[error("scan aborted: {0}")]
    Aborted(String),

    /// A provider fetch failed outside of a scan job.
    #[error("fetch failed for {provider}: {reason}")]
    FetchFailed { provider: String, reason: String },
}

/// Broadcast hub errors.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The hub event loop is no longer running.
    #[error("broadcast hub is closed")]
    HubClosed,

    /// The hub's inbound queue is full.
    #[error("broadcast queue full")]
    QueueFull,
}
