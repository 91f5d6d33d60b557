//! Configuration: `skywatch.toml` parsing and runtime settings.
//!
//! [`SkywatchConfig`] is the root of every section. Each crate reads only the
//! section it owns.
//!
//! # Precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`SKYWATCH_SCAN_FETCH_TIMEOUT_SECS=30`)
//! 3. Config file (`skywatch.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), skywatch_core::error::SkywatchError> {
//! use skywatch_core::config::SkywatchConfig;
//!
//! // file + env overrides
//! let config = SkywatchConfig::load("skywatch.toml").await?;
//!
//! // straight from a TOML string
//! let config = SkywatchConfig::parse("[scan]\nfetch_timeout_secs = 30")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SkywatchError};
use crate::types::{Credentials, ProviderId};

/// Skywatch configuration root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkywatchConfig {
    /// Logging and process settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Scan orchestration settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Broadcast hub settings
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Prometheus exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Per-provider settings, keyed by provider id (`aws`, `gcp`, `azure`)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl SkywatchConfig {
    /// Load from a TOML file, apply env overrides, then validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SkywatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file without env overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SkywatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SkywatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SkywatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML string. Does not validate.
    pub fn parse(toml_str: &str) -> Result<Self, SkywatchError> {
        toml::from_str(toml_str).map_err(|e| {
            SkywatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Apply `SKYWATCH_{SECTION}_{FIELD}` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SKYWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SKYWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "SKYWATCH_GENERAL_PID_FILE");

        // Server
        override_string(&mut self.server.listen_addr, "SKYWATCH_SERVER_LISTEN_ADDR");
        override_u64(
            &mut self.server.sse_keep_alive_secs,
            "SKYWATCH_SERVER_SSE_KEEP_ALIVE_SECS",
        );
        override_usize(
            &mut self.server.default_page_size,
            "SKYWATCH_SERVER_DEFAULT_PAGE_SIZE",
        );
        override_usize(&mut self.server.max_page_size, "SKYWATCH_SERVER_MAX_PAGE_SIZE");

        // Scan
        override_u64(
            &mut self.scan.fetch_timeout_secs,
            "SKYWATCH_SCAN_FETCH_TIMEOUT_SECS",
        );
        override_u64(&mut self.scan.job_timeout_secs, "SKYWATCH_SCAN_JOB_TIMEOUT_SECS");
        override_u64(&mut self.scan.interval_secs, "SKYWATCH_SCAN_INTERVAL_SECS");
        override_usize(&mut self.scan.max_resources, "SKYWATCH_SCAN_MAX_RESOURCES");

        // Broadcast
        override_usize(
            &mut self.broadcast.queue_capacity,
            "SKYWATCH_BROADCAST_QUEUE_CAPACITY",
        );
        override_usize(
            &mut self.broadcast.outbox_capacity,
            "SKYWATCH_BROADCAST_OUTBOX_CAPACITY",
        );
        override_u32(
            &mut self.broadcast.max_consecutive_drops,
            "SKYWATCH_BROADCAST_MAX_CONSECUTIVE_DROPS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SKYWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SKYWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SKYWATCH_METRICS_PORT");
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), SkywatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.server.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid(
                "server.listen_addr",
                format!("'{}' is not a socket address", self.server.listen_addr),
            ));
        }

        if self.server.default_page_size == 0
            || self.server.default_page_size > self.server.max_page_size
        {
            return Err(invalid(
                "server.default_page_size",
                "must be between 1 and server.max_page_size",
            ));
        }

        if self.scan.fetch_timeout_secs == 0 {
            return Err(invalid("scan.fetch_timeout_secs", "must be greater than 0"));
        }

        if self.scan.job_timeout_secs < self.scan.fetch_timeout_secs {
            return Err(invalid(
                "scan.job_timeout_secs",
                "must not be shorter than scan.fetch_timeout_secs",
            ));
        }

        if self.scan.max_resources == 0 {
            return Err(invalid("scan.max_resources", "must be greater than 0"));
        }

        if self.broadcast.queue_capacity == 0 {
            return Err(invalid("broadcast.queue_capacity", "must be greater than 0"));
        }

        if self.broadcast.outbox_capacity == 0 {
            return Err(invalid("broadcast.outbox_capacity", "must be greater than 0"));
        }

        for key in self.providers.keys() {
            if key.parse::<ProviderId>().is_err() {
                return Err(invalid(
                    &format!("providers.{key}"),
                    "unknown provider, expected one of: aws, gcp, azure",
                ));
            }
        }

        Ok(())
    }

    /// Provider sections with their parsed ids. Invalid keys are skipped;
    /// `validate()` reports them.
    pub fn provider_sections(&self) -> impl Iterator<Item = (ProviderId, &ProviderConfig)> {
        self.providers
            .iter()
            .filter_map(|(key, section)| key.parse().ok().map(|id| (id, section)))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SkywatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
    /// PID file path; empty disables the PID file
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the dashboard API
    pub listen_addr: String,
    /// Interval between SSE keep-alive comments
    pub sse_keep_alive_secs: u64,
    /// Page size when the client sends none
    pub default_page_size: usize,
    /// Upper bound on client-requested page size
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_owned(),
            sse_keep_alive_secs: 15,
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

/// Scan orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Deadline for a single provider fetch
    pub fetch_timeout_secs: u64,
    /// Deadline for a whole job; caps every fetch deadline
    pub job_timeout_secs: u64,
    /// Scheduled scan interval; 0 means manual triggers only
    pub interval_secs: u64,
    /// Largest snapshot the store accepts
    pub max_resources: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            job_timeout_secs: 600,
            interval_secs: 0,
            max_resources: 1_000_000,
        }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Capacity of the hub's inbound publish queue
    pub queue_capacity: usize,
    /// Capacity of each subscriber's outbox
    pub outbox_capacity: usize,
    /// Consecutive dropped deliveries before a subscriber is evicted; 0 never evicts
    pub max_consecutive_drops: u32,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            outbox_capacity: 64,
            max_consecutive_drops: 256,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the exporter is installed
    pub enabled: bool,
    /// Exporter bind address
    pub listen_addr: String,
    /// Exporter port
    pub port: u16,
    /// Scrape path
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// Settings for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Normalized inventory export (JSON array of resources) read by the file fetcher
    pub inventory_path: String,
    /// Credentials to connect with at startup; empty leaves the provider disconnected
    pub credentials: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Startup credentials, if any were configured.
    pub fn startup_credentials(&self) -> Option<Credentials> {
        (!self.credentials.is_empty()).then(|| Credentials::new(self.credentials.clone()))
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}
