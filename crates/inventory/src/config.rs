//! Scan orchestration settings.
//!
//! [`InventoryConfig`] is derived from the core `[scan]` section with the
//! second counts turned into [`Duration`]s.

use std::time::Duration;

use skywatch_core::config::ScanConfig;
use skywatch_core::error::ConfigError;

/// Runtime settings for the scan orchestrator and resource store.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Budget for one provider fetch.
    pub fetch_timeout: Duration,
    /// Budget for a whole job. A fetch never runs past it.
    pub job_timeout: Duration,
    /// Largest snapshot the store accepts.
    pub max_resources: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self::from_core(&ScanConfig::default())
    }
}

impl InventoryConfig {
    /// Build from the core `[scan]` section.
    pub fn from_core(core: &ScanConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(core.fetch_timeout_secs),
            job_timeout: Duration::from_secs(core.job_timeout_secs),
            max_resources: core.max_resources,
        }
    }

    /// Override the per-fetch budget.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Override the job budget.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Override the snapshot size limit.
    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.max_resources = max;
        self
    }

    /// Check that the budgets are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.job_timeout < self.fetch_timeout {
            return Err(ConfigError::InvalidValue {
                field: "job_timeout".to_owned(),
                reason: "must not be shorter than fetch_timeout".to_owned(),
            });
        }
        if self.max_resources == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_resources".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
