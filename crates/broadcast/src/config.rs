//! Hub settings.

use skywatch_core::config::BroadcastConfig;
use skywatch_core::error::ConfigError;

/// Runtime settings for [`BroadcastHub`](crate::BroadcastHub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Inbound publish queue capacity.
    pub queue_capacity: usize,
    /// Per-subscriber outbox capacity.
    pub outbox_capacity: usize,
    /// Consecutive drops that disconnect a subscriber. 0 disables eviction.
    pub max_consecutive_drops: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_core(&BroadcastConfig::default())
    }
}

impl HubConfig {
    /// Build from the core `[broadcast]` section.
    pub fn from_core(core: &BroadcastConfig) -> Self {
        Self {
            queue_capacity: core.queue_capacity,
            outbox_capacity: core.outbox_capacity,
            max_consecutive_drops: core.max_consecutive_drops,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.outbox_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outbox_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
