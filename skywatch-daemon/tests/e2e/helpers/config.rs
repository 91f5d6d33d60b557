//! Test configuration builder for E2E tests.
//!
//! [`TestConfigBuilder`] writes provider inventory exports into a private
//! temp directory and points `[providers.<id>]` sections at them.

use std::path::Path;

use serde_json::{Value, json};
use tempfile::TempDir;

use skywatch_core::config::ProviderConfig;
use skywatch_core::{ProviderId, SkywatchConfig};

/// Builder for `SkywatchConfig` instances backed by temp-file exports.
///
/// The returned [`TempDir`] must outlive the daemon.
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: SkywatchConfig,
    dir: TempDir,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    /// No providers, no PID file, no metrics, no scheduler.
    pub fn new() -> Self {
        let mut config = SkywatchConfig::default();
        config.general.pid_file = String::new();
        config.metrics.enabled = false;
        config.scan.interval_secs = 0;
        Self {
            config,
            dir: TempDir::new().expect("should create temp dir"),
        }
    }

    /// Connected provider whose export holds `count` generated records.
    pub fn provider(self, provider: ProviderId, count: usize) -> Self {
        let records = Value::Array(records(provider, count));
        self.provider_export(provider, &records.to_string())
    }

    /// Connected provider whose export file holds `content` verbatim.
    pub fn provider_export(mut self, provider: ProviderId, content: &str) -> Self {
        let path = self.dir.path().join(format!("{}.json", provider));
        std::fs::write(&path, content).expect("should write export");
        self.config
            .providers
            .insert(provider.to_string(), connected_section(&path));
        self
    }

    /// Connected provider whose export file does not exist.
    pub fn provider_missing_export(mut self, provider: ProviderId) -> Self {
        let path = self.dir.path().join(format!("{}-missing.json", provider));
        self.config
            .providers
            .insert(provider.to_string(), connected_section(&path));
        self
    }

    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.config.broadcast.outbox_capacity = capacity;
        self
    }

    pub fn page_sizes(mut self, default: usize, max: usize) -> Self {
        self.config.server.default_page_size = default;
        self.config.server.max_page_size = max;
        self
    }

    pub fn pid_file(mut self, path: &Path) -> Self {
        self.config.general.pid_file = path.display().to_string();
        self
    }

    pub fn build(self) -> (SkywatchConfig, TempDir) {
        (self.config, self.dir)
    }
}

fn connected_section(path: &Path) -> ProviderConfig {
    ProviderConfig {
        inventory_path: path.display().to_string(),
        credentials: [("token".to_owned(), "test-token".to_owned())]
            .into_iter()
            .collect(),
    }
}

/// `count` resource records for `provider`, alternating instance/bucket.
pub fn records(provider: ProviderId, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("{}-{}", provider, i),
                "name": format!("{} resource {}", provider, i),
                "type": if i % 2 == 0 { "instance" } else { "bucket" },
                "provider": provider,
                "region": if i < 2 { "eu-west-1" } else { "us-east-1" },
                "status": "running",
            })
        })
        .collect()
}
