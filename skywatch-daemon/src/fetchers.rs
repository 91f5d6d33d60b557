//! File-backed fetchers.
//!
//! A [`FileFetcher`] reads a provider's normalized inventory export, a JSON
//! array of resource records, from disk. The daemon runs on these without
//! any cloud SDK; an SDK-backed fetcher plugs into the same [`Fetcher`] seam.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use skywatch_core::{BoxFuture, Credentials, ProviderId, Resource, SkywatchConfig};
use skywatch_inventory::{FetchError, Fetcher, FetcherSet};

/// Lists one provider's resources from an exported JSON file.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    provider: ProviderId,
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(provider: ProviderId, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<Resource>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::Unavailable {
                provider: self.provider,
                reason: format!("cannot read {}: {}", self.path.display(), e),
            })?;

        let resources: Vec<Resource> =
            serde_json::from_str(&content).map_err(|e| FetchError::Malformed {
                provider: self.provider,
                reason: e.to_string(),
            })?;

        if let Some(foreign) = resources.iter().find(|r| r.provider != self.provider) {
            return Err(FetchError::Malformed {
                provider: self.provider,
                reason: format!(
                    "record '{}' belongs to provider '{}'",
                    foreign.id, foreign.provider
                ),
            });
        }

        debug!(
            provider = %self.provider,
            path = %self.path.display(),
            count = resources.len(),
            "inventory export read"
        );
        Ok(resources)
    }
}

impl Fetcher for FileFetcher {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn fetch<'a>(
        &'a self,
        _credentials: &'a Credentials,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Resource>, FetchError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = self.read() => result,
            }
        })
    }
}

/// Build a fetcher for every provider section with an `inventory_path`.
pub fn from_config(config: &SkywatchConfig) -> FetcherSet {
    let mut fetchers = FetcherSet::new();
    for (provider, section) in config.provider_sections() {
        if section.inventory_path.is_empty() {
            continue;
        }
        fetchers.register(Arc::new(FileFetcher::new(
            provider,
            &section.inventory_path,
        )));
    }
    fetchers
}
