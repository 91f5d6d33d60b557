//! The provider listing boundary.
//!
//! A [`Fetcher`] turns a credential bundle into normalized [`Resource`]
//! records for one provider. Retries and pagination are its own business;
//! the orchestrator only bounds it with a deadline and a cancellation token.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use skywatch_core::types::{BoxFuture, Credentials, ProviderId, Resource};

use crate::error::FetchError;

/// Lists every resource of one provider.
///
/// Returns a [`BoxFuture`] so fetchers can be stored as `Arc<dyn Fetcher>`.
pub trait Fetcher: Send + Sync {
    /// Provider this fetcher serves.
    fn provider(&self) -> ProviderId;

    /// List resources. Implementations should return
    /// [`FetchError::Cancelled`] promptly once `cancel` fires.
    fn fetch<'a>(
        &'a self,
        credentials: &'a Credentials,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Resource>, FetchError>>;
}

/// One fetcher per provider.
#[derive(Clone, Default)]
pub struct FetcherSet {
    fetchers: BTreeMap<ProviderId, Arc<dyn Fetcher>>,
}

impl FetcherSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fetcher, replacing any previous one for the same provider.
    pub fn register(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.fetchers.insert(fetcher.provider(), fetcher);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.register(Arc::new(fetcher));
        self
    }

    /// Fetcher for `provider`, if one is registered.
    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn Fetcher>> {
        self.fetchers.get(&provider).cloned()
    }

    /// Providers with a fetcher.
    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.fetchers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

impl fmt::Debug for FetcherSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherSet")
            .field("providers", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}
