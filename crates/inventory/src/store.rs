//! Current resource snapshot and the read path over it.
//!
//! [`ResourceStore`] holds an `Arc<ResourceSnapshot>` behind a `RwLock`. The
//! lock only guards the pointer: `replace` swaps it, readers clone it and
//! then filter without holding the lock. A reader therefore sees one whole
//! snapshot, never a mix of two.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use skywatch_core::types::{ProviderId, Resource};

use crate::error::StoreError;

/// Point-in-time inventory produced by one scan job.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    job_id: Option<String>,
    taken_at: DateTime<Utc>,
    resources: Vec<Resource>,
}

impl ResourceSnapshot {
    /// Snapshot produced by `job_id`.
    pub fn new(job_id: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            taken_at: Utc::now(),
            resources,
        }
    }

    /// The snapshot a store starts with, before any scan.
    pub fn empty() -> Self {
        Self {
            job_id: None,
            taken_at: Utc::now(),
            resources: Vec::new(),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resource count per provider.
    pub fn counts_by_provider(&self) -> BTreeMap<ProviderId, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.provider).or_insert(0) += 1;
        }
        counts
    }
}

/// Optional constraints for [`ResourceStore::list`]. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub provider: Option<ProviderId>,
    pub resource_type: Option<String>,
    pub region: Option<String>,
}

impl ResourceFilter {
    /// Only resources of `provider`.
    pub fn provider(provider: ProviderId) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.provider.is_none_or(|p| p == resource.provider)
            && self
                .resource_type
                .as_deref()
                .is_none_or(|t| t == resource.resource_type)
            && self.region.as_deref().is_none_or(|r| r == resource.region)
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct ResourcePage {
    /// Resources on this page.
    pub items: Vec<Resource>,
    /// Matching resources across all pages.
    pub total: usize,
    /// Job that produced the snapshot the page was cut from.
    pub job_id: Option<String>,
}

/// Holder of the authoritative snapshot.
#[derive(Debug)]
pub struct ResourceStore {
    current: RwLock<Arc<ResourceSnapshot>>,
    max_resources: usize,
}

impl ResourceStore {
    /// Empty store accepting snapshots of up to `max_resources` records.
    pub fn new(max_resources: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(ResourceSnapshot::empty())),
            max_resources,
        }
    }

    /// Swap in a new snapshot, returning the one it replaced.
    ///
    /// A snapshot over the size limit is rejected and the current one stays.
    pub fn replace(
        &self,
        snapshot: Arc<ResourceSnapshot>,
    ) -> Result<Arc<ResourceSnapshot>, StoreError> {
        if snapshot.len() > self.max_resources {
            return Err(StoreError::CapacityExceeded {
                count: snapshot.len(),
                max: self.max_resources,
            });
        }
        let count = snapshot.len();
        let previous = std::mem::replace(&mut *self.current.write(), snapshot);
        debug!(
            resources = count,
            previous = previous.len(),
            "resource snapshot replaced"
        );
        Ok(previous)
    }

    /// The snapshot current at the time of the call.
    pub fn current(&self) -> Arc<ResourceSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Filter and paginate the current snapshot.
    pub fn list(&self, filter: &ResourceFilter, page_size: usize, offset: usize) -> ResourcePage {
        let snapshot = self.current();
        let matching: Vec<&Resource> = snapshot
            .resources()
            .iter()
            .filter(|r| filter.matches(r))
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();
        ResourcePage {
            items,
            total,
            job_id: snapshot.job_id().map(str::to_owned),
        }
    }

    /// Resource count per provider in the current snapshot.
    pub fn counts_by_provider(&self) -> BTreeMap<ProviderId, usize> {
        self.current().counts_by_provider()
    }

    pub fn max_resources(&self) -> usize {
        self.max_resources
    }
}
