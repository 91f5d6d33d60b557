//! Inventory drift between two snapshots.

use std::collections::HashMap;

use serde::Serialize;

use skywatch_core::types::{ProviderId, Resource};

use crate::store::ResourceSnapshot;

/// A resource whose reported status changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: String,
    pub provider: ProviderId,
    pub previous_status: String,
    pub current_status: String,
}

/// Differences between a previous and a newly published snapshot.
///
/// Resources are matched on `(provider, id)`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub previous_job_id: Option<String>,
    pub job_id: Option<String>,
    pub added: Vec<Resource>,
    pub removed: Vec<Resource>,
    pub changed: Vec<StatusChange>,
}

impl DriftReport {
    /// Compare two snapshots. Ordering follows `current` for additions and
    /// changes, `previous` for removals.
    pub fn between(previous: &ResourceSnapshot, current: &ResourceSnapshot) -> Self {
        Self::compare(previous, current, |_| true)
    }

    /// Compare only the resources of `observed` providers. Providers the job
    /// could not reach are left out on both sides, so a failed fetch never
    /// reads as removals.
    pub fn between_observed(
        previous: &ResourceSnapshot,
        current: &ResourceSnapshot,
        observed: &[ProviderId],
    ) -> Self {
        Self::compare(previous, current, |p| observed.contains(&p))
    }

    fn compare(
        previous: &ResourceSnapshot,
        current: &ResourceSnapshot,
        include: impl Fn(ProviderId) -> bool,
    ) -> Self {
        let before: HashMap<(ProviderId, &str), &Resource> = previous
            .resources()
            .iter()
            .filter(|r| include(r.provider))
            .map(|r| ((r.provider, r.id.as_str()), r))
            .collect();
        let after: HashMap<(ProviderId, &str), &Resource> = current
            .resources()
            .iter()
            .filter(|r| include(r.provider))
            .map(|r| ((r.provider, r.id.as_str()), r))
            .collect();

        let mut report = Self {
            previous_job_id: previous.job_id().map(str::to_owned),
            job_id: current.job_id().map(str::to_owned),
            ..Self::default()
        };

        for resource in current.resources().iter().filter(|r| include(r.provider)) {
            match before.get(&(resource.provider, resource.id.as_str())) {
                None => report.added.push(resource.clone()),
                Some(old) if old.status != resource.status => report.changed.push(StatusChange {
                    id: resource.id.clone(),
                    provider: resource.provider,
                    previous_status: old.status.clone(),
                    current_status: resource.status.clone(),
                }),
                Some(_) => {}
            }
        }

        report.removed = previous
            .resources()
            .iter()
            .filter(|r| include(r.provider))
            .filter(|r| !after.contains_key(&(r.provider, r.id.as_str())))
            .cloned()
            .collect();

        report
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
