//! Inventory error types.
//!
//! [`FetchError`] covers a single provider listing and never escapes a scan
//! job: the orchestrator logs it and zero-counts the provider. [`StoreError`]
//! is the one failure that stops a snapshot from being published.
//! Both convert into [`SkywatchError`] for callers outside a job.

use std::time::Duration;

use skywatch_core::error::{ScanError, SkywatchError};
use skywatch_core::types::ProviderId;

/// Failure of one provider fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The provider API could not be reached or answered with an error.
    #[error("{provider} unavailable: {reason}")]
    Unavailable {
        /// Provider that failed
        provider: ProviderId,
        /// Failure reason
        reason: String,
    },

    /// The fetch did not finish within its deadline.
    #[error("{provider} fetch timed out after {elapsed:?}")]
    Timeout {
        /// Provider that timed out
        provider: ProviderId,
        /// Budget the fetch was given
        elapsed: Duration,
    },

    /// The credential bundle is missing a required key or was refused.
    #[error("{provider} rejected credentials: {reason}")]
    Credentials {
        /// Provider that rejected the credentials
        provider: ProviderId,
        /// Rejection reason
        reason: String,
    },

    /// The listing could not be decoded into resource records.
    #[error("{provider} returned malformed inventory: {reason}")]
    Malformed {
        /// Provider whose data was malformed
        provider: ProviderId,
        /// Decode failure
        reason: String,
    },

    /// The job's cancellation token fired mid-fetch.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Provider the error belongs to, if any.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::Unavailable { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Credentials { provider, .. }
            | Self::Malformed { provider, .. } => Some(*provider),
            Self::Cancelled => None,
        }
    }
}

impl From<FetchError> for SkywatchError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => SkywatchError::Scan(ScanError::Aborted(err.to_string())),
            other => SkywatchError::Scan(ScanError::FetchFailed {
                provider: other
                    .provider()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                reason: other.to_string(),
            }),
        }
    }
}

/// Failure to publish a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The aggregate is larger than the store accepts.
    #[error("snapshot holds {count} resources, limit is {max}")]
    CapacityExceeded {
        /// Resources in the rejected snapshot
        count: usize,
        /// Configured limit
        max: usize,
    },
}

impl From<StoreError> for SkywatchError {
    fn from(err: StoreError) -> Self {
        SkywatchError::Scan(ScanError::SnapshotRejected(err.to_string()))
    }
}
