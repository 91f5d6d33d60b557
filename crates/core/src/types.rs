//! Domain types shared by every crate.
//!
//! Provider identities, tenants, credential bundles and the normalized
//! resource record that fetchers produce and the store serves.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Boxed future returned by the dyn-compatible async traits
/// ([`EventSink`](crate::event::EventSink), the inventory `Fetcher`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Known cloud providers.
///
/// The string form (`"aws"`, `"gcp"`, `"azure"`) is the stable identifier
/// used in config sections, URLs and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Amazon Web Services
    Aws,
    /// Google Cloud Platform
    Gcp,
    /// Microsoft Azure
    Azure,
}

impl ProviderId {
    /// Every known provider, in scan order.
    pub const ALL: [ProviderId; 3] = [ProviderId::Aws, ProviderId::Gcp, ProviderId::Azure];

    /// Stable identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            "azure" => Ok(Self::Azure),
            _ => Err(RegistryError::NotFound(s.to_owned())),
        }
    }
}

/// Tenant identifier.
///
/// Tenant `0` is the "no tenant" value: an event targeted at it reaches every
/// subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl TenantId {
    /// Broadcast-to-all tenant.
    pub const ALL: TenantId = TenantId(0);

    /// Whether this is the broadcast-to-all value.
    pub fn is_all(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque provider credential bundle.
///
/// Deliberately not `Serialize`, and its `Debug` output only lists key names,
/// so secrets cannot leak into responses or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    /// Build a bundle from key/value pairs.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a single secret.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether the bundle holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key names only.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Connection state of one provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    /// Provider identifier.
    pub id: ProviderId,
    /// True once credentials have been accepted by connect.
    pub is_connected: bool,
    /// Completion time of the last scan that reached this provider.
    pub last_synced: Option<DateTime<Utc>>,
    /// Credential bundle, never serialized.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
    /// Bumped on every connect and disconnect. A scan may only stamp
    /// `last_synced` for the generation it fetched with.
    #[serde(skip)]
    pub generation: u64,
}

impl ProviderAccount {
    /// A freshly created, disconnected account.
    pub fn disconnected(id: ProviderId) -> Self {
        Self {
            id,
            is_connected: false,
            last_synced: None,
            credentials: None,
            generation: 0,
        }
    }
}

/// Normalized resource record produced by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-scoped resource identifier (ARN, self-link, resource id).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource type, e.g. `ec2_instance`, `storage_bucket`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Owning provider.
    pub provider: ProviderId,
    /// Region or location.
    pub region: String,
    /// Provider-reported status, e.g. `running`, `stopped`.
    pub status: String,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({}) {} [{}]",
            self.provider, self.id, self.resource_type, self.region, self.status,
        )
    }
}
