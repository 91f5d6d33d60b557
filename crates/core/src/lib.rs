//! Shared foundation for the skywatch workspace.
//!
//! Configuration, the error taxonomy, domain types, the broadcast event type
//! and metric names. Every other crate depends on this one and nothing here
//! performs I/O beyond reading the config file.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod types;

// errors
pub use error::{BroadcastError, ConfigError, RegistryError, ScanError, SkywatchError};

// config
pub use config::SkywatchConfig;

// events
pub use event::{BroadcastEvent, EventKind, EventSink};

// domain types
pub use types::{BoxFuture, Credentials, ProviderAccount, ProviderId, Resource, TenantId};
