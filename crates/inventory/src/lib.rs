//! Cloud inventory: provider connections, the resource snapshot and the scan
//! orchestrator that refreshes it.
//!
//! # Module Structure
//!
//! - [`registry`]: provider connection state (`ProviderRegistry`)
//! - [`fetcher`]: the per-provider listing boundary (`Fetcher`, `FetcherSet`)
//! - [`store`]: the current snapshot and its read path (`ResourceStore`)
//! - [`drift`]: differences between two snapshots (`DriftReport`)
//! - [`scan`]: the single-flight job driver (`ScanOrchestrator`)
//! - [`config`], [`error`]
//!
//! # Architecture
//!
//! ```text
//! ProviderRegistry ──list_connected──> ScanOrchestrator ──fetch──> Fetcher (per provider)
//!                                            │
//!                      ┌─────────────────────┼──────────────────────┐
//!                      │                     │                      │
//!               ResourceStore          ScanStatus (lock)       EventSink
//!             (Arc snapshot swap)                          (scan_* / drift events)
//! ```

pub mod config;
pub mod drift;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod scan;
pub mod store;

pub use config::InventoryConfig;
pub use drift::{DriftReport, StatusChange};
pub use error::{FetchError, StoreError};
pub use fetcher::{Fetcher, FetcherSet};
pub use registry::ProviderRegistry;
pub use scan::{ScanOrchestrator, ScanOutcome, ScanPhase, ScanStatus, ScanTicket};
pub use store::{ResourceFilter, ResourcePage, ResourceSnapshot, ResourceStore};
