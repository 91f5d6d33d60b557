//! Live event fan-out.
//!
//! [`BroadcastHub::spawn`] starts a single loop that owns every subscriber.
//! Producers hold a [`HubHandle`] (it implements
//! [`EventSink`](skywatch_core::event::EventSink)); consumers hold a
//! [`Subscription`], a `Stream` of events that starts with a `connected`
//! greeting.
//!
//! Delivery never blocks the loop: a subscriber with a full outbox misses
//! that event, and one that keeps missing them is disconnected.

pub mod config;
pub mod hub;
pub mod subscription;

pub use config::HubConfig;
pub use hub::{BroadcastHub, HubHandle, HubStats};
pub use subscription::Subscription;
