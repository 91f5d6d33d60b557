//! Skywatch daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `skywatch-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod daemon;
pub mod fetchers;
pub mod health;
pub mod http;
pub mod logging;
pub mod metrics_server;
