//! Shared E2E test helpers.

pub mod api;
pub mod config;
