//! E2E test scenarios.

mod config_error;
mod event_stream;
mod lifecycle;
mod providers;
mod resources;
mod scan_flow;
