//! Collector for browser Content-Security-Policy violation reports.
//!
//! Reports arrive as `{"csp-report": {...}}` JSON bodies, are validated and stripped of
//! markup, and are appended as single-quoted CSV rows to a log that rotates into one backup
//! file once it grows past a size threshold.

pub mod app;
pub mod app_state_builder;
pub mod config;
pub mod report;
pub mod routes;
pub mod serve;
pub mod sanitize;
pub mod server_config;
pub mod state;
pub mod store;
