//! # hudcast-daemon
//!
//! Runs the capture pipeline against a HUD reached over TCP.
//!
//! - **config**: `DaemonConfig`, loaded from TOML with defaults
//! - **service**: `HudService`, the connect / mirror / reconnect loop

pub mod config;
pub mod service;
