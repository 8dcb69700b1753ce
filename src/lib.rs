//! sysscope library crate.
//!
//! A host telemetry dashboard backend: a tiered collection scheduler
//! samples CPU, memory, network, disk, GPU, process and temperature stats
//! at three cadences and streams the results to WebSocket subscribers at
//! each client's requested refresh rate.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod providers;
pub mod stats;
pub mod subscription;

pub use error::{Error, Result};
