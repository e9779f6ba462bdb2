//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing bootstrap
//! - Configuration and bridge wiring
//! - Event bus for domain notifications
//!
//! ## Overview
//!
//! Hosts build a [`CoreConfig`](config::CoreConfig) once, install logging
//! with [`init_logging`](logging::init_logging), and hand the config to the
//! playback service. Every module publishes to the same
//! [`EventBus`](events::EventBus).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FeatureFlags, TimingConfig};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
