//! # Playback Module
//!
//! Queue, transport state machine and the playback engine that drives the
//! platform audio renderer.
//!
//! ## Overview
//!
//! This module handles:
//! - Track descriptors for on-device files and remote streams
//! - The play queue with shuffle, repeat and boundary policy
//! - Transport state (what the user wants) and renderer status (what the
//!   renderer reports)
//! - The [`PlaybackEngine`], a single-owner wrapper over
//!   [`bridge_traits::AudioRenderer`]
//! - Play-count reporting for remote tracks
//!
//! Audio decoding is the renderer's job and does not happen here.

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod reporter;
pub mod state;
pub mod track;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{BoundaryPolicy, PlaybackConfig};
pub use engine::{EngineSignal, EngineSignals, LoadOutcome, PlaybackEngine, ReleaseOutcome};
pub use error::{PlaybackError, Result};
pub use queue::{EndAction, Queue};
pub use reporter::PlayCountReporter;
pub use state::{
    CommandStatus, PlaybackSnapshot, PlaybackStatus, PositionSample, RepeatMode,
    StreamInterruption, TransportCommand, TransportState,
};
pub use track::{TrackDescriptor, TrackId, TrackOrigin, TrackSource};
