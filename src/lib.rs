//! Cadence playback core.
//!
//! Single entry point for host applications. With the default
//! `desktop-shims` feature this re-exports the playback service, its
//! controllers and the playback types, so hosts depend on `cadence` alone
//! instead of wiring each workspace crate.

pub use bridge_traits as bridge;

#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;

#[cfg(feature = "desktop-shims")]
pub use core_service::*;

#[cfg(feature = "desktop-shims")]
pub use core_playback::{
    BoundaryPolicy, CommandStatus, PlaybackConfig, PlaybackSnapshot, PlaybackStatus,
    PositionSample, RepeatMode, TrackDescriptor, TrackId, TransportState,
};
