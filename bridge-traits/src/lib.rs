//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform. Each trait represents a collaborator the core drives but does
//! not implement: the native audio renderer, connectivity probing, the
//! remote metadata store, the on-device media index, playlist persistence
//! and the remote play counter.
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioRenderer`](playback::AudioRenderer) - Platform media engine (prepare/play/pause/seek)
//! - [`RendererEventStream`](playback::RendererEventStream) - Asynchronous renderer callbacks
//!
//! ### Catalog
//! - [`MetadataStore`](catalog::MetadataStore) - Remote song and playlist documents
//! - [`MediaIndex`](catalog::MediaIndex) - On-device audio file enumeration
//! - [`PlaylistStore`](storage::PlaylistStore) - User playlists, last write wins
//! - [`PlayCountSink`](catalog::PlayCountSink) - Remote play counter
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Polled connectivity probe
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Network, media index, playlists |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let renderer = builder.renderer
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "AudioRenderer".to_string(),
//!         message: "No audio renderer provided. \
//!                  Mobile: inject the platform media engine adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map network failures to [`BridgeError::Network`] or
//! [`BridgeError::Timeout`] so the core can tell transient failures apart.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared
//! across async tasks.

pub mod catalog;
pub mod error;
pub mod logging;
pub mod network;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{LocalAudioFile, MediaIndex, MetadataStore, PlayCountSink, RemoteTrackRecord};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use playback::{
    AudioRenderer, AudioSource, MediaHandle, PlaybackMetadata, PlaybackRequest,
    PreparedMedia, RendererEvent, RendererEventKind, RendererEventStream,
};
pub use storage::PlaylistStore;
