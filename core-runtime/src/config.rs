//! # Core Configuration Module
//!
//! Configuration for the playback core.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding the host bridges and the
//! runtime settings. `build()` validates fail-fast so a misconfigured host
//! gets an actionable error at startup instead of a half-working player.
//!
//! ## Required Dependencies
//!
//! - `AudioRenderer` - the platform media engine
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - required while the continuity guard is enabled
//!   (desktop default: `DesktopNetworkMonitor` with the `desktop-shims` feature)
//! - `PlayCountSink` - required while play counting is enabled
//! - `MetadataStore` - remote song and playlist documents
//! - `MediaIndex` - on-device library scan
//! - `PlaylistStore` - saved playlists
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .renderer(Arc::new(ExoPlayerRenderer::new(context)))
//!     .network_monitor(Arc::new(AndroidNetworkMonitor::new(context)))
//!     .play_count_sink(Arc::new(FirestoreCounter::new(db)))
//!     .metadata_store(Arc::new(FirestoreMetadata::new(db)))
//!     .position_poll_interval(Duration::from_millis(500))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No renderer: fails with Error::CapabilityMissing
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing renderer");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioRenderer, MediaIndex, MetadataStore, NetworkMonitor, PlayCountSink, PlaylistStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Default interval at which controllers sample the playback position.
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval at which the continuity guard re-checks a stalled stream.
pub const DEFAULT_CONNECTIVITY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default upper bound for one metadata store request.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of a session's command channel.
pub const DEFAULT_COMMAND_BUFFER_SIZE: usize = 64;

const MAX_POSITION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Platform audio renderer (required)
    pub renderer: Arc<dyn AudioRenderer>,

    /// Connectivity probe polled by the continuity guard
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Remote song/playlist documents
    pub metadata_store: Option<Arc<dyn MetadataStore>>,

    /// On-device media index
    pub media_index: Option<Arc<dyn MediaIndex>>,

    /// Saved playlist persistence
    pub playlist_store: Option<Arc<dyn PlaylistStore>>,

    /// Remote play counter
    pub play_count_sink: Option<Arc<dyn PlayCountSink>>,

    pub features: FeatureFlags,

    pub timing: TimingConfig,

    /// Capacity of the event bus and of each session's update channel
    pub event_buffer_size: usize,

    /// Capacity of each session's command channel
    pub command_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bridges are opaque; only report which ones were injected.
        let injected = [
            ("network_monitor", self.network_monitor.is_some()),
            ("metadata_store", self.metadata_store.is_some()),
            ("media_index", self.media_index.is_some()),
            ("playlist_store", self.playlist_store.is_some()),
            ("play_count_sink", self.play_count_sink.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect::<Vec<_>>();

        f.debug_struct("CoreConfig")
            .field("bridges", &injected)
            .field("features", &self.features)
            .field("timing", &self.timing)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("command_buffer_size", &self.command_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Watch remote streams for stalls caused by network loss (requires NetworkMonitor)
    pub enable_continuity_guard: bool,

    /// Report remote track starts to the play counter (requires PlayCountSink)
    pub enable_play_counts: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_continuity_guard: true,
            enable_play_counts: true,
        }
    }
}

/// Polling intervals and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// How often a visible controller samples the position while playing
    pub position_poll_interval: Duration,

    /// How often the continuity guard re-probes connectivity for an at-risk stream
    pub connectivity_poll_interval: Duration,

    /// Upper bound for any single metadata store call
    pub metadata_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            position_poll_interval: DEFAULT_POSITION_POLL_INTERVAL,
            connectivity_poll_interval: DEFAULT_CONNECTIVITY_POLL_INTERVAL,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Intervals and timeouts are non-zero, position polling is at most 10s
    /// - Buffer sizes are non-zero
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.timing.position_poll_interval.is_zero() {
            return Err(Error::Config(
                "Position poll interval must be greater than zero".to_string(),
            ));
        }

        if self.timing.position_poll_interval > MAX_POSITION_POLL_INTERVAL {
            return Err(Error::Config(format!(
                "Position poll interval exceeds maximum of {}s",
                MAX_POSITION_POLL_INTERVAL.as_secs()
            )));
        }

        if self.timing.connectivity_poll_interval.is_zero() {
            return Err(Error::Config(
                "Connectivity poll interval must be greater than zero".to_string(),
            ));
        }

        if self.timing.metadata_timeout.is_zero() {
            return Err(Error::Config(
                "Metadata timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 || self.command_buffer_size == 0 {
            return Err(Error::Config(
                "Event and command buffer sizes must be greater than zero".to_string(),
            ));
        }

        if self.features.enable_continuity_guard && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Continuity guard enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_play_counts && self.play_count_sink.is_none() {
            return Err(Error::Config(
                "Play counts enabled but no PlayCountSink provided. \
                 Disable the feature or inject a PlayCountSink implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn renderer_missing_error() -> Error {
    Error::missing(
        "AudioRenderer",
        "An AudioRenderer implementation is required for playback. \
         Mobile: inject the platform media engine adapter (ExoPlayer/AVPlayer). \
         Tests: enable core-playback's 'test-support' feature and use ScriptedRenderer.",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    let monitor: Arc<dyn NetworkMonitor> = Arc::new(DesktopNetworkMonitor::new());
    Some(monitor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    renderer: Option<Arc<dyn AudioRenderer>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    media_index: Option<Arc<dyn MediaIndex>>,
    playlist_store: Option<Arc<dyn PlaylistStore>>,
    play_count_sink: Option<Arc<dyn PlayCountSink>>,
    features: Option<FeatureFlags>,
    timing: TimingConfig,
    event_buffer_size: Option<usize>,
    command_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the platform audio renderer.
    pub fn renderer(mut self, renderer: Arc<dyn AudioRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Sets the connectivity probe used by the continuity guard.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    pub fn media_index(mut self, index: Arc<dyn MediaIndex>) -> Self {
        self.media_index = Some(index);
        self
    }

    pub fn playlist_store(mut self, store: Arc<dyn PlaylistStore>) -> Self {
        self.playlist_store = Some(store);
        self
    }

    pub fn play_count_sink(mut self, sink: Arc<dyn PlayCountSink>) -> Self {
        self.play_count_sink = Some(sink);
        self
    }

    /// Enables or disables the continuity guard.
    pub fn enable_continuity_guard(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_continuity_guard = enabled;
        self
    }

    /// Enables or disables play count reporting.
    pub fn enable_play_counts(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_play_counts = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    pub fn position_poll_interval(mut self, interval: Duration) -> Self {
        self.timing.position_poll_interval = interval;
        self
    }

    pub fn connectivity_poll_interval(mut self, interval: Duration) -> Self {
        self.timing.connectivity_poll_interval = interval;
        self
    }

    pub fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.timing.metadata_timeout = timeout;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn command_buffer_size(mut self, size: usize) -> Self {
        self.command_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the renderer is missing, a value is out of range,
    /// or an enabled feature lacks its bridge. Feature flags not set
    /// explicitly default to enabled only when their bridge is present.
    pub fn build(self) -> Result<CoreConfig> {
        let renderer = self.renderer.ok_or_else(renderer_missing_error)?;

        let network_monitor = self
            .network_monitor
            .or_else(provide_default_network_monitor);

        let features = self.features.unwrap_or(FeatureFlags {
            enable_continuity_guard: network_monitor.is_some(),
            enable_play_counts: self.play_count_sink.is_some(),
        });

        let config = CoreConfig {
            renderer,
            network_monitor,
            metadata_store: self.metadata_store,
            media_index: self.media_index,
            playlist_store: self.playlist_store,
            play_count_sink: self.play_count_sink,
            features,
            timing: self.timing,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            command_buffer_size: self
                .command_buffer_size
                .unwrap_or(DEFAULT_COMMAND_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
