//! Playback session service and per-screen controllers.
//!
//! Hosts build a [`CoreConfig`](core_runtime::CoreConfig) from their bridge
//! implementations, create one [`PlaybackService`] for the process, and
//! give each screen a [`PlaybackController`] from
//! [`PlaybackService::connect`]. Screens resolve what to play through the
//! [`TrackCatalog`]. Desktop hosts can enable the `desktop-shims` feature
//! and start from [`desktop_config_builder`].
//!
//! ```ignore
//! let config = CoreConfig::builder().renderer(renderer).build()?;
//! let service = PlaybackService::new(config, PlaybackConfig::default());
//!
//! service.start(&tracks, 0).await?;
//! let controller = service.connect();
//! controller.connected().await?;
//! controller.pause().await;
//! ```

pub mod catalog;
pub mod controller;
pub mod error;
pub mod guard;
pub mod service;
pub mod session;
pub mod view;

pub use catalog::TrackCatalog;
pub use controller::{ControllerSubscription, ControllerUpdate, PlaybackController};
pub use error::{Result, ServiceError};
pub use guard::{ContinuityGuard, GuardVerdict, InterruptionChoice};
pub use service::{PlaybackService, SessionAvailability, StartOutcome, TeardownOutcome};
pub use session::{SessionHandle, SessionId};
pub use view::{format_time, NowPlayingView, PlayPauseIcon};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{DesktopNetworkMonitor, FsMediaIndex, SqlitePlaylistStore};

/// Config builder pre-wired with the desktop media index and playlist
/// store. The host still supplies the renderer.
///
/// The playlist database at `database_path` is created if missing.
#[cfg(feature = "desktop-shims")]
pub async fn desktop_config_builder(
    library_root: impl Into<std::path::PathBuf>,
    database_path: impl Into<std::path::PathBuf>,
) -> Result<core_runtime::CoreConfigBuilder> {
    use std::sync::Arc;

    let playlists = SqlitePlaylistStore::new(database_path.into()).await?;
    Ok(core_runtime::CoreConfig::builder()
        .media_index(Arc::new(FsMediaIndex::new(library_root)))
        .playlist_store(Arc::new(playlists)))
}
