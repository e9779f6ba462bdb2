//! Desktop stand-ins for the platform collaborators.
//!
//! - [`FsMediaIndex`]: the on-device media store, as a scanned library
//!   folder with tags read through `lofty`
//! - [`SqlitePlaylistStore`]: saved playlists in a SQLite file via `sqlx`
//! - [`DesktopNetworkMonitor`]: reachability by TCP probe
//!
//! No audio renderer lives here. Desktop hosts inject their own.
//!
//! ```ignore
//! let index = FsMediaIndex::new(dirs.audio_dir());
//! let playlists = SqlitePlaylistStore::new(data_dir.join("playlists.db")).await?;
//! let config = CoreConfig::builder()
//!     .renderer(renderer)
//!     .media_index(Arc::new(index))
//!     .playlist_store(Arc::new(playlists))
//!     .build()?;
//! ```

mod media_index;
mod network;
mod playlists;

pub use media_index::FsMediaIndex;
pub use network::DesktopNetworkMonitor;
pub use playlists::SqlitePlaylistStore;
