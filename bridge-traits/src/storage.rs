//! Persisted playlist storage.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::Result;

/// Key-value store for user-created playlists.
///
/// Each playlist name maps to a set of track references (file paths for
/// on-device tracks). Writes replace the whole set: last write wins and
/// nothing is merged on the store side, so callers that want to extend a
/// playlist read, union and put.
///
/// # Platform Support
///
/// - **Android**: SharedPreferences string sets
/// - **iOS**: UserDefaults
/// - **Desktop**: SQLite
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::PlaylistStore;
///
/// async fn add_track(store: &dyn PlaylistStore, name: &str, path: &str) -> Result<()> {
///     let mut tracks = store.get(name).await?.unwrap_or_default();
///     tracks.insert(path.to_string());
///     store.put(name, tracks).await
/// }
/// ```
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Retrieve the tracks stored under `name`, or `None` if no such playlist exists.
    async fn get(&self, name: &str) -> Result<Option<BTreeSet<String>>>;

    /// Replace the tracks stored under `name`, creating the playlist if needed.
    async fn put(&self, name: &str, tracks: BTreeSet<String>) -> Result<()>;

    /// List every playlist name.
    async fn list_names(&self) -> Result<Vec<String>>;
}
