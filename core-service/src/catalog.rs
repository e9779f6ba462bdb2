//! # Track Catalog
//!
//! Turns collaborator records into [`TrackDescriptor`] lists for screens to
//! hand to [`PlaybackService::start`](crate::PlaybackService::start).
//!
//! - On-device tracks come from the [`MediaIndex`].
//! - Remote tracks and collections (playlists, categories, sections) come
//!   from the [`MetadataStore`]; every call is bounded by the configured
//!   metadata timeout.
//! - Saved playlists live in the [`PlaylistStore`] as sets of file paths.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{LocalAudioFile, MediaIndex, MetadataStore, PlaylistStore, RemoteTrackRecord};
use core_async::{task, time};
use core_playback::{TrackDescriptor, TrackId};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::logging::strip_path;
use core_runtime::CoreConfig;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};

/// Upper bound on remote search results.
const REMOTE_SEARCH_LIMIT: usize = 25;

#[derive(Clone)]
pub struct TrackCatalog {
    metadata: Option<Arc<dyn MetadataStore>>,
    media_index: Option<Arc<dyn MediaIndex>>,
    playlists: Option<Arc<dyn PlaylistStore>>,
    metadata_timeout: Duration,
    events: EventBus,
}

impl TrackCatalog {
    pub fn new(config: &CoreConfig, events: EventBus) -> Self {
        Self {
            metadata: config.metadata_store.clone(),
            media_index: config.media_index.clone(),
            playlists: config.playlist_store.clone(),
            metadata_timeout: config.timing.metadata_timeout,
            events,
        }
    }

    /// Every on-device audio file, in index order.
    pub async fn local_tracks(&self) -> Result<Vec<TrackDescriptor>> {
        let files = self.scan_local().await?;
        Ok(files.iter().filter_map(local_descriptor).collect())
    }

    /// One remote track, or `None` if the document does not exist.
    pub async fn remote_track(&self, id: &str) -> Result<Option<TrackDescriptor>> {
        let store = self.metadata()?;
        let record = self.bounded(store.fetch_track(id)).await?;
        Ok(record.as_ref().and_then(remote_descriptor))
    }

    /// Tracks of a remote playlist, category or section, in stored order.
    ///
    /// Ids whose document is missing are skipped and repeated ids are kept
    /// once.
    #[instrument(skip(self))]
    pub async fn remote_collection(&self, collection_id: &str) -> Result<Vec<TrackDescriptor>> {
        let store = self.metadata()?;
        let ids = self
            .bounded(store.fetch_playlist_track_ids(collection_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("collection {collection_id}")))?;

        let mut seen = HashSet::new();
        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.bounded(store.fetch_track(&id)).await? {
                Some(record) => tracks.extend(remote_descriptor(&record)),
                None => debug!(track_id = %id, "Skipping missing track document"),
            }
        }

        debug!(count = tracks.len(), "Collection resolved");
        Ok(tracks)
    }

    /// Local tracks whose title or artist contains `query` (ignoring case),
    /// followed by remote tracks whose title starts with it.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackDescriptor>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let needle = query.to_lowercase();

        let mut results: Vec<TrackDescriptor> = match self.media_index {
            Some(_) => self
                .local_tracks()
                .await?
                .into_iter()
                .filter(|track| {
                    track.title().to_lowercase().contains(&needle)
                        || track.artist().to_lowercase().contains(&needle)
                })
                .collect(),
            None => Vec::new(),
        };

        if let Some(store) = &self.metadata {
            // Offline search still returns local matches.
            match self
                .bounded(store.search_titles(query, REMOTE_SEARCH_LIMIT))
                .await
            {
                Ok(records) => results.extend(records.iter().filter_map(remote_descriptor)),
                Err(e) => warn!(error = %e, "Remote search failed"),
            }
        }

        let mut seen: HashSet<TrackId> = HashSet::new();
        results.retain(|track| seen.insert(track.id().clone()));
        Ok(results)
    }

    pub async fn playlist_names(&self) -> Result<Vec<String>> {
        let mut names = self.playlist_store()?.list_names().await?;
        names.sort();
        Ok(names)
    }

    /// Create an empty playlist.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlaylistExists`] when the name is taken.
    pub async fn create_playlist(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Catalog("playlist name is empty".to_string()));
        }

        let store = self.playlist_store()?;
        if store.get(name).await?.is_some() {
            return Err(ServiceError::PlaylistExists(name.to_string()));
        }
        store.put(name, BTreeSet::new()).await?;

        info!(playlist = name, "Playlist created");
        self.emit(LibraryEvent::PlaylistCreated {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Add file paths to a playlist, creating it if needed. Returns the new
    /// track count.
    pub async fn add_to_playlist(&self, name: &str, paths: &[String]) -> Result<usize> {
        let store = self.playlist_store()?;
        let mut tracks = store.get(name).await?.unwrap_or_default();
        tracks.extend(paths.iter().filter(|p| !p.trim().is_empty()).cloned());

        let track_count = tracks.len();
        store.put(name, tracks).await?;

        debug!(playlist = name, track_count, "Playlist updated");
        self.emit(LibraryEvent::PlaylistUpdated {
            name: name.to_string(),
            track_count,
        });
        Ok(track_count)
    }

    /// Tracks of a saved playlist, sorted by title.
    ///
    /// Paths no longer present in the media index are skipped.
    pub async fn saved_playlist(&self, name: &str) -> Result<Vec<TrackDescriptor>> {
        let paths = self
            .playlist_store()?
            .get(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("playlist {name}")))?;

        let files = self.scan_local().await?;
        let mut tracks: Vec<TrackDescriptor> = files
            .iter()
            .filter(|file| paths.contains(file.path.to_string_lossy().as_ref()))
            .filter_map(local_descriptor)
            .collect();

        if tracks.len() < paths.len() {
            debug!(
                playlist = name,
                missing = paths.len() - tracks.len(),
                "Skipping playlist entries not in the media index"
            );
        }

        tracks.sort_by(|a, b| a.title().to_lowercase().cmp(&b.title().to_lowercase()));
        Ok(tracks)
    }

    async fn scan_local(&self) -> Result<Vec<LocalAudioFile>> {
        let index = self
            .media_index
            .clone()
            .ok_or_else(|| ServiceError::missing("MediaIndex", "No media index provided"))?;

        let files = task::spawn_blocking(move || index.query_all_audio_files())
            .await
            .map_err(|e| ServiceError::Catalog(format!("media index scan failed: {e}")))??;
        Ok(files)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = bridge_traits::error::Result<T>>,
    {
        match time::timeout(self.metadata_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout = ?self.metadata_timeout, "Metadata request timed out");
                Err(ServiceError::Timeout(self.metadata_timeout))
            }
        }
    }

    fn metadata(&self) -> Result<&Arc<dyn MetadataStore>> {
        self.metadata
            .as_ref()
            .ok_or_else(|| ServiceError::missing("MetadataStore", "No metadata store provided"))
    }

    fn playlist_store(&self) -> Result<&Arc<dyn PlaylistStore>> {
        self.playlists
            .as_ref()
            .ok_or_else(|| ServiceError::missing("PlaylistStore", "No playlist store provided"))
    }

    fn emit(&self, event: LibraryEvent) {
        let _ = self.events.emit(CoreEvent::Library(event));
    }
}

impl std::fmt::Debug for TrackCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackCatalog")
            .field("metadata", &self.metadata.is_some())
            .field("media_index", &self.media_index.is_some())
            .field("playlists", &self.playlists.is_some())
            .finish()
    }
}

fn local_descriptor(file: &LocalAudioFile) -> Option<TrackDescriptor> {
    if file.path.as_os_str().is_empty() {
        return None;
    }
    TrackDescriptor::local(
        file.media_id.as_str(),
        file.title.clone().unwrap_or_default(),
        file.artist.clone().unwrap_or_default(),
        file.path.clone(),
    )
    .map_err(|e| warn!(file = %strip_path(&file.path.to_string_lossy()), error = %e, "Skipping local file"))
    .ok()
}

fn remote_descriptor(record: &RemoteTrackRecord) -> Option<TrackDescriptor> {
    let descriptor = TrackDescriptor::remote(
        record.id.as_str(),
        record.title.as_str(),
        record.artist.as_str(),
        record.url.as_str(),
    )
    .map_err(|e| warn!(track_id = %record.id, error = %e, "Skipping remote record"))
    .ok()?;

    Some(match &record.cover_url {
        Some(cover) => descriptor.with_artwork(cover.as_str()),
        None => descriptor,
    })
}
