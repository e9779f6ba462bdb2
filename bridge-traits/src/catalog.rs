//! Track metadata collaborators.
//!
//! Remote track documents live in a document store, on-device tracks come
//! from the platform media index, and remote plays are counted by a
//! separate sink. The core only consumes these through the traits below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Song document as stored in the remote metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrackRecord {
    /// Document key.
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Streaming URL.
    pub url: String,
    pub cover_url: Option<String>,
}

/// Audio file reported by the on-device media index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAudioFile {
    /// Media-store identifier.
    pub media_id: String,
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

/// Remote metadata store (song, category and playlist documents).
///
/// Implementations must return within a bounded time; callers additionally
/// wrap every call in a timeout.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch one song document. `Ok(None)` means the document does not exist.
    async fn fetch_track(&self, id: &str) -> Result<Option<RemoteTrackRecord>>;

    /// Fetch the ordered song ids of a playlist, category or section.
    /// `Ok(None)` means the collection does not exist.
    async fn fetch_playlist_track_ids(&self, playlist_id: &str) -> Result<Option<Vec<String>>>;

    /// Songs whose title starts with `prefix`, at most `limit` of them.
    async fn search_titles(&self, _prefix: &str, _limit: usize) -> Result<Vec<RemoteTrackRecord>> {
        Ok(Vec::new())
    }
}

/// On-device media index (the library scan).
///
/// Synchronous by contract: platform media stores answer from a local
/// database. May return an empty list.
pub trait MediaIndex: Send + Sync {
    fn query_all_audio_files(&self) -> Result<Vec<LocalAudioFile>>;
}

/// Remote play counter.
///
/// Fire-and-forget from the core's point of view: errors are logged and
/// dropped by the caller.
#[async_trait]
pub trait PlayCountSink: Send + Sync {
    async fn increment(&self, track_id: &str) -> Result<()>;
}
