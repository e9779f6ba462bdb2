//! Track descriptors.
//!
//! A [`TrackDescriptor`] is the single immutable description of a playable
//! item, whatever its origin. On-device files and remote streams share the
//! type and differ only in their tagged [`TrackSource`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_traits::{AudioSource, PlaybackMetadata, PlaybackRequest};
use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};

const UNKNOWN_TITLE: &str = "Unknown";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Identifier of a track: a media-store id for local files, a document key
/// for remote tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackOrigin {
    Local,
    Remote,
}

impl TrackOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackOrigin::Local => "local",
            TrackOrigin::Remote => "remote",
        }
    }
}

/// Source locator, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum TrackSource {
    LocalFile { path: PathBuf },
    RemoteUrl { url: String },
}

impl TrackSource {
    pub fn origin(&self) -> TrackOrigin {
        match self {
            TrackSource::LocalFile { .. } => TrackOrigin::Local,
            TrackSource::RemoteUrl { .. } => TrackOrigin::Remote,
        }
    }

    /// The locator as text (path or URL).
    pub fn locator(&self) -> std::borrow::Cow<'_, str> {
        match self {
            TrackSource::LocalFile { path } => path.to_string_lossy(),
            TrackSource::RemoteUrl { url } => std::borrow::Cow::Borrowed(url.as_str()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            TrackSource::LocalFile { path } => path.as_os_str().is_empty(),
            TrackSource::RemoteUrl { url } => url.trim().is_empty(),
        }
    }
}

/// Immutable description of one playable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackDescriptor {
    id: TrackId,
    title: String,
    artist: String,
    source: TrackSource,
    artwork: Option<String>,
}

impl TrackDescriptor {
    /// Build a descriptor, rejecting an empty id or locator.
    ///
    /// A blank title falls back to the file stem for local files and to
    /// "Unknown" otherwise; a blank artist becomes "Unknown Artist".
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source: TrackSource,
    ) -> Result<Self> {
        let id = id.into();
        if id.as_str().trim().is_empty() {
            return Err(PlaybackError::InvalidTrack("track id is empty".to_string()));
        }
        if source.is_empty() {
            return Err(PlaybackError::InvalidTrack(format!(
                "track {} has an empty source locator",
                id
            )));
        }

        let title = non_blank(title.into()).unwrap_or_else(|| fallback_title(&source));
        let artist = non_blank(artist.into()).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Ok(Self {
            id,
            title,
            artist,
            source,
            artwork: None,
        })
    }

    /// Descriptor for an on-device file.
    pub fn local(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::new(id, title, artist, TrackSource::LocalFile { path: path.into() })
    }

    /// Descriptor for a remote stream.
    pub fn remote(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self> {
        Self::new(id, title, artist, TrackSource::RemoteUrl { url: url.into() })
    }

    /// Attach an artwork locator. Blank values are ignored.
    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = non_blank(artwork.into());
        self
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn source(&self) -> &TrackSource {
        &self.source
    }

    pub fn artwork(&self) -> Option<&str> {
        self.artwork.as_deref()
    }

    pub fn origin(&self) -> TrackOrigin {
        self.source.origin()
    }

    pub fn is_remote(&self) -> bool {
        self.origin() == TrackOrigin::Remote
    }

    /// Local file path, if this is an on-device track.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            TrackSource::LocalFile { path } => Some(path),
            TrackSource::RemoteUrl { .. } => None,
        }
    }

    /// Renderer request preparing this track from `start`.
    pub fn to_request(&self, start: Duration) -> PlaybackRequest {
        let source = match &self.source {
            TrackSource::LocalFile { path } => AudioSource::LocalFile { path: path.clone() },
            TrackSource::RemoteUrl { url } => AudioSource::RemoteStream { url: url.clone() },
        };

        PlaybackRequest::new(source)
            .with_start_position(start)
            .with_metadata(PlaybackMetadata {
                track_id: Some(self.id.to_string()),
                title: Some(self.title.clone()),
                artist: Some(self.artist.clone()),
                artwork: self.artwork.clone(),
            })
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn fallback_title(source: &TrackSource) -> String {
    match source {
        TrackSource::LocalFile { path } => path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        TrackSource::RemoteUrl { .. } => UNKNOWN_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_locator() {
        let err = TrackDescriptor::remote("song-1", "Title", "Artist", "  ").unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTrack(_)));

        let err = TrackDescriptor::local("42", "Title", "Artist", "").unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTrack(_)));
    }

    #[test]
    fn rejects_empty_id() {
        let err = TrackDescriptor::remote("", "Title", "Artist", "https://x/a.mp3").unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTrack(_)));
    }

    #[test]
    fn local_title_falls_back_to_file_stem() {
        let track = TrackDescriptor::local("7", "", "", "/music/Night Drive.flac").unwrap();
        assert_eq!(track.title(), "Night Drive");
        assert_eq!(track.artist(), "Unknown Artist");
        assert_eq!(track.origin(), TrackOrigin::Local);
        assert_eq!(
            track.local_path(),
            Some(Path::new("/music/Night Drive.flac"))
        );
    }

    #[test]
    fn remote_descriptor_builds_stream_request() {
        let track = TrackDescriptor::remote("doc-1", "Song", "Band", "https://cdn/a.mp3")
            .unwrap()
            .with_artwork("https://cdn/a.jpg");

        let request = track.to_request(Duration::from_secs(3));

        assert!(track.is_remote());
        assert!(request.source.is_remote());
        assert_eq!(request.start_position, Duration::from_secs(3));
        assert_eq!(request.metadata.track_id.as_deref(), Some("doc-1"));
        assert_eq!(request.metadata.artwork.as_deref(), Some("https://cdn/a.jpg"));
    }

    #[test]
    fn blank_artwork_is_dropped() {
        let track = TrackDescriptor::remote("doc-1", "Song", "Band", "https://cdn/a.mp3")
            .unwrap()
            .with_artwork("");
        assert_eq!(track.artwork(), None);
    }

    #[test]
    fn serializes_with_tagged_origin() {
        let track = TrackDescriptor::remote("doc-1", "Song", "Band", "https://cdn/a.mp3").unwrap();
        let json = serde_json::to_string(&track).unwrap();
        assert!(json.contains("\"origin\":\"remote_url\""));
        let back: TrackDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, track);
    }
}
