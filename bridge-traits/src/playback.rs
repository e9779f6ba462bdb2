//! Playback bridge traits and supporting types.
//!
//! The core never decodes audio itself. Hosts hand it an [`AudioRenderer`]
//! wrapping the platform media engine (ExoPlayer, AVPlayer, a desktop audio
//! backend) and the core drives it through prepare/play/pause/seek calls,
//! observing its asynchronous callbacks through a [`RendererEventStream`].

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Where the renderer should read audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// File readable by the host process.
    LocalFile { path: PathBuf },
    /// HTTP(S) URL the renderer fetches itself. May carry a signed query.
    RemoteStream { url: String },
}

impl AudioSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Renderer-side identity of one prepared item. A new handle is issued on
/// every prepare, so callbacks for a replaced item can be recognised and
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(Uuid);

impl MediaHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shown by the platform media session (lock screen, notification).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    /// Where audio should begin once prepared.
    pub start_position: Duration,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            start_position: Duration::ZERO,
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }
}

/// Result of a successful prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedMedia {
    pub handle: MediaHandle,
    /// Total duration, when the container reports one. Live streams have none.
    pub duration: Option<Duration>,
}

/// Asynchronous state callbacks reported by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEventKind {
    /// Renderer is filling its buffer and cannot produce audio yet.
    Buffering,
    /// Renderer has enough data to play.
    Ready,
    /// Renderer went idle without reaching the end (source lost, stalled).
    Idle,
    /// The media item played to its end.
    Ended,
    /// Playback failed. `transient` marks errors worth one automatic retry.
    Error { message: String, transient: bool },
}

/// Renderer callback tagged with the media item it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererEvent {
    pub handle: MediaHandle,
    pub kind: RendererEventKind,
}

impl RendererEvent {
    pub fn new(handle: MediaHandle, kind: RendererEventKind) -> Self {
        Self { handle, kind }
    }
}

/// Stream of renderer callbacks.
#[async_trait::async_trait]
pub trait RendererEventStream: Send {
    /// Get the next renderer event.
    ///
    /// Returns `None` when the renderer has shut down.
    async fn next(&mut self) -> Option<RendererEvent>;
}

/// Platform audio renderer.
///
/// # Platform Support
///
/// - **Android**: ExoPlayer / Media3
/// - **iOS**: AVPlayer
/// - **Desktop**: any native audio backend
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{AudioRenderer, AudioSource, PlaybackRequest};
///
/// async fn play_file(renderer: &dyn AudioRenderer, path: PathBuf) -> Result<()> {
///     let prepared = renderer.prepare(PlaybackRequest::new(AudioSource::LocalFile { path })).await?;
///     renderer.play(prepared.handle).await
/// }
/// ```
#[async_trait::async_trait]
pub trait AudioRenderer: Send + Sync {
    /// Acquire the platform audio output and subscribe to its callbacks.
    ///
    /// Called once per playback session. Failure means no audio subsystem is
    /// usable and is not retried.
    async fn acquire(&self) -> Result<Box<dyn RendererEventStream>>;

    /// Prepare a media item. May fetch over the network or open a file, so it
    /// can take arbitrarily long.
    async fn prepare(&self, request: PlaybackRequest) -> Result<PreparedMedia>;

    /// Begin or resume playback of a prepared item.
    async fn play(&self, handle: MediaHandle) -> Result<()>;

    /// Pause playback without releasing the item.
    async fn pause(&self, handle: MediaHandle) -> Result<()>;

    /// Seek to an absolute position within the item.
    async fn seek(&self, handle: MediaHandle, position: Duration) -> Result<()>;

    /// Query the current playback position.
    async fn position(&self, handle: MediaHandle) -> Result<Duration>;

    /// Release all resources held for the item.
    async fn release(&self, handle: MediaHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prepare_gets_its_own_handle() {
        assert_ne!(MediaHandle::new(), MediaHandle::new());
    }

    #[test]
    fn request_starts_at_zero_unless_told_otherwise() {
        let source = AudioSource::RemoteStream {
            url: "https://cdn.example.com/a.mp3".into(),
        };
        assert_eq!(PlaybackRequest::new(source.clone()).start_position, Duration::ZERO);

        let request = PlaybackRequest::new(source).with_start_position(Duration::from_secs(42));
        assert!(request.source.is_remote());
        assert_eq!(request.start_position, Duration::from_secs(42));
    }
}
