//! Transport and playback state.
//!
//! Two axes are tracked separately. [`TransportState`] is what the user
//! asked for (playing, paused, ...). [`PlaybackStatus`] is what the
//! renderer reports (buffering, ready, ...). A session is audibly playing
//! only when the transport is `Playing` and the renderer is `Ready`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::track::{TrackDescriptor, TrackId};

/// Renderer-facing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Idle,
    Buffering,
    Ready,
    Ended,
    Error,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Buffering => "buffering",
            PlaybackStatus::Ready => "ready",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Error => "error",
        }
    }
}

/// Queue/transport state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Ended,
    Error,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Loaded => "loaded",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Ended => "ended",
            TransportState::Error => "error",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(&self, next: TransportState) -> bool {
        use TransportState::*;

        if *self == next {
            return true;
        }

        match (self, next) {
            // load / reload from anywhere, release from anywhere
            (_, Loaded) | (_, Idle) => true,
            (Loaded | Paused, Playing) => true,
            (Playing, Paused) => true,
            (Playing, Ended) => true,
            (Loaded | Playing | Paused, Error) => true,
            _ => false,
        }
    }

    /// Validated transition.
    pub fn transition(self, next: TransportState) -> Result<TransportState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PlaybackError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Reload the current track when it ends.
    One,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
        }
    }

    pub fn toggled(&self) -> RepeatMode {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl FromStr for RepeatMode {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "one" => Ok(RepeatMode::One),
            other => Err(PlaybackError::Config(format!("unknown repeat mode: {other}"))),
        }
    }
}

/// Commands a controller can issue against the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlayPause,
    Seek { position_ms: u64 },
    Next,
    Previous,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
}

/// Outcome of a command, reported instead of an error across the
/// controller boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command changed (or confirmed) state.
    Applied,
    /// The command was not valid in the current state and had no effect.
    Ignored,
    /// No live session to deliver to; the command was discarded.
    Dropped,
}

impl CommandStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandStatus::Applied)
    }
}

/// A remote stream stalled while the device was offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInterruption {
    pub track_id: TrackId,
    /// Connectivity came back while the stall is still unresolved.
    pub connectivity_restored: bool,
    /// The user asked to retry once the connection returns.
    pub retry_pending: bool,
}

impl StreamInterruption {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            connectivity_restored: false,
            retry_pending: false,
        }
    }
}

/// Position reading taken from the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSample {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub is_playing: bool,
}

/// Read-only view of the engine, published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    /// Monotonic per-engine counter; later snapshots have larger values.
    pub sequence: u64,
    pub transport: TransportState,
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub current_index: Option<usize>,
    pub current_track: Option<TrackDescriptor>,
    /// Shared with the queue; replaced wholesale, never edited in place.
    pub items: Arc<[TrackDescriptor]>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    /// Description of the last unrecovered error.
    pub error: Option<String>,
    pub interruption: Option<StreamInterruption>,
}

impl PlaybackSnapshot {
    /// Snapshot of an engine with nothing loaded.
    pub fn idle() -> Self {
        Self {
            sequence: 0,
            transport: TransportState::Idle,
            status: PlaybackStatus::Idle,
            is_playing: false,
            position_ms: 0,
            duration_ms: None,
            current_index: None,
            current_track: None,
            items: Arc::from(Vec::new()),
            shuffle: false,
            repeat: RepeatMode::Off,
            error: None,
            interruption: None,
        }
    }

    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.current_track.as_ref().map(TrackDescriptor::id)
    }

    /// The user wants audio but the renderer is not producing it.
    pub fn is_stalled(&self) -> bool {
        self.transport == TransportState::Playing
            && matches!(self.status, PlaybackStatus::Idle | PlaybackStatus::Buffering)
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
