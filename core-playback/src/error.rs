//! # Playback Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::state::TransportState;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Queue / Track Errors
    // ========================================================================
    /// A start request carried no tracks.
    #[error("No playable items")]
    EmptyQueue,

    /// Start index does not point into the track list.
    #[error("Start index {index} out of range for {len} tracks")]
    StartIndexOutOfRange { index: usize, len: usize },

    /// The same track id appears twice in one queue.
    #[error("Duplicate track id in queue: {0}")]
    DuplicateTrack(String),

    /// Track descriptor failed validation (empty id or locator).
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Requested transition is not allowed from the current state.
    #[error("Invalid transport transition from {from} to {to}")]
    InvalidTransition {
        from: TransportState,
        to: TransportState,
    },

    /// The renderer rejected or failed an operation.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    // ========================================================================
    // Platform/Renderer Errors
    // ========================================================================
    /// The platform audio renderer could not be acquired at all.
    #[error("Audio renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// The engine was released and accepts no more commands.
    #[error("Playback engine released")]
    Released,

    /// Error reported by a bridge implementation.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Configuration value rejected.
    #[error("Invalid playback configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Bridge(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` if this error rejects a start request before any playback happened.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            PlaybackError::EmptyQueue
                | PlaybackError::StartIndexOutOfRange { .. }
                | PlaybackError::DuplicateTrack(_)
                | PlaybackError::InvalidTrack(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
