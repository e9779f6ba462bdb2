use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback session closed")]
    SessionClosed,

    #[error("Playback session could not be created: {0}")]
    SessionFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Playlist already exists: {0}")]
    PlaylistExists(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl ServiceError {
    pub(crate) fn missing(capability: &str, message: &str) -> Self {
        ServiceError::CapabilityMissing {
            capability: capability.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
