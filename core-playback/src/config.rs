//! # Playback Configuration
//!
//! Queue and engine policy.

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};
use crate::state::RepeatMode;

const MAX_TRANSIENT_RETRIES: u32 = 5;

/// What `next`/`previous` do at the ends of the queue.
///
/// Natural end of the last track with repeat off always ends the queue;
/// this only governs explicit skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Skipping past the last track goes to the first, and vice versa.
    #[default]
    Wrap,
    /// Skipping past either end is ignored.
    Clamp,
}

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Skip behaviour at queue boundaries.
    ///
    /// Default: [`BoundaryPolicy::Wrap`].
    #[serde(default)]
    pub boundary: BoundaryPolicy,

    /// How many times a transient renderer error is retried by reloading
    /// the current item before it is surfaced.
    ///
    /// Default: 1.
    #[serde(default = "default_transient_retry_limit")]
    pub transient_retry_limit: u32,

    /// Seed for shuffle order. `None` draws from OS entropy; a fixed seed
    /// makes shuffle order reproducible.
    ///
    /// Default: `None`.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,

    /// Shuffle state applied to the first queue of a session.
    ///
    /// Default: false.
    #[serde(default)]
    pub start_shuffled: bool,

    /// Repeat mode applied to the first queue of a session.
    ///
    /// Default: [`RepeatMode::Off`].
    #[serde(default)]
    pub start_repeat: RepeatMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryPolicy::default(),
            transient_retry_limit: default_transient_retry_limit(),
            shuffle_seed: None,
            start_shuffled: false,
            start_repeat: RepeatMode::Off,
        }
    }
}

impl PlaybackConfig {
    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_transient_retry_limit(mut self, limit: u32) -> Self {
        self.transient_retry_limit = limit;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.transient_retry_limit > MAX_TRANSIENT_RETRIES {
            return Err(PlaybackError::Config(format!(
                "transient_retry_limit must be at most {MAX_TRANSIENT_RETRIES}"
            )));
        }
        Ok(())
    }
}

fn default_transient_retry_limit() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.boundary, BoundaryPolicy::Wrap);
        assert_eq!(config.transient_retry_limit, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"boundary":"clamp"}"#).unwrap();
        assert_eq!(config.boundary, BoundaryPolicy::Clamp);
        assert_eq!(config.transient_retry_limit, 1);
        assert_eq!(config.start_repeat, RepeatMode::Off);
    }

    #[test]
    fn rejects_excessive_retries() {
        let config = PlaybackConfig::default().with_transient_retry_limit(50);
        assert!(config.validate().is_err());
    }
}
