//! Now-playing view model.
//!
//! Everything a player screen draws, derived from a [`PlaybackSnapshot`]
//! and refreshed by [`PositionSample`]s. Hosts render these fields as-is.

use core_playback::{
    PlaybackSnapshot, PlaybackStatus, PositionSample, RepeatMode, TransportState,
};
use serde::Serialize;

const NO_TIME: &str = "00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayPauseIcon {
    Play,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlayingView {
    pub has_track: bool,
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
    /// Pause while the user wants audio, play otherwise.
    pub icon: PlayPauseIcon,
    pub elapsed_text: String,
    pub duration_text: String,
    /// Seek-bar position in `0.0..=1.0`.
    pub progress: f32,
    pub shuffle_highlighted: bool,
    pub repeat_highlighted: bool,
    pub buffering: bool,
    pub error: Option<String>,
    /// Connectivity notice, shown with retry and stop actions.
    pub banner: Option<String>,
    #[serde(skip)]
    position_ms: u64,
    #[serde(skip)]
    duration_ms: Option<u64>,
}

impl NowPlayingView {
    pub fn from_snapshot(snapshot: &PlaybackSnapshot) -> Self {
        let (title, artist, artwork) = match &snapshot.current_track {
            Some(track) => (
                track.title().to_string(),
                track.artist().to_string(),
                track.artwork().map(str::to_string),
            ),
            None => (String::new(), String::new(), None),
        };

        let icon = if snapshot.transport == TransportState::Playing {
            PlayPauseIcon::Pause
        } else {
            PlayPauseIcon::Play
        };

        let banner = snapshot.interruption.as_ref().map(|notice| {
            if notice.retry_pending {
                "Waiting for a connection to resume playback".to_string()
            } else if notice.connectivity_restored {
                "Connection restored. Retry playback?".to_string()
            } else {
                "No internet connection. Playback paused until the network returns".to_string()
            }
        });

        let mut view = Self {
            has_track: snapshot.current_track.is_some(),
            title,
            artist,
            artwork,
            icon,
            elapsed_text: NO_TIME.to_string(),
            duration_text: NO_TIME.to_string(),
            progress: 0.0,
            shuffle_highlighted: snapshot.shuffle,
            repeat_highlighted: snapshot.repeat == RepeatMode::One,
            buffering: snapshot.transport == TransportState::Playing
                && snapshot.status == PlaybackStatus::Buffering,
            error: snapshot.error.clone(),
            banner,
            position_ms: snapshot.position_ms,
            duration_ms: snapshot.duration_ms,
        };
        view.refresh_times();
        view
    }

    /// Refresh the time labels and seek bar from a position sample.
    pub fn apply_position(&mut self, sample: &PositionSample) {
        self.position_ms = sample.position_ms;
        if sample.duration_ms.is_some() {
            self.duration_ms = sample.duration_ms;
        }
        self.refresh_times();
    }

    fn refresh_times(&mut self) {
        self.elapsed_text = format_time(self.position_ms);
        self.duration_text = self.duration_ms.map_or_else(|| NO_TIME.to_string(), format_time);
        self.progress = match self.duration_ms {
            Some(duration) if duration > 0 => {
                (self.position_ms.min(duration) as f64 / duration as f64) as f32
            }
            _ => 0.0,
        };
    }
}

/// `mm:ss`, minutes not wrapped at the hour.
pub fn format_time(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
