//! Play-count reporting.
//!
//! The engine decides when a start counts (a change of track identity, never
//! a restart of the same track) and hands the track here. Remote tracks bump
//! the remote play counter from a detached task, so playback never waits.

use std::sync::Arc;

use bridge_traits::PlayCountSink;
use core_async::task::{self, JoinHandle};
use tracing::debug;

use crate::track::TrackDescriptor;

pub struct PlayCountReporter {
    sink: Option<Arc<dyn PlayCountSink>>,
}

impl PlayCountReporter {
    pub fn new(sink: Option<Arc<dyn PlayCountSink>>) -> Self {
        Self { sink }
    }

    /// Reporter that never reports.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Record a counted start of `track`.
    ///
    /// Returns the spawned increment task when one was issued.
    pub fn track_started(&self, track: &TrackDescriptor) -> Option<JoinHandle<()>> {
        if !track.is_remote() {
            return None;
        }
        let sink = Arc::clone(self.sink.as_ref()?);
        let track_id = track.id().clone();

        Some(task::spawn(async move {
            match sink.increment(track_id.as_str()).await {
                Ok(()) => debug!(track_id = %track_id, "Play count incremented"),
                Err(e) => debug!(track_id = %track_id, error = %e, "Play count update failed"),
            }
        }))
    }
}

impl std::fmt::Debug for PlayCountReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayCountReporter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Counter {}

        #[async_trait::async_trait]
        impl PlayCountSink for Counter {
            async fn increment(&self, track_id: &str) -> BridgeResult<()>;
        }
    }

    fn remote(id: &str) -> TrackDescriptor {
        TrackDescriptor::remote(id, "Song", "Band", format!("https://cdn/{id}.mp3")).unwrap()
    }

    #[tokio::test]
    async fn every_reported_remote_start_increments() {
        let mut counter = MockCounter::new();
        counter
            .expect_increment()
            .with(eq("a"))
            .times(2)
            .returning(|_| Ok(()));
        counter
            .expect_increment()
            .with(eq("b"))
            .times(1)
            .returning(|_| Ok(()));

        let reporter = PlayCountReporter::new(Some(Arc::new(counter)));

        reporter.track_started(&remote("a")).unwrap().await.unwrap();
        reporter.track_started(&remote("b")).unwrap().await.unwrap();
        reporter.track_started(&remote("a")).unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn local_tracks_are_not_counted() {
        let mut counter = MockCounter::new();
        counter.expect_increment().never();

        let reporter = PlayCountReporter::new(Some(Arc::new(counter)));
        let local = TrackDescriptor::local("12", "Song", "Band", "/music/a.mp3").unwrap();

        assert!(reporter.track_started(&local).is_none());
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let mut counter = MockCounter::new();
        counter
            .expect_increment()
            .returning(|_| Err(BridgeError::Network("offline".into())));

        let reporter = PlayCountReporter::new(Some(Arc::new(counter)));
        let handle = reporter.track_started(&remote("a")).unwrap();

        assert!(handle.await.is_ok());
    }

    #[test]
    fn disabled_reporter_issues_nothing() {
        let reporter = PlayCountReporter::disabled();
        assert!(reporter.track_started(&remote("a")).is_none());
    }
}
