//! # Playback Session Service
//!
//! Process-scoped owner of the single playback session. Hosts create one
//! [`PlaybackService`] at startup and hand clones to every screen; there is
//! no global instance.
//!
//! - [`start`](PlaybackService::start) validates and copies the track list,
//!   creates the session on first use, then loads and plays. Asking again
//!   for the track that is already current does nothing audible.
//! - [`connect`](PlaybackService::connect) returns a controller at once and
//!   creates the session in the background if there is none yet.
//! - [`stop`](PlaybackService::stop) releases the session unless it is
//!   playing. Releasing twice is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use core_async::sync::{watch, CancellationToken, Mutex};
use core_async::task;
use core_playback::{
    queue::validate_tracks, LoadOutcome, PlaybackConfig, PlaybackSnapshot, Queue, ReleaseOutcome,
    TrackDescriptor, TransportState,
};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::CoreConfig;
use tracing::{debug, info, instrument, warn};

use crate::controller::PlaybackController;
use crate::error::Result;
use crate::session::{spawn_session, SessionHandle, SessionId};

/// Result of [`PlaybackService::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new queue was loaded and playback requested.
    Started,
    /// The requested track is already the current one; nothing restarted.
    AlreadyActive,
}

/// Result of [`PlaybackService::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Audio is playing; the session stays up.
    Deferred,
    /// The session was released by this call.
    Released,
    /// There was no live session.
    AlreadyReleased,
}

/// Whether a session can be reached, as seen by controllers.
#[derive(Debug, Clone)]
pub enum SessionAvailability {
    /// Being created (or never requested).
    Pending,
    Ready(SessionHandle),
    /// Creation failed with this message.
    Failed(String),
    /// Released by [`PlaybackService::stop`].
    Closed,
}

struct Inner {
    config: CoreConfig,
    playback: PlaybackConfig,
    events: EventBus,
    session: Mutex<Option<SessionHandle>>,
    availability: watch::Sender<SessionAvailability>,
    cancel: CancellationToken,
    next_controller: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owner of the playback session. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackService {
    inner: Arc<Inner>,
}

impl PlaybackService {
    pub fn new(config: CoreConfig, playback: PlaybackConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        let (availability, _) = watch::channel(SessionAvailability::Pending);

        Self {
            inner: Arc::new(Inner {
                config,
                playback,
                events,
                session: Mutex::new(None),
                availability,
                cancel: CancellationToken::new(),
                next_controller: AtomicU64::new(1),
            }),
        }
    }

    /// Event bus carrying playback, session and connectivity events.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Start playing `tracks` from `start_index`.
    ///
    /// The list is copied before anything else happens. An empty list, an
    /// out-of-range index or duplicate ids are rejected here, before any
    /// session exists or the renderer is touched.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn start(&self, tracks: &[TrackDescriptor], start_index: usize) -> Result<StartOutcome> {
        let tracks = tracks.to_vec();
        validate_tracks(&tracks, start_index)?;
        let queue = Queue::new(tracks, start_index, self.inner.playback.boundary)?;

        let session = self.ensure_session().await?;
        let outcome = match session.start(queue).await? {
            LoadOutcome::Loaded => StartOutcome::Started,
            LoadOutcome::AlreadyLoaded | LoadOutcome::ItemsReplaced => StartOutcome::AlreadyActive,
        };

        debug!(?outcome, session_id = %session.id(), "Start handled");
        Ok(outcome)
    }

    /// Handle for a screen. Never blocks; commands issued before the
    /// session is live are dropped.
    pub fn connect(&self) -> PlaybackController {
        let needs_session = !matches!(
            *self.inner.availability.borrow(),
            SessionAvailability::Ready(_)
        );
        if needs_session {
            let service = self.clone();
            task::spawn(async move {
                if let Err(e) = service.ensure_session().await {
                    warn!(error = %e, "Background session creation failed");
                }
            });
        }

        let id = self.inner.next_controller.fetch_add(1, Ordering::Relaxed);
        PlaybackController::new(
            id,
            self.inner.availability.subscribe(),
            self.inner.events.clone(),
            self.inner.config.timing.position_poll_interval,
        )
    }

    /// Release the session unless audio is playing.
    pub async fn stop(&self) -> TeardownOutcome {
        let mut slot = self.inner.session.lock().await;
        let Some(session) = slot.as_ref().filter(|s| !s.is_closed()) else {
            return TeardownOutcome::AlreadyReleased;
        };

        let id = session.id();
        if session.snapshot().transport == TransportState::Playing {
            info!(session_id = %id, "Teardown deferred while playing");
            self.emit(SessionEvent::TeardownDeferred {
                session_id: id.to_string(),
            });
            return TeardownOutcome::Deferred;
        }

        let outcome = session.release().await;
        *slot = None;
        self.inner
            .availability
            .send_replace(SessionAvailability::Closed);

        match outcome {
            ReleaseOutcome::Released => {
                info!(session_id = %id, "Session released");
                self.emit(SessionEvent::Released {
                    session_id: id.to_string(),
                });
                TeardownOutcome::Released
            }
            ReleaseOutcome::AlreadyReleased => TeardownOutcome::AlreadyReleased,
        }
    }

    /// Latest snapshot of the live session, if any.
    pub fn snapshot(&self) -> Option<PlaybackSnapshot> {
        match &*self.inner.availability.borrow() {
            SessionAvailability::Ready(session) => Some(session.snapshot()),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &*self.inner.availability.borrow() {
            SessionAvailability::Ready(session) => Some(session.id()),
            _ => None,
        }
    }

    async fn ensure_session(&self) -> Result<SessionHandle> {
        let mut slot = self.inner.session.lock().await;
        if let Some(session) = slot.as_ref().filter(|s| !s.is_closed()) {
            return Ok(session.clone());
        }

        self.inner
            .availability
            .send_replace(SessionAvailability::Pending);

        match spawn_session(
            &self.inner.config,
            self.inner.playback.clone(),
            self.inner.events.clone(),
            self.inner.cancel.child_token(),
        )
        .await
        {
            Ok(session) => {
                *slot = Some(session.clone());
                self.inner
                    .availability
                    .send_replace(SessionAvailability::Ready(session.clone()));
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Session creation failed");
                self.inner
                    .availability
                    .send_replace(SessionAvailability::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.events.emit(CoreEvent::Session(event));
    }
}

impl std::fmt::Debug for PlaybackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService")
            .field("session_id", &self.session_id())
            .finish()
    }
}
