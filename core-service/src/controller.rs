//! # Playback Controller
//!
//! Per-screen handle on the playback session. A screen turns button presses
//! into commands and renders the updates it receives; it never touches the
//! engine directly.
//!
//! ## Connection
//!
//! A controller is handed out before the session necessarily exists.
//! Commands issued while it is not yet connected are dropped and reported as
//! [`CommandStatus::Dropped`]; they are never queued for later.
//!
//! ## Updates
//!
//! [`subscribe`](PlaybackController::subscribe) (screen becomes visible)
//! yields the current snapshot first, then every state change in the order
//! it happened. While audio is playing it also yields a position sample
//! every poll interval; sampling stops as soon as playback pauses. Dropping
//! the subscription (screen hidden) ends only that subscription.

use std::time::Duration;

use core_async::sync::{broadcast, watch, CancellationToken};
use core_async::time::{delayed_interval, Interval};
use core_playback::{
    CommandStatus, PlaybackSnapshot, PositionSample, RepeatMode, TransportCommand,
};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use futures::stream::{self, Stream};
use tracing::{debug, info};

use crate::error::{Result, ServiceError};
use crate::guard::InterruptionChoice;
use crate::service::SessionAvailability;
use crate::session::{SessionHandle, SessionId};

/// Update delivered to a subscribed screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerUpdate {
    /// The session's state changed.
    State(PlaybackSnapshot),
    /// Periodic position reading while playing.
    Position(PositionSample),
}

pub struct PlaybackController {
    id: u64,
    availability: watch::Receiver<SessionAvailability>,
    events: EventBus,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl PlaybackController {
    pub(crate) fn new(
        id: u64,
        availability: watch::Receiver<SessionAvailability>,
        events: EventBus,
        poll_interval: Duration,
    ) -> Self {
        info!(controller_id = id, "Controller attached");
        let _ = events.emit(CoreEvent::Session(SessionEvent::ControllerAttached {
            controller_id: id.to_string(),
        }));

        Self {
            id,
            availability,
            events,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session().map(|s| s.id())
    }

    /// Wait until a session is live.
    ///
    /// # Errors
    ///
    /// [`ServiceError::SessionFailed`] when session creation failed, and
    /// [`ServiceError::SessionClosed`] when the session was released or this
    /// controller disconnected.
    pub async fn connected(&self) -> Result<()> {
        let mut availability = self.availability.clone();
        loop {
            if self.cancel.is_cancelled() {
                return Err(ServiceError::SessionClosed);
            }
            match &*availability.borrow_and_update() {
                SessionAvailability::Ready(_) => return Ok(()),
                SessionAvailability::Failed(message) => {
                    return Err(ServiceError::SessionFailed(message.clone()))
                }
                SessionAvailability::Closed => return Err(ServiceError::SessionClosed),
                SessionAvailability::Pending => {}
            }
            if availability.changed().await.is_err() {
                return Err(ServiceError::SessionClosed);
            }
        }
    }

    /// Latest snapshot, or `None` while not connected.
    pub fn snapshot(&self) -> Option<PlaybackSnapshot> {
        self.session().map(|s| s.snapshot())
    }

    pub async fn play(&self) -> CommandStatus {
        self.send(TransportCommand::Play).await
    }

    pub async fn pause(&self) -> CommandStatus {
        self.send(TransportCommand::Pause).await
    }

    pub async fn toggle_play_pause(&self) -> CommandStatus {
        self.send(TransportCommand::TogglePlayPause).await
    }

    pub async fn seek_to(&self, position_ms: u64) -> CommandStatus {
        self.send(TransportCommand::Seek { position_ms }).await
    }

    /// Seek-bar drag: `fraction` of the current duration, clamped to
    /// `0.0..=1.0`. Ignored when the duration is unknown.
    pub async fn seek_to_fraction(&self, fraction: f64) -> CommandStatus {
        let Some(snapshot) = self.snapshot() else {
            return self.dropped(TransportCommand::Seek { position_ms: 0 });
        };
        let Some(duration_ms) = snapshot.duration_ms else {
            return CommandStatus::Ignored;
        };
        let position_ms = (fraction.clamp(0.0, 1.0) * duration_ms as f64).round() as u64;
        self.seek_to(position_ms).await
    }

    pub async fn next(&self) -> CommandStatus {
        self.send(TransportCommand::Next).await
    }

    pub async fn previous(&self) -> CommandStatus {
        self.send(TransportCommand::Previous).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> CommandStatus {
        self.send(TransportCommand::SetShuffle(enabled)).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> CommandStatus {
        self.send(TransportCommand::SetRepeat(mode)).await
    }

    pub async fn toggle_shuffle(&self) -> CommandStatus {
        match self.snapshot() {
            Some(snapshot) => self.set_shuffle(!snapshot.shuffle).await,
            None => self.dropped(TransportCommand::SetShuffle(true)),
        }
    }

    pub async fn toggle_repeat(&self) -> CommandStatus {
        match self.snapshot() {
            Some(snapshot) => self.set_repeat(snapshot.repeat.toggled()).await,
            None => self.dropped(TransportCommand::SetRepeat(RepeatMode::One)),
        }
    }

    /// Answer the connectivity notice shown on screen.
    pub async fn resolve_interruption(&self, choice: InterruptionChoice) -> CommandStatus {
        match self.session() {
            Some(session) => session.resolve_interruption(choice).await,
            None => {
                debug!(controller_id = self.id, ?choice, "Dropping choice, not connected");
                CommandStatus::Dropped
            }
        }
    }

    /// Start receiving updates (screen visible).
    pub fn subscribe(&self) -> ControllerSubscription {
        ControllerSubscription {
            availability: self.availability.clone(),
            attached: None,
            last_sequence: 0,
            playing: false,
            ticker: delayed_interval(self.poll_interval),
            cancel: self.cancel.child_token(),
        }
    }

    /// Detach this controller. Playback is not affected.
    pub fn disconnect(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        info!(controller_id = self.id, "Controller detached");
        let _ = self
            .events
            .emit(CoreEvent::Session(SessionEvent::ControllerDetached {
                controller_id: self.id.to_string(),
            }));
    }

    fn session(&self) -> Option<SessionHandle> {
        if self.cancel.is_cancelled() {
            return None;
        }
        match &*self.availability.borrow() {
            SessionAvailability::Ready(session) if !session.is_closed() => Some(session.clone()),
            _ => None,
        }
    }

    async fn send(&self, command: TransportCommand) -> CommandStatus {
        match self.session() {
            Some(session) => session.send(command).await,
            None => self.dropped(command),
        }
    }

    fn dropped(&self, command: TransportCommand) -> CommandStatus {
        debug!(controller_id = self.id, ?command, "Dropping command, not connected");
        CommandStatus::Dropped
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

struct Attached {
    session: SessionHandle,
    updates: broadcast::Receiver<PlaybackSnapshot>,
}

enum Wake {
    Cancelled,
    Availability(bool),
    Update(std::result::Result<PlaybackSnapshot, broadcast::error::RecvError>),
    Tick,
}

/// Ordered stream of updates for one visible screen.
pub struct ControllerSubscription {
    availability: watch::Receiver<SessionAvailability>,
    attached: Option<Attached>,
    last_sequence: u64,
    playing: bool,
    ticker: Interval,
    cancel: CancellationToken,
}

impl ControllerSubscription {
    /// Next update, or `None` once the controller disconnects.
    ///
    /// Waits for the session to come up if it is not live yet.
    pub async fn next(&mut self) -> Option<ControllerUpdate> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            if self.attached.is_none() {
                if let Some(snapshot) = self.attach() {
                    return Some(ControllerUpdate::State(snapshot));
                }
                let changed = core_async::select! {
                    _ = self.cancel.cancelled() => return None,
                    changed = self.availability.changed() => changed,
                };
                if changed.is_err() {
                    return None;
                }
                continue;
            }
            let Some(attached) = self.attached.as_mut() else {
                continue;
            };

            let playing = self.playing;
            let wake = core_async::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                changed = self.availability.changed() => Wake::Availability(changed.is_ok()),
                update = attached.updates.recv() => Wake::Update(update),
                _ = self.ticker.tick(), if playing => Wake::Tick,
            };

            match wake {
                Wake::Cancelled => return None,
                Wake::Availability(false) => return None,
                Wake::Availability(true) => {
                    let current = match &*self.availability.borrow_and_update() {
                        SessionAvailability::Ready(session) => Some(session.id()),
                        _ => None,
                    };
                    if current != Some(attached.session.id()) {
                        debug!("Session changed, re-attaching");
                        self.detach();
                    }
                }
                Wake::Update(Ok(snapshot)) => {
                    if let Some(snapshot) = self.accept(snapshot) {
                        return Some(ControllerUpdate::State(snapshot));
                    }
                }
                Wake::Update(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!(skipped, "Subscription lagged, resyncing");
                    let latest = attached.session.snapshot();
                    if let Some(snapshot) = self.accept(latest) {
                        return Some(ControllerUpdate::State(snapshot));
                    }
                }
                Wake::Update(Err(broadcast::error::RecvError::Closed)) => self.detach(),
                Wake::Tick => {
                    if let Some(sample) = attached.session.position().await {
                        if sample.is_playing {
                            return Some(ControllerUpdate::Position(sample));
                        }
                    }
                }
            }
        }
    }

    /// The subscription as a `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = ControllerUpdate> {
        stream::unfold(self, |mut subscription| async move {
            let update = subscription.next().await?;
            Some((update, subscription))
        })
    }

    /// Whether position sampling is currently active.
    pub fn is_polling(&self) -> bool {
        self.attached.is_some() && self.playing
    }

    fn attach(&mut self) -> Option<PlaybackSnapshot> {
        let session = match &*self.availability.borrow_and_update() {
            SessionAvailability::Ready(session) if !session.is_closed() => session.clone(),
            _ => return None,
        };

        // Subscribe before reading the snapshot so nothing falls in between.
        let updates = session.subscribe_updates();
        let snapshot = session.snapshot();
        self.attached = Some(Attached { session, updates });
        self.last_sequence = 0;
        self.accept(snapshot)
    }

    fn detach(&mut self) {
        self.attached = None;
        self.playing = false;
    }

    /// Drop snapshots already delivered; track playing state for polling.
    fn accept(&mut self, snapshot: PlaybackSnapshot) -> Option<PlaybackSnapshot> {
        if snapshot.sequence <= self.last_sequence && self.last_sequence != 0 {
            return None;
        }
        self.last_sequence = snapshot.sequence;

        if snapshot.is_playing && !self.playing {
            self.ticker.reset();
        }
        self.playing = snapshot.is_playing;
        Some(snapshot)
    }
}
