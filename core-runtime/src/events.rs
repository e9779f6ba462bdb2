//! # Event Bus System
//!
//! Process-wide event channel for the playback core, built on
//! `tokio::sync::broadcast`. Modules publish typed [`CoreEvent`]s describing
//! what happened (a track started, a controller attached, a stream lost its
//! connection) and any number of observers subscribe independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Playback Engine├─────────>│           ├────────────>│ Analytics  │
//! └────────────────┘          │ EventBus  │             └────────────┘
//! ┌────────────────┐   emit   │ (broadcast│  subscribe  ┌────────────┐
//! │ Session Service├─────────>│  channel) ├────────────>│ Host UI    │
//! └────────────────┘          │           │             └────────────┘
//! ┌────────────────┐   emit   │           │
//! │Continuity Guard├─────────>│           │
//! └────────────────┘          └───────────┘
//! ```
//!
//! Per-screen state synchronisation does not go through this bus: each
//! session publishes ordered state snapshots on its own channel. The bus is
//! for coarse, domain-level notifications.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Paused {
//!     track_id: "song-1".to_string(),
//!     position_ms: 12_000,
//! }))
//! .ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed; publishers ignore that case.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport and queue events from the playback engine
    Playback(PlaybackEvent),
    /// Session lifecycle and controller attachment
    Session(SessionEvent),
    /// Remote stream continuity
    Connectivity(ConnectivityEvent),
    /// Saved playlist changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Severity used by hosts to decide whether to surface the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::Retrying { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Created { .. })
            | CoreEvent::Session(SessionEvent::Released { .. })
            | CoreEvent::Playback(PlaybackEvent::TrackStarted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new queue replaced the previous one.
    QueueReplaced { length: usize, start_index: usize },
    /// Audio began for a track identity that was not already playing.
    TrackStarted {
        track_id: String,
        title: String,
        remote: bool,
    },
    Paused { track_id: String, position_ms: u64 },
    Resumed { track_id: String, position_ms: u64 },
    Seeked { track_id: String, position_ms: u64 },
    /// The current index moved (skip, auto-advance, repeat reload).
    TrackChanged {
        track_id: String,
        previous_track_id: Option<String>,
        index: usize,
    },
    ModesChanged { shuffle: bool, repeat: String },
    /// The renderer played the track to its end.
    TrackCompleted { track_id: String },
    /// The last track finished with nothing queued after it.
    QueueEnded,
    /// A transient failure is being retried by reloading the item.
    Retrying { track_id: String, attempt: u32 },
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
    /// Media released while the queue is kept.
    Stopped { track_id: String },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::QueueReplaced { .. } => "Queue replaced",
            PlaybackEvent::TrackStarted { .. } => "Track started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::ModesChanged { .. } => "Shuffle or repeat changed",
            PlaybackEvent::TrackCompleted { .. } => "Track completed",
            PlaybackEvent::QueueEnded => "Queue ended",
            PlaybackEvent::Retrying { .. } => "Retrying playback",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    Created { session_id: String },
    ControllerAttached { controller_id: String },
    ControllerDetached { controller_id: String },
    /// A stop request arrived while audio was playing and was not honoured.
    TeardownDeferred { session_id: String },
    Released { session_id: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Created { .. } => "Playback session created",
            SessionEvent::ControllerAttached { .. } => "Controller attached",
            SessionEvent::ControllerDetached { .. } => "Controller detached",
            SessionEvent::TeardownDeferred { .. } => "Teardown deferred while playing",
            SessionEvent::Released { .. } => "Playback session released",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    /// A remote stream stalled while offline. Fired once per stall.
    StreamInterrupted { track_id: String },
    ConnectivityRestored { track_id: String },
    RetryRequested { track_id: String },
    StoppedOffline { track_id: String },
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::StreamInterrupted { .. } => "Stream interrupted by network loss",
            ConnectivityEvent::ConnectivityRestored { .. } => "Connectivity restored",
            ConnectivityEvent::RetryRequested { .. } => "Stream retry requested",
            ConnectivityEvent::StoppedOffline { .. } => "Playback stopped while offline",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    PlaylistCreated { name: String },
    PlaylistUpdated { name: String, track_count: usize },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap and every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscription receiving every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscription wrapped in an [`EventStream`] for filtering.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Bus subscription that skips events failing a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Replaces any earlier predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn wanted(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |keep| keep(event))
    }

    /// Next matching event. Lag and closure surface exactly as on a raw
    /// [`Receiver`].
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wanted(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` once nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wanted(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(track: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Paused {
            track_id: track.to_string(),
            position_ms: 1_000,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(paused("a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_in_order() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(paused("a")).unwrap();
        bus.emit(paused("b")).unwrap();

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.recv().await.unwrap(), paused("a"));
            assert_eq!(sub.recv().await.unwrap(), paused("b"));
        }
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = bus
            .stream()
            .filter(|e| matches!(e, CoreEvent::Connectivity(_)));

        bus.emit(paused("a")).unwrap();
        bus.emit(CoreEvent::Connectivity(
            ConnectivityEvent::StreamInterrupted {
                track_id: "remote-1".to_string(),
            },
        ))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted { .. })
        ));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(paused(&format!("t{i}"))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "decoder".to_string(),
            recoverable: false,
        });
        let interrupted = CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted {
            track_id: "x".to_string(),
        });

        assert_eq!(error.severity(), EventSeverity::Error);
        assert_eq!(interrupted.severity(), EventSeverity::Warning);
        assert_eq!(paused("a").severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Session(SessionEvent::ControllerAttached {
            controller_id: "c-1".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Session\""));
        assert!(json.contains("\"event\":\"ControllerAttached\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_descriptions() {
        assert_eq!(paused("a").description(), "Playback paused");
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::QueueEnded).description(),
            "Queue ended"
        );
        assert_eq!(
            CoreEvent::Library(LibraryEvent::PlaylistCreated {
                name: "Road".to_string()
            })
            .description(),
            "Playlist created"
        );
    }
}
