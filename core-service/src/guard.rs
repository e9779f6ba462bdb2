//! # Remote Playback Continuity Guard
//!
//! Tells "the renderer went idle because the network dropped" apart from
//! "the renderer is idle because playback finished or was paused".
//!
//! A stream is *at risk* when the user wants audio (transport `Playing`),
//! the renderer is not producing it (status `Idle` or `Buffering`) and the
//! current track is remote. Only then is the connectivity probe consulted.
//! If the probe reports offline, one [`StreamInterruption`] notice is raised
//! and latched until the state changes: transport leaves `Playing`, the
//! renderer reaches `Ready`, or the track changes.
//!
//! The user answers a notice with [`InterruptionChoice::Retry`] (prepare and
//! play the same item again, as soon as the connection is back) or
//! [`InterruptionChoice::Stop`] (release the media, keep the queue).

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::NetworkMonitor;
use core_async::sync::{mpsc, oneshot, CancellationToken};
use core_async::task;
use core_async::time::delayed_interval;
use core_playback::{CommandStatus, PlaybackSnapshot, StreamInterruption, TrackId};
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus};
use tracing::{debug, info, warn};

use crate::session::SessionHandle;

/// The user's answer to an interruption notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionChoice {
    /// Resume streaming the same item once connectivity returns.
    Retry,
    /// Give up and fall back to a stopped state.
    Stop,
}

/// A user choice routed to the guard task, answered once it is applied.
pub(crate) struct ChoiceRequest {
    pub(crate) choice: InterruptionChoice,
    pub(crate) reply: oneshot::Sender<CommandStatus>,
}

/// What the guard concluded from one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Nothing to report.
    Steady,
    /// A new notice was raised.
    Interrupted(StreamInterruption),
    /// Connectivity came back while the notice stands.
    Recovered(StreamInterruption),
    /// The user chose retry while offline; waiting for the connection.
    RetryPending(StreamInterruption),
    /// The notice no longer applies.
    Cleared,
    /// Re-issue prepare + play for this track.
    RetryNow(TrackId),
    /// Degrade to stopped for this track.
    Stop(TrackId),
}

/// Latching detector. Pure state machine; the runner task feeds it.
#[derive(Debug, Default)]
pub struct ContinuityGuard {
    notice: Option<StreamInterruption>,
}

impl ContinuityGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback is wanted, stalled, and streaming from the network.
    pub fn at_risk(snapshot: &PlaybackSnapshot) -> bool {
        snapshot.is_stalled()
            && snapshot
                .current_track
                .as_ref()
                .is_some_and(|track| track.is_remote())
    }

    /// Whether observing this snapshot needs a connectivity probe.
    pub fn needs_probe(&self, snapshot: &PlaybackSnapshot) -> bool {
        Self::at_risk(snapshot)
    }

    pub fn notice(&self) -> Option<&StreamInterruption> {
        self.notice.as_ref()
    }

    /// Feed one snapshot together with the probe result.
    ///
    /// `online` is ignored when the snapshot is not at risk.
    pub fn observe(&mut self, snapshot: &PlaybackSnapshot, online: bool) -> GuardVerdict {
        let at_risk = Self::at_risk(snapshot);

        let Some(notice) = self.notice.as_mut() else {
            if at_risk && !online {
                if let Some(track_id) = snapshot.current_track_id() {
                    let notice = StreamInterruption::new(track_id.clone());
                    self.notice = Some(notice.clone());
                    return GuardVerdict::Interrupted(notice);
                }
            }
            return GuardVerdict::Steady;
        };

        if !at_risk || snapshot.current_track_id() != Some(&notice.track_id) {
            self.notice = None;
            return GuardVerdict::Cleared;
        }

        match (online, notice.connectivity_restored) {
            (true, false) => {
                notice.connectivity_restored = true;
                if notice.retry_pending {
                    let track_id = notice.track_id.clone();
                    self.notice = None;
                    GuardVerdict::RetryNow(track_id)
                } else {
                    GuardVerdict::Recovered(notice.clone())
                }
            }
            (false, true) => {
                // Lost again; a later recovery is reported again.
                notice.connectivity_restored = false;
                GuardVerdict::Steady
            }
            _ => GuardVerdict::Steady,
        }
    }

    /// Apply the user's answer to the standing notice.
    pub fn resolve(&mut self, choice: InterruptionChoice, online: bool) -> GuardVerdict {
        let Some(notice) = self.notice.as_mut() else {
            return GuardVerdict::Steady;
        };

        match choice {
            InterruptionChoice::Retry if online => {
                let track_id = notice.track_id.clone();
                self.notice = None;
                GuardVerdict::RetryNow(track_id)
            }
            InterruptionChoice::Retry => {
                notice.retry_pending = true;
                GuardVerdict::RetryPending(notice.clone())
            }
            InterruptionChoice::Stop => {
                let track_id = notice.track_id.clone();
                self.notice = None;
                GuardVerdict::Stop(track_id)
            }
        }
    }
}

pub(crate) fn spawn_guard(
    session: SessionHandle,
    monitor: Arc<dyn NetworkMonitor>,
    poll_interval: Duration,
    events: EventBus,
    choices: mpsc::UnboundedReceiver<ChoiceRequest>,
    cancel: CancellationToken,
) {
    task::spawn(run_guard(
        session,
        monitor,
        poll_interval,
        events,
        choices,
        cancel,
    ));
}

enum Wake {
    State,
    Tick,
    Choice(ChoiceRequest),
    Stop,
}

async fn run_guard(
    session: SessionHandle,
    monitor: Arc<dyn NetworkMonitor>,
    poll_interval: Duration,
    events: EventBus,
    mut choices: mpsc::UnboundedReceiver<ChoiceRequest>,
    cancel: CancellationToken,
) {
    let mut guard = ContinuityGuard::new();
    let mut state = session.watch_state();
    let mut ticker = delayed_interval(poll_interval);

    debug!(session_id = %session.id(), ?poll_interval, "Continuity guard started");

    loop {
        let wake = core_async::select! {
            _ = cancel.cancelled() => Wake::Stop,
            changed = state.changed() => match changed {
                Ok(()) => Wake::State,
                Err(_) => Wake::Stop,
            },
            _ = ticker.tick() => Wake::Tick,
            choice = choices.recv() => match choice {
                Some(choice) => Wake::Choice(choice),
                None => Wake::Stop,
            },
        };

        let snapshot = state.borrow_and_update().clone();
        let verdict = match wake {
            Wake::Stop => break,
            Wake::Choice(ChoiceRequest { choice, reply }) => {
                let online = monitor.is_connected().await;
                let verdict = guard.resolve(choice, online);
                let status = if verdict == GuardVerdict::Steady {
                    debug!(?choice, "No standing interruption");
                    CommandStatus::Ignored
                } else {
                    info!(?choice, online, "Interruption resolved by user");
                    CommandStatus::Applied
                };
                apply_verdict(&session, &events, verdict).await;
                let _ = reply.send(status);
                continue;
            }
            Wake::State | Wake::Tick => {
                if guard.notice().is_none() && !guard.needs_probe(&snapshot) {
                    continue;
                }
                let online = if guard.needs_probe(&snapshot) {
                    monitor.is_connected().await
                } else {
                    true
                };
                guard.observe(&snapshot, online)
            }
        };

        apply_verdict(&session, &events, verdict).await;
    }

    debug!(session_id = %session.id(), "Continuity guard stopped");
}

async fn apply_verdict(session: &SessionHandle, events: &EventBus, verdict: GuardVerdict) {
    let emit = |event: ConnectivityEvent| {
        let _ = events.emit(CoreEvent::Connectivity(event));
    };

    match verdict {
        GuardVerdict::Steady => {}
        GuardVerdict::Interrupted(notice) => {
            warn!(track_id = %notice.track_id, "Stream stalled while offline");
            emit(ConnectivityEvent::StreamInterrupted {
                track_id: notice.track_id.to_string(),
            });
            session.set_interruption(Some(notice)).await;
        }
        GuardVerdict::Recovered(notice) => {
            info!(track_id = %notice.track_id, "Connectivity restored");
            emit(ConnectivityEvent::ConnectivityRestored {
                track_id: notice.track_id.to_string(),
            });
            session.set_interruption(Some(notice)).await;
        }
        GuardVerdict::RetryPending(notice) => {
            session.set_interruption(Some(notice)).await;
        }
        GuardVerdict::Cleared => {
            session.set_interruption(None).await;
        }
        GuardVerdict::RetryNow(track_id) => {
            emit(ConnectivityEvent::RetryRequested {
                track_id: track_id.to_string(),
            });
            session.retry_current().await;
        }
        GuardVerdict::Stop(track_id) => {
            emit(ConnectivityEvent::StoppedOffline {
                track_id: track_id.to_string(),
            });
            session.stop_playback().await;
        }
    }
}
