//! # Playback Session
//!
//! One live session owns one [`PlaybackEngine`]. The engine runs inside a
//! dedicated task (the session actor) and is reached only through a
//! [`SessionHandle`], which carries a command sender and read-only state
//! channels. Commands, prepare completions and renderer callbacks are all
//! applied by the actor, one at a time, in arrival order.

use std::fmt;

use core_async::sync::{broadcast, mpsc, oneshot, watch, CancellationToken};
use core_async::task;
use core_playback::{
    CommandStatus, EngineSignals, LoadOutcome, PlayCountReporter, PlaybackConfig, PlaybackEngine,
    PlaybackError, PlaybackSnapshot, PositionSample, Queue, ReleaseOutcome, StreamInterruption,
    TransportCommand,
};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::CoreConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::guard::{self, ChoiceRequest, InterruptionChoice};

/// Identifier of one session instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) enum SessionCommand {
    Start {
        queue: Queue,
        reply: oneshot::Sender<std::result::Result<LoadOutcome, PlaybackError>>,
    },
    Transport {
        command: TransportCommand,
        reply: oneshot::Sender<CommandStatus>,
    },
    QueryPosition {
        reply: oneshot::Sender<PositionSample>,
    },
    SetInterruption(Option<StreamInterruption>),
    RetryCurrent {
        reply: oneshot::Sender<CommandStatus>,
    },
    StopPlayback {
        reply: oneshot::Sender<CommandStatus>,
    },
    Release {
        reply: oneshot::Sender<ReleaseOutcome>,
    },
}

/// Cloneable reference to a live session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<PlaybackSnapshot>,
    updates: broadcast::Sender<PlaybackSnapshot>,
    choices: Option<mpsc::UnboundedSender<ChoiceRequest>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.clone()
    }

    /// Every snapshot published from now on, in transition order.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<PlaybackSnapshot> {
        self.updates.subscribe()
    }

    /// The session actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Deliver a transport command. A closed session reports
    /// [`CommandStatus::Dropped`].
    pub async fn send(&self, command: TransportCommand) -> CommandStatus {
        self.request(|reply| SessionCommand::Transport { command, reply })
            .await
            .unwrap_or(CommandStatus::Dropped)
    }

    /// Current position read from the renderer.
    pub async fn position(&self) -> Option<PositionSample> {
        self.request(|reply| SessionCommand::QueryPosition { reply })
            .await
    }

    pub async fn retry_current(&self) -> CommandStatus {
        self.request(|reply| SessionCommand::RetryCurrent { reply })
            .await
            .unwrap_or(CommandStatus::Dropped)
    }

    pub async fn stop_playback(&self) -> CommandStatus {
        self.request(|reply| SessionCommand::StopPlayback { reply })
            .await
            .unwrap_or(CommandStatus::Dropped)
    }

    /// Answer a connectivity interruption notice.
    ///
    /// With a running guard the choice goes to the guard, which owns the
    /// notice and may hold it before the snapshot shows it.
    pub async fn resolve_interruption(&self, choice: InterruptionChoice) -> CommandStatus {
        if let Some(choices) = &self.choices {
            let (reply, response) = oneshot::channel();
            if choices.send(ChoiceRequest { choice, reply }).is_err() {
                return CommandStatus::Dropped;
            }
            return response.await.unwrap_or(CommandStatus::Dropped);
        }

        if self.snapshot().interruption.is_none() {
            return CommandStatus::Ignored;
        }
        match choice {
            InterruptionChoice::Retry => self.retry_current().await,
            InterruptionChoice::Stop => self.stop_playback().await,
        }
    }

    pub(crate) async fn start(&self, queue: Queue) -> Result<LoadOutcome> {
        self.request(|reply| SessionCommand::Start { queue, reply })
            .await
            .ok_or(ServiceError::SessionClosed)?
            .map_err(ServiceError::from)
    }

    pub(crate) async fn set_interruption(&self, interruption: Option<StreamInterruption>) {
        if self
            .commands
            .send(SessionCommand::SetInterruption(interruption))
            .await
            .is_err()
        {
            debug!(session_id = %self.id, "Session closed before interruption update");
        }
    }

    pub(crate) async fn release(&self) -> ReleaseOutcome {
        self.request(|reply| SessionCommand::Release { reply })
            .await
            .unwrap_or(ReleaseOutcome::AlreadyReleased)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(build(reply)).await.ok()?;
        response.await.ok()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Acquire the renderer, start the actor and, when enabled, the continuity
/// guard.
pub(crate) async fn spawn_session(
    config: &CoreConfig,
    playback: PlaybackConfig,
    events: EventBus,
    cancel: CancellationToken,
) -> Result<SessionHandle> {
    let reporter = if config.features.enable_play_counts {
        PlayCountReporter::new(config.play_count_sink.clone())
    } else {
        PlayCountReporter::disabled()
    };

    let (engine, signals) =
        PlaybackEngine::start(config.renderer.clone(), playback, reporter, events.clone()).await?;

    let id = SessionId::new();
    let (commands, receiver) = mpsc::channel(config.command_buffer_size);
    let guard_channel = match (&config.network_monitor, config.features.enable_continuity_guard) {
        (Some(monitor), true) => {
            let (sender, choices) = mpsc::unbounded_channel();
            Some((sender, choices, monitor.clone()))
        }
        _ => None,
    };

    let handle = SessionHandle {
        id,
        commands,
        state: engine.subscribe_state(),
        updates: engine.updates_sender(),
        choices: guard_channel.as_ref().map(|(sender, _, _)| sender.clone()),
    };

    task::spawn(run_session(id, engine, signals, receiver, cancel.clone()));

    if let Some((_, choices, monitor)) = guard_channel {
        guard::spawn_guard(
            handle.clone(),
            monitor,
            config.timing.connectivity_poll_interval,
            events.clone(),
            choices,
            cancel,
        );
    }

    info!(session_id = %id, "Playback session created");
    let _ = events.emit(CoreEvent::Session(SessionEvent::Created {
        session_id: id.to_string(),
    }));

    Ok(handle)
}

async fn run_session(
    id: SessionId,
    mut engine: PlaybackEngine,
    mut signals: EngineSignals,
    mut commands: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) {
    loop {
        core_async::select! {
            _ = cancel.cancelled() => {
                engine.release().await;
                break;
            }
            Some(signal) = signals.recv() => engine.handle_signal(signal).await,
            command = commands.recv() => {
                let Some(command) = command else {
                    engine.release().await;
                    break;
                };
                if !apply_command(&mut engine, command).await {
                    break;
                }
            }
        }
    }
    debug!(session_id = %id, "Session actor stopped");
}

/// Returns `false` once the session should stop.
async fn apply_command(engine: &mut PlaybackEngine, command: SessionCommand) -> bool {
    match command {
        SessionCommand::Start { queue, reply } => {
            let outcome = engine.load(queue).await;
            if let Ok(LoadOutcome::Loaded) = outcome {
                engine.play().await;
            }
            let _ = reply.send(outcome);
        }
        SessionCommand::Transport { command, reply } => {
            let status = engine.apply(command).await;
            if status == CommandStatus::Ignored {
                debug!(?command, transport = %engine.transport(), "Command ignored");
            }
            let _ = reply.send(status);
        }
        SessionCommand::QueryPosition { reply } => {
            let _ = reply.send(engine.sample_position().await);
        }
        SessionCommand::SetInterruption(interruption) => engine.set_interruption(interruption),
        SessionCommand::RetryCurrent { reply } => {
            let _ = reply.send(engine.retry_current().await);
        }
        SessionCommand::StopPlayback { reply } => {
            let _ = reply.send(engine.stop().await);
        }
        SessionCommand::Release { reply } => {
            let outcome = engine.release().await;
            if reply.send(outcome).is_err() {
                warn!("Release requester went away");
            }
            return false;
        }
    }
    true
}
