//! # Playback Engine
//!
//! Wraps the platform [`AudioRenderer`] and owns the play [`Queue`].
//!
//! ## Ownership
//!
//! The engine is a plain value with `&mut self` operations. It is meant to
//! live inside exactly one task (the session actor), which makes every
//! mutation sequential without locks. Work that completes later is fed back
//! into that task as an [`EngineSignal`]:
//!
//! - **Prepare completions**: each load spawns a prepare task tagged with a
//!   generation number. A completion whose generation is no longer current
//!   is stale; its media is released and otherwise ignored.
//! - **Renderer callbacks**: a pump task forwards the renderer's event stream
//!   into the same channel. Events for media other than the current handle
//!   are dropped.
//!
//! The owner drains [`EngineSignals`] and passes each signal to
//! [`PlaybackEngine::handle_signal`].
//!
//! ## Observing
//!
//! Every transition publishes a [`PlaybackSnapshot`] with a fresh sequence
//! number, both to a `watch` channel (latest value, for late subscribers)
//! and to a `broadcast` channel (every update, in order). Coarse-grained
//! [`PlaybackEvent`]s also go out on the [`EventBus`].

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{
    AudioRenderer, BridgeError, MediaHandle, PreparedMedia, RendererEvent, RendererEventKind,
};
use core_async::sync::{broadcast, mpsc, watch, CancellationToken};
use core_async::task::{self, TaskGuard};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::{redact_locator, strip_path};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, instrument, warn};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{EndAction, Queue};
use crate::reporter::PlayCountReporter;
use crate::state::{
    CommandStatus, PlaybackSnapshot, PlaybackStatus, PositionSample, RepeatMode,
    StreamInterruption, TransportCommand, TransportState,
};
use crate::track::TrackId;

const UPDATE_BUFFER_SIZE: usize = 128;

/// Work completed outside the owning task.
#[derive(Debug)]
pub enum EngineSignal {
    /// A prepare task finished.
    Prepared {
        generation: u64,
        result: std::result::Result<PreparedMedia, BridgeError>,
    },
    /// Callback from the renderer.
    Renderer(RendererEvent),
}

/// Receiving half of the engine's signal channel.
#[derive(Debug)]
pub struct EngineSignals {
    receiver: mpsc::UnboundedReceiver<EngineSignal>,
}

impl EngineSignals {
    /// Next signal, or `None` once the engine and all its tasks are gone.
    pub async fn recv(&mut self) -> Option<EngineSignal> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<EngineSignal> {
        self.receiver.try_recv().ok()
    }
}

/// Result of [`PlaybackEngine::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The queue was replaced and its start item is being prepared.
    Loaded,
    /// The requested track is already current with the same list.
    AlreadyLoaded,
    /// The requested track is already current; only the list changed.
    ItemsReplaced,
}

/// Result of [`PlaybackEngine::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    AlreadyReleased,
}

#[derive(Debug, Clone, Copy)]
struct LoadedMedia {
    handle: MediaHandle,
    index: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingPrepare {
    generation: u64,
    index: usize,
    start_ms: u64,
}

/// Single-owner playback engine.
pub struct PlaybackEngine {
    renderer: Arc<dyn AudioRenderer>,
    config: PlaybackConfig,
    queue: Option<Queue>,
    transport: TransportState,
    status: PlaybackStatus,
    shuffle: bool,
    repeat: RepeatMode,
    media: Option<LoadedMedia>,
    pending: Option<PendingPrepare>,
    generation: u64,
    position_ms: u64,
    duration_ms: Option<u64>,
    last_error: Option<String>,
    retries_left: u32,
    interruption: Option<StreamInterruption>,
    last_started: Option<TrackId>,
    rng: StdRng,
    sequence: u64,
    state_tx: watch::Sender<PlaybackSnapshot>,
    updates_tx: broadcast::Sender<PlaybackSnapshot>,
    events: EventBus,
    reporter: PlayCountReporter,
    signals_tx: mpsc::UnboundedSender<EngineSignal>,
    cancel: CancellationToken,
    released: bool,
    _pump: TaskGuard,
}

impl PlaybackEngine {
    /// Acquire the renderer and build an idle engine.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::RendererUnavailable`] when the platform renderer
    /// cannot be acquired; [`PlaybackError::Config`] for invalid settings.
    pub async fn start(
        renderer: Arc<dyn AudioRenderer>,
        config: PlaybackConfig,
        reporter: PlayCountReporter,
        events: EventBus,
    ) -> Result<(Self, EngineSignals)> {
        config.validate()?;

        let mut stream = renderer
            .acquire()
            .await
            .map_err(|e| PlaybackError::RendererUnavailable(e.to_string()))?;

        let (signals_tx, receiver) = mpsc::unbounded_channel();
        let pump_tx = signals_tx.clone();
        let pump = TaskGuard::spawn(async move {
            while let Some(event) = stream.next().await {
                if pump_tx.send(EngineSignal::Renderer(event)).is_err() {
                    break;
                }
            }
            debug!("Renderer event stream closed");
        });

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut initial = PlaybackSnapshot::idle();
        initial.shuffle = config.start_shuffled;
        initial.repeat = config.start_repeat;
        let (state_tx, _) = watch::channel(initial);
        let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER_SIZE);

        info!(
            boundary = ?config.boundary,
            retry_limit = config.transient_retry_limit,
            play_counts = reporter.is_enabled(),
            "Playback engine started"
        );

        let engine = Self {
            renderer,
            shuffle: config.start_shuffled,
            repeat: config.start_repeat,
            retries_left: config.transient_retry_limit,
            config,
            queue: None,
            transport: TransportState::Idle,
            status: PlaybackStatus::Idle,
            media: None,
            pending: None,
            generation: 0,
            position_ms: 0,
            duration_ms: None,
            last_error: None,
            interruption: None,
            last_started: None,
            rng,
            sequence: 0,
            state_tx,
            updates_tx,
            events,
            reporter,
            signals_tx,
            cancel: CancellationToken::new(),
            released: false,
            _pump: pump,
        };

        Ok((engine, EngineSignals { receiver }))
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Latest-value channel; a new receiver sees the current snapshot.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state_tx.subscribe()
    }

    /// Every snapshot published from now on, in transition order.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<PlaybackSnapshot> {
        self.updates_tx.subscribe()
    }

    /// Sender side of the ordered update channel, for handing out receivers
    /// without holding the engine.
    pub fn updates_sender(&self) -> broadcast::Sender<PlaybackSnapshot> {
        self.updates_tx.clone()
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing && self.status == PlaybackStatus::Ready
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.queue.as_ref().map(|q| q.current().id())
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Replace the queue and begin preparing its start item.
    ///
    /// Previously loaded media is released first. When the queue's start
    /// track is the one already loaded, audio is left alone.
    #[instrument(skip(self, queue), fields(len = queue.len(), start_index = queue.current_index()))]
    pub async fn load(&mut self, mut queue: Queue) -> Result<LoadOutcome> {
        if self.released {
            return Err(PlaybackError::Released);
        }

        queue.set_repeat(self.repeat);
        queue.set_shuffle(self.shuffle, &mut self.rng);

        if let Some(current) = self.queue.as_ref().filter(|_| self.holds_live_track()) {
            if current.current().id() == queue.current().id() {
                if current.same_items(&queue) {
                    debug!(track_id = %queue.current().id(), "Track already loaded");
                    return Ok(LoadOutcome::AlreadyLoaded);
                }

                let index = queue.current_index();
                if let Some(media) = self.media.as_mut() {
                    media.index = index;
                }
                if let Some(pending) = self.pending.as_mut() {
                    pending.index = index;
                }
                self.emit(PlaybackEvent::QueueReplaced {
                    length: queue.len(),
                    start_index: index,
                });
                self.queue = Some(queue);
                self.publish();
                return Ok(LoadOutcome::ItemsReplaced);
            }
        }

        self.release_media().await;
        self.transport = self.transport.transition(TransportState::Loaded)?;
        self.status = PlaybackStatus::Buffering;
        self.position_ms = 0;
        self.duration_ms = None;
        self.last_error = None;
        self.interruption = None;
        self.retries_left = self.config.transient_retry_limit;

        let index = queue.current_index();
        info!(
            track_id = %queue.current().id(),
            len = queue.len(),
            index,
            "Queue loaded"
        );
        self.emit(PlaybackEvent::QueueReplaced {
            length: queue.len(),
            start_index: index,
        });
        self.queue = Some(queue);
        self.begin_prepare(index, 0);
        self.publish();

        Ok(LoadOutcome::Loaded)
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Apply a controller command.
    pub async fn apply(&mut self, command: TransportCommand) -> CommandStatus {
        match command {
            TransportCommand::Play => self.play().await,
            TransportCommand::Pause => self.pause().await,
            TransportCommand::TogglePlayPause => self.toggle().await,
            TransportCommand::Seek { position_ms } => self.seek(position_ms).await,
            TransportCommand::Next => self.next().await,
            TransportCommand::Previous => self.previous().await,
            TransportCommand::SetShuffle(enabled) => self.set_shuffle(enabled),
            TransportCommand::SetRepeat(mode) => self.set_repeat(mode),
        }
    }

    pub async fn play(&mut self) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }

        match self.transport {
            TransportState::Playing => return CommandStatus::Ignored,
            TransportState::Ended => {
                // Replay the last item from the top.
                self.position_ms = 0;
                self.reload_current();
            }
            TransportState::Error => self.reload_current(),
            _ => {}
        }

        self.transport = match self.transport.transition(TransportState::Playing) {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "Play ignored");
                return CommandStatus::Ignored;
            }
        };

        if let Some(media) = self.media {
            if let Err(e) = self.renderer.play(media.handle).await {
                self.handle_failure(e.to_string(), e.is_transient()).await;
                self.publish();
                return CommandStatus::Applied;
            }
            self.status = PlaybackStatus::Ready;
            self.emit_resumed();
            self.note_started();
        } else if self.pending.is_none() {
            let index = self.current_index();
            self.status = PlaybackStatus::Buffering;
            self.begin_prepare(index, self.position_ms);
        }

        self.publish();
        CommandStatus::Applied
    }

    pub async fn pause(&mut self) -> CommandStatus {
        if !self.accepts_commands() || self.transport != TransportState::Playing {
            return CommandStatus::Ignored;
        }

        if let Some(media) = self.media {
            if let Ok(position) = self.renderer.position(media.handle).await {
                self.position_ms = duration_to_ms(position);
            }
            if let Err(e) = self.renderer.pause(media.handle).await {
                warn!(error = %e, "Renderer pause failed");
            }
        }

        self.transport = TransportState::Paused;
        if let Some(track_id) = self.current_track_id() {
            self.emit(PlaybackEvent::Paused {
                track_id: track_id.to_string(),
                position_ms: self.position_ms,
            });
        }
        self.publish();
        CommandStatus::Applied
    }

    pub async fn toggle(&mut self) -> CommandStatus {
        if self.transport == TransportState::Playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Seek within the current item. Positions past the known duration are
    /// clamped to it.
    pub async fn seek(&mut self, position_ms: u64) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }

        let target = match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };

        if let Some(media) = self.media {
            if let Err(e) = self
                .renderer
                .seek(media.handle, Duration::from_millis(target))
                .await
            {
                warn!(error = %e, position_ms = target, "Renderer seek failed");
                return CommandStatus::Ignored;
            }
        }

        self.position_ms = target;
        if let Some(track_id) = self.current_track_id() {
            self.emit(PlaybackEvent::Seeked {
                track_id: track_id.to_string(),
                position_ms: target,
            });
        }
        self.publish();
        CommandStatus::Applied
    }

    pub async fn next(&mut self) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }
        let Some(queue) = self.queue.as_mut() else {
            return CommandStatus::Ignored;
        };
        match queue.advance_next(&mut self.rng) {
            Some(index) => {
                self.change_track(index).await;
                CommandStatus::Applied
            }
            None => CommandStatus::Ignored,
        }
    }

    pub async fn previous(&mut self) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }
        let Some(queue) = self.queue.as_mut() else {
            return CommandStatus::Ignored;
        };
        match queue.advance_previous(&mut self.rng) {
            Some(index) => {
                self.change_track(index).await;
                CommandStatus::Applied
            }
            None => CommandStatus::Ignored,
        }
    }

    pub fn set_shuffle(&mut self, enabled: bool) -> CommandStatus {
        if self.released {
            return CommandStatus::Ignored;
        }
        let changed = match self.queue.as_mut() {
            Some(queue) => queue.set_shuffle(enabled, &mut self.rng),
            None => self.shuffle != enabled,
        };
        self.shuffle = enabled;
        if changed {
            self.emit_modes();
            self.publish();
        }
        CommandStatus::Applied
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) -> CommandStatus {
        if self.released {
            return CommandStatus::Ignored;
        }
        let changed = self.repeat != mode;
        self.repeat = mode;
        if let Some(queue) = self.queue.as_mut() {
            queue.set_repeat(mode);
        }
        if changed {
            self.emit_modes();
            self.publish();
        }
        CommandStatus::Applied
    }

    /// Prepare and play the current item again at the last known position,
    /// with a fresh retry budget.
    pub async fn retry_current(&mut self) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }

        info!(track_id = ?self.current_track_id().map(TrackId::as_str), position_ms = self.position_ms, "Retrying current track");
        self.release_media().await;
        self.retries_left = self.config.transient_retry_limit;
        self.last_error = None;
        self.interruption = None;
        self.transport = TransportState::Playing;
        self.status = PlaybackStatus::Buffering;
        let index = self.current_index();
        self.begin_prepare(index, self.position_ms);
        self.publish();
        CommandStatus::Applied
    }

    /// Release the media but keep the queue and position; transport returns
    /// to `Loaded`.
    pub async fn stop(&mut self) -> CommandStatus {
        if !self.accepts_commands() {
            return CommandStatus::Ignored;
        }

        if let Some(media) = self.media {
            if let Ok(position) = self.renderer.position(media.handle).await {
                self.position_ms = duration_to_ms(position);
            }
        }
        self.release_media().await;
        self.pending = None;
        self.transport = TransportState::Loaded;
        self.status = PlaybackStatus::Idle;
        self.interruption = None;

        if let Some(track_id) = self.current_track_id() {
            self.emit(PlaybackEvent::Stopped {
                track_id: track_id.to_string(),
            });
        }
        self.publish();
        CommandStatus::Applied
    }

    /// Cancel in-flight prepares and release renderer resources.
    ///
    /// Safe to call more than once; only the first call touches the
    /// renderer.
    pub async fn release(&mut self) -> ReleaseOutcome {
        if self.released {
            return ReleaseOutcome::AlreadyReleased;
        }
        self.released = true;
        self.cancel.cancel();
        self.pending = None;
        self.release_media().await;

        self.queue = None;
        self.transport = TransportState::Idle;
        self.status = PlaybackStatus::Idle;
        self.position_ms = 0;
        self.duration_ms = None;
        self.interruption = None;
        self.publish();

        info!("Playback engine released");
        ReleaseOutcome::Released
    }

    /// Read the renderer position. Updates the stored position without
    /// publishing a snapshot.
    pub async fn sample_position(&mut self) -> PositionSample {
        if let Some(media) = self.media.filter(|_| self.is_playing()) {
            match self.renderer.position(media.handle).await {
                Ok(position) => self.position_ms = duration_to_ms(position),
                Err(e) => debug!(error = %e, "Position query failed"),
            }
        }
        PositionSample {
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            is_playing: self.is_playing(),
        }
    }

    /// Attach or clear a connectivity interruption notice.
    pub fn set_interruption(&mut self, interruption: Option<StreamInterruption>) {
        if self.interruption != interruption {
            self.interruption = interruption;
            self.publish();
        }
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub async fn handle_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Prepared { generation, result } => {
                self.on_prepared(generation, result).await
            }
            EngineSignal::Renderer(event) => self.on_renderer_event(event).await,
        }
    }

    async fn on_prepared(
        &mut self,
        generation: u64,
        result: std::result::Result<PreparedMedia, BridgeError>,
    ) {
        let pending = match self.pending {
            Some(pending) if pending.generation == generation && !self.released => pending,
            _ => {
                if let Ok(media) = result {
                    debug!(generation, handle = %media.handle, "Releasing stale prepare");
                    if let Err(e) = self.renderer.release(media.handle).await {
                        warn!(error = %e, "Failed to release stale media");
                    }
                }
                return;
            }
        };
        self.pending = None;

        let prepared = match result {
            Ok(prepared) => prepared,
            Err(e) => {
                self.handle_failure(e.to_string(), e.is_transient()).await;
                self.publish();
                return;
            }
        };

        self.media = Some(LoadedMedia {
            handle: prepared.handle,
            index: pending.index,
        });
        self.duration_ms = prepared.duration.map(duration_to_ms);
        self.status = PlaybackStatus::Ready;

        if self.position_ms != pending.start_ms {
            let position = Duration::from_millis(self.position_ms);
            if let Err(e) = self.renderer.seek(prepared.handle, position).await {
                warn!(error = %e, "Seek after prepare failed");
            }
        }

        if self.transport == TransportState::Playing {
            if let Err(e) = self.renderer.play(prepared.handle).await {
                self.handle_failure(e.to_string(), e.is_transient()).await;
                self.publish();
                return;
            }
            self.note_started();
        }
        self.retries_left = self.config.transient_retry_limit;

        debug!(generation, index = pending.index, "Media prepared");
        self.publish();
    }

    async fn on_renderer_event(&mut self, event: RendererEvent) {
        if self.released || self.media.map(|m| m.handle) != Some(event.handle) {
            debug!(handle = %event.handle, "Ignoring event for inactive media");
            return;
        }

        match event.kind {
            RendererEventKind::Buffering => self.status = PlaybackStatus::Buffering,
            RendererEventKind::Ready => {
                self.status = PlaybackStatus::Ready;
                self.retries_left = self.config.transient_retry_limit;
            }
            RendererEventKind::Idle => self.status = PlaybackStatus::Idle,
            RendererEventKind::Ended => {
                self.on_track_end().await;
            }
            RendererEventKind::Error { message, transient } => {
                self.handle_failure(message, transient).await;
            }
        }
        self.publish();
    }

    async fn on_track_end(&mut self) {
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        let finished = queue.current().id().to_string();
        let action = queue.on_track_end(&mut self.rng);

        self.emit(PlaybackEvent::TrackCompleted {
            track_id: finished.clone(),
        });
        self.release_media().await;
        self.position_ms = 0;

        match action {
            EndAction::Replay(index) => {
                debug!(index, "Repeating track");
                self.status = PlaybackStatus::Buffering;
                self.begin_prepare(index, 0);
            }
            EndAction::Advance(index) => {
                // Loaded(next) then automatically Playing.
                let resume = self.transport == TransportState::Playing;
                self.transport = TransportState::Loaded;
                if resume {
                    self.transport = TransportState::Playing;
                }
                self.status = PlaybackStatus::Buffering;
                self.duration_ms = None;
                self.retries_left = self.config.transient_retry_limit;
                self.emit_track_changed(Some(finished), index);
                self.begin_prepare(index, 0);
            }
            EndAction::Finished => {
                self.transport = self
                    .transport
                    .transition(TransportState::Ended)
                    .unwrap_or(TransportState::Ended);
                self.status = PlaybackStatus::Ended;
                self.position_ms = self.duration_ms.unwrap_or(0);
                info!("Queue ended");
                self.emit(PlaybackEvent::QueueEnded);
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn accepts_commands(&self) -> bool {
        !self.released && self.queue.is_some()
    }

    /// A track is loaded and not in a terminal state.
    fn holds_live_track(&self) -> bool {
        !matches!(
            self.transport,
            TransportState::Idle | TransportState::Ended | TransportState::Error
        )
    }

    fn current_index(&self) -> usize {
        self.queue.as_ref().map_or(0, Queue::current_index)
    }

    /// Move to `index` after a skip. Playing intent survives; any other
    /// state lands in `Loaded`.
    async fn change_track(&mut self, index: usize) {
        let previous = self
            .media
            .and_then(|m| self.queue.as_ref()?.get(m.index))
            .or_else(|| self.queue.as_ref().map(Queue::current))
            .map(|t| t.id().to_string());

        self.release_media().await;
        let resume = self.transport == TransportState::Playing;
        self.transport = TransportState::Loaded;
        if resume {
            self.transport = TransportState::Playing;
        }
        self.status = PlaybackStatus::Buffering;
        self.position_ms = 0;
        self.duration_ms = None;
        self.last_error = None;
        self.retries_left = self.config.transient_retry_limit;

        self.emit_track_changed(previous, index);
        self.begin_prepare(index, 0);
        self.publish();
    }

    /// Prepare the current item again, from `Ended` or `Error`.
    fn reload_current(&mut self) {
        self.transport = TransportState::Loaded;
        self.status = PlaybackStatus::Buffering;
        self.last_error = None;
        self.retries_left = self.config.transient_retry_limit;
        let index = self.current_index();
        self.begin_prepare(index, self.position_ms);
    }

    fn begin_prepare(&mut self, index: usize, start_ms: u64) {
        let Some(track) = self.queue.as_ref().and_then(|q| q.get(index)) else {
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        let request = track.to_request(Duration::from_millis(start_ms));
        let locator = track.source().locator();
        let source = if track.is_remote() {
            redact_locator(&locator)
        } else {
            strip_path(&locator)
        };
        debug!(
            track_id = %track.id(),
            origin = track.origin().as_str(),
            source,
            index,
            generation,
            start_ms,
            "Preparing track"
        );

        self.pending = Some(PendingPrepare {
            generation,
            index,
            start_ms,
        });

        let renderer = Arc::clone(&self.renderer);
        let signals = self.signals_tx.clone();
        let cancel = self.cancel.child_token();

        task::spawn(async move {
            let result = core_async::select! {
                _ = cancel.cancelled() => return,
                result = renderer.prepare(request) => result,
            };

            if cancel.is_cancelled() {
                if let Ok(media) = result {
                    let _ = renderer.release(media.handle).await;
                }
                return;
            }

            if let Err(mpsc::error::SendError(EngineSignal::Prepared {
                result: Ok(media), ..
            })) = signals.send(EngineSignal::Prepared { generation, result })
            {
                let _ = renderer.release(media.handle).await;
            }
        });
    }

    /// Release the failed media, then either reload the item (transient
    /// error with budget left) or settle in `Error`.
    async fn handle_failure(&mut self, message: String, transient: bool) {
        self.release_media().await;
        let track_id = self.current_track_id().map(ToString::to_string);

        if transient && self.retries_left > 0 {
            self.retries_left -= 1;
            let attempt = self.config.transient_retry_limit - self.retries_left;
            warn!(track_id = ?track_id, attempt, error = %message, "Transient playback error, reloading");
            if let Some(track_id) = track_id {
                self.emit(PlaybackEvent::Retrying { track_id, attempt });
            }
            self.status = PlaybackStatus::Buffering;
            let index = self.current_index();
            self.begin_prepare(index, self.position_ms);
            return;
        }

        warn!(track_id = ?track_id, error = %message, "Playback error");
        self.pending = None;
        self.transport = self
            .transport
            .transition(TransportState::Error)
            .unwrap_or(self.transport);
        self.status = PlaybackStatus::Error;
        self.last_error = Some(message.clone());
        self.emit(PlaybackEvent::Error {
            track_id,
            message,
            recoverable: transient,
        });
    }

    /// Count and announce a start when the track identity changed.
    fn note_started(&mut self) {
        let Some(track) = self.queue.as_ref().map(|q| q.current().clone()) else {
            return;
        };
        if self.last_started.as_ref() == Some(track.id()) {
            return;
        }
        self.last_started = Some(track.id().clone());

        info!(track_id = %track.id(), remote = track.is_remote(), "Track started");
        self.emit(PlaybackEvent::TrackStarted {
            track_id: track.id().to_string(),
            title: track.title().to_string(),
            remote: track.is_remote(),
        });
        self.reporter.track_started(&track);
    }

    async fn release_media(&mut self) {
        if let Some(media) = self.media.take() {
            if let Err(e) = self.renderer.release(media.handle).await {
                warn!(handle = %media.handle, error = %e, "Failed to release media");
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.emit(CoreEvent::Playback(event));
    }

    fn emit_modes(&self) {
        self.emit(PlaybackEvent::ModesChanged {
            shuffle: self.shuffle,
            repeat: self.repeat.as_str().to_string(),
        });
    }

    fn emit_resumed(&self) {
        if let Some(track_id) = self.current_track_id() {
            self.emit(PlaybackEvent::Resumed {
                track_id: track_id.to_string(),
                position_ms: self.position_ms,
            });
        }
    }

    fn emit_track_changed(&self, previous: Option<String>, index: usize) {
        if let Some(track) = self.queue.as_ref().and_then(|q| q.get(index)) {
            info!(track_id = %track.id(), index, "Track changed");
            self.emit(PlaybackEvent::TrackChanged {
                track_id: track.id().to_string(),
                previous_track_id: previous,
                index,
            });
        }
    }

    fn publish(&mut self) {
        let current_track = self.queue.as_ref().map(|q| q.current().clone());

        // A notice only stands while playback is still wanted, not yet
        // flowing, and about the same track.
        let stale_notice = self.interruption.as_ref().is_some_and(|notice| {
            self.transport != TransportState::Playing
                || self.status == PlaybackStatus::Ready
                || current_track.as_ref().map(|t| t.id()) != Some(&notice.track_id)
        });
        if stale_notice {
            self.interruption = None;
        }

        self.sequence += 1;
        let snapshot = PlaybackSnapshot {
            sequence: self.sequence,
            transport: self.transport,
            status: self.status,
            is_playing: self.is_playing(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            current_index: self.queue.as_ref().map(Queue::current_index),
            current_track,
            items: self
                .queue
                .as_ref()
                .map_or_else(|| Arc::from(Vec::new()), Queue::shared_items),
            shuffle: self.shuffle,
            repeat: self.repeat,
            error: self.last_error.clone(),
            interruption: self.interruption.clone(),
        };

        self.state_tx.send_replace(snapshot.clone());
        let _ = self.updates_tx.send(snapshot);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("transport", &self.transport)
            .field("status", &self.status)
            .field("current_index", &self.queue.as_ref().map(Queue::current_index))
            .field("generation", &self.generation)
            .field("released", &self.released)
            .finish()
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
