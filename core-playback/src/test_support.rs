//! In-memory renderer for tests.
//!
//! [`ScriptedRenderer`] implements [`AudioRenderer`] without any audio. It
//! records every call, can be told to fail or hold prepares, and lets a
//! test inject renderer callbacks with [`ScriptedRenderer::emit`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{
    AudioRenderer, BridgeError, MediaHandle, PlaybackRequest, PreparedMedia, RendererEvent,
    RendererEventKind, RendererEventStream,
};
use core_async::sync::{mpsc, Semaphore};
use parking_lot::Mutex;

const DEFAULT_DURATION: Duration = Duration::from_secs(180);

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererCall {
    Acquire,
    Prepare { track_id: String, start: Duration },
    Play(MediaHandle),
    Pause(MediaHandle),
    Seek(MediaHandle, Duration),
    Release(MediaHandle),
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<RendererCall>,
    prepared: Vec<(MediaHandle, String)>,
    live: HashSet<MediaHandle>,
    released: HashMap<MediaHandle, usize>,
    positions: HashMap<MediaHandle, Duration>,
    position_override: Option<Duration>,
    prepare_failures: VecDeque<BridgeError>,
    acquire_failure: Option<String>,
    hold_prepares: bool,
    duration: Option<Duration>,
}

/// Scriptable [`AudioRenderer`].
pub struct ScriptedRenderer {
    script: Mutex<Script>,
    events: Mutex<Option<mpsc::UnboundedSender<RendererEvent>>>,
    gate: Semaphore,
}

impl Default for ScriptedRenderer {
    fn default() -> Self {
        Self {
            script: Mutex::new(Script {
                duration: Some(DEFAULT_DURATION),
                ..Script::default()
            }),
            events: Mutex::new(None),
            gate: Semaphore::new(0),
        }
    }
}

impl ScriptedRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `acquire` fails with `message`.
    pub fn fail_acquire(&self, message: impl Into<String>) {
        self.script.lock().acquire_failure = Some(message.into());
    }

    /// Queue a failure for the next prepare call.
    pub fn fail_next_prepare(&self, error: BridgeError) {
        self.script.lock().prepare_failures.push_back(error);
    }

    /// Block prepares until [`allow_prepares`](Self::allow_prepares) is called.
    pub fn hold_prepares(&self) {
        self.script.lock().hold_prepares = true;
    }

    /// Let `count` held prepares complete.
    pub fn allow_prepares(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Duration reported for prepared media; `None` for a live stream.
    pub fn set_duration(&self, duration: Option<Duration>) {
        self.script.lock().duration = duration;
    }

    /// Position reported for every handle.
    pub fn set_position(&self, position: Duration) {
        self.script.lock().position_override = Some(position);
    }

    /// Inject a renderer callback.
    pub fn emit(&self, handle: MediaHandle, kind: RendererEventKind) {
        if let Some(sender) = self.events.lock().as_ref() {
            let _ = sender.send(RendererEvent::new(handle, kind));
        }
    }

    pub fn calls(&self) -> Vec<RendererCall> {
        self.script.lock().calls.clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RendererCall::Prepare { .. }))
            .count()
    }

    pub fn play_count(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RendererCall::Play(_)))
            .count()
    }

    /// Track ids in prepare order.
    pub fn prepared_tracks(&self) -> Vec<String> {
        self.script
            .lock()
            .prepared
            .iter()
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Handle returned for the most recent prepare of `track_id`.
    pub fn handle_for(&self, track_id: &str) -> Option<MediaHandle> {
        self.script
            .lock()
            .prepared
            .iter()
            .rev()
            .find(|(_, id)| id == track_id)
            .map(|(handle, _)| *handle)
    }

    /// Most recently prepared handle that is still live.
    pub fn current_handle(&self) -> Option<MediaHandle> {
        let script = self.script.lock();
        script
            .prepared
            .iter()
            .rev()
            .map(|(handle, _)| *handle)
            .find(|handle| script.live.contains(handle))
    }

    /// How many times `handle` was released.
    pub fn release_count(&self, handle: MediaHandle) -> usize {
        self.script.lock().released.get(&handle).copied().unwrap_or(0)
    }

    /// Prepared media not yet released.
    pub fn live_handles(&self) -> usize {
        self.script.lock().live.len()
    }

    pub fn was_touched(&self) -> bool {
        !self.script.lock().calls.is_empty()
    }
}

struct ScriptedEvents {
    receiver: mpsc::UnboundedReceiver<RendererEvent>,
}

#[async_trait]
impl RendererEventStream for ScriptedEvents {
    async fn next(&mut self) -> Option<RendererEvent> {
        self.receiver.recv().await
    }
}

#[async_trait]
impl AudioRenderer for ScriptedRenderer {
    async fn acquire(&self) -> Result<Box<dyn RendererEventStream>> {
        {
            let mut script = self.script.lock();
            script.calls.push(RendererCall::Acquire);
            if let Some(message) = script.acquire_failure.clone() {
                return Err(BridgeError::NotAvailable(message));
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        *self.events.lock() = Some(sender);
        Ok(Box::new(ScriptedEvents { receiver }))
    }

    async fn prepare(&self, request: PlaybackRequest) -> Result<PreparedMedia> {
        let track_id = request.metadata.track_id.clone().unwrap_or_default();
        let hold = {
            let mut script = self.script.lock();
            script.calls.push(RendererCall::Prepare {
                track_id: track_id.clone(),
                start: request.start_position,
            });
            script.hold_prepares
        };

        if hold {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            permit.forget();
        }

        let mut script = self.script.lock();
        if let Some(error) = script.prepare_failures.pop_front() {
            return Err(error);
        }

        let handle = MediaHandle::new();
        script.prepared.push((handle, track_id));
        script.live.insert(handle);
        script
            .positions
            .insert(handle, request.start_position);
        Ok(PreparedMedia {
            handle,
            duration: script.duration,
        })
    }

    async fn play(&self, handle: MediaHandle) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(RendererCall::Play(handle));
        if script.live.contains(&handle) {
            Ok(())
        } else {
            Err(BridgeError::OperationFailed(format!("unknown media {handle}")))
        }
    }

    async fn pause(&self, handle: MediaHandle) -> Result<()> {
        self.script.lock().calls.push(RendererCall::Pause(handle));
        Ok(())
    }

    async fn seek(&self, handle: MediaHandle, position: Duration) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(RendererCall::Seek(handle, position));
        script.positions.insert(handle, position);
        script.position_override = None;
        Ok(())
    }

    async fn position(&self, handle: MediaHandle) -> Result<Duration> {
        let script = self.script.lock();
        if let Some(position) = script.position_override {
            return Ok(position);
        }
        script
            .positions
            .get(&handle)
            .copied()
            .ok_or_else(|| BridgeError::OperationFailed(format!("unknown media {handle}")))
    }

    async fn release(&self, handle: MediaHandle) -> Result<()> {
        let mut script = self.script.lock();
        script.calls.push(RendererCall::Release(handle));
        script.live.remove(&handle);
        *script.released.entry(handle).or_insert(0) += 1;
        Ok(())
    }
}
