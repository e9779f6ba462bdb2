//! Behaviour of the playback service, its session and controllers, driven
//! through the public API against a scripted renderer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{NetworkInfo, NetworkMonitor, NetworkType, PlayCountSink, RendererEventKind};
use core_async::time::{sleep, timeout};
use core_playback::test_support::{RendererCall, ScriptedRenderer};
use core_playback::{
    CommandStatus, PlaybackConfig, PlaybackError, PlaybackSnapshot, TrackDescriptor,
    TransportState,
};
use core_runtime::events::{ConnectivityEvent, CoreEvent, SessionEvent};
use core_runtime::{CoreConfig, CoreConfigBuilder, FeatureFlags};
use core_service::{
    ControllerUpdate, InterruptionChoice, PlaybackController, PlaybackService, ServiceError,
    StartOutcome, TeardownOutcome,
};
use mockall::mock;

mock! {
    Monitor {}

    #[async_trait]
    impl NetworkMonitor for Monitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo>;
    }
}

#[derive(Default)]
struct CountingSink {
    count: AtomicUsize,
}

#[async_trait]
impl PlayCountSink for CountingSink {
    async fn increment(&self, _track_id: &str) -> BridgeResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn remote_tracks(ids: &[&str]) -> Vec<TrackDescriptor> {
    ids.iter()
        .map(|id| {
            TrackDescriptor::remote(*id, format!("Song {id}"), "Artist", format!("https://cdn/{id}.mp3"))
                .unwrap()
        })
        .collect()
}

fn builder(renderer: &Arc<ScriptedRenderer>) -> CoreConfigBuilder {
    CoreConfig::builder()
        .renderer(renderer.clone())
        .position_poll_interval(Duration::from_millis(20))
        .connectivity_poll_interval(Duration::from_millis(20))
        .features(FeatureFlags {
            enable_continuity_guard: false,
            enable_play_counts: false,
        })
}

fn service_with(renderer: &Arc<ScriptedRenderer>) -> PlaybackService {
    PlaybackService::new(builder(renderer).build().unwrap(), PlaybackConfig::default())
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_for_state(
    controller: &PlaybackController,
    predicate: impl Fn(&PlaybackSnapshot) -> bool,
) -> PlaybackSnapshot {
    wait_until(|| controller.snapshot().is_some_and(|s| predicate(&s))).await;
    controller.snapshot().unwrap()
}

fn current_id(snapshot: &PlaybackSnapshot) -> String {
    snapshot.current_track_id().unwrap().to_string()
}

#[tokio::test]
async fn starts_in_the_middle_and_wraps_past_the_end() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);

    let outcome = service
        .start(&remote_tracks(&["a", "b", "c"]), 1)
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    let controller = service.connect();
    controller.connected().await.unwrap();
    let playing = wait_for_state(&controller, |s| s.is_playing).await;
    assert_eq!(current_id(&playing), "b");

    assert_eq!(controller.next().await, CommandStatus::Applied);
    let snapshot = wait_for_state(&controller, |s| s.is_playing).await;
    assert_eq!(current_id(&snapshot), "c");

    assert_eq!(controller.next().await, CommandStatus::Applied);
    let snapshot = wait_for_state(&controller, |s| s.is_playing).await;
    assert_eq!(current_id(&snapshot), "a");
    assert_eq!(snapshot.current_index, Some(0));
}

#[tokio::test]
async fn starting_the_current_track_again_changes_nothing() {
    let renderer = ScriptedRenderer::new();
    let sink = Arc::new(CountingSink::default());
    let config = builder(&renderer)
        .play_count_sink(sink.clone())
        .features(FeatureFlags {
            enable_continuity_guard: false,
            enable_play_counts: true,
        })
        .build()
        .unwrap();
    let service = PlaybackService::new(config, PlaybackConfig::default());
    let tracks = remote_tracks(&["a", "b"]);

    service.start(&tracks, 0).await.unwrap();
    wait_until(|| service.snapshot().is_some_and(|s| s.is_playing)).await;
    wait_until(|| sink.count.load(Ordering::SeqCst) == 1).await;

    let again = service.start(&tracks, 0).await.unwrap();
    assert_eq!(again, StartOutcome::AlreadyActive);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(renderer.prepare_count(), 1);
    assert_eq!(sink.count.load(Ordering::SeqCst), 1);
    assert!(service.snapshot().unwrap().is_playing);
}

#[tokio::test]
async fn starting_a_different_queue_replaces_the_current_one() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);

    service.start(&remote_tracks(&["a", "b"]), 0).await.unwrap();
    wait_until(|| service.snapshot().is_some_and(|s| s.is_playing)).await;

    let outcome = service.start(&remote_tracks(&["x", "y"]), 1).await.unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    wait_until(|| {
        service
            .snapshot()
            .is_some_and(|s| s.is_playing && current_id(&s) == "y")
    })
    .await;
    assert_eq!(renderer.live_handles(), 1);
}

#[tokio::test]
async fn invalid_start_never_touches_the_renderer() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);

    let empty = service.start(&[], 0).await.unwrap_err();
    assert!(matches!(
        empty,
        ServiceError::Playback(PlaybackError::EmptyQueue)
    ));

    let out_of_range = service.start(&remote_tracks(&["a"]), 3).await.unwrap_err();
    assert!(matches!(
        out_of_range,
        ServiceError::Playback(PlaybackError::StartIndexOutOfRange { index: 3, len: 1 })
    ));

    assert!(!renderer.was_touched());
    assert!(service.session_id().is_none());
}

#[tokio::test]
async fn guard_reports_a_stalled_stream_once() {
    let renderer = ScriptedRenderer::new();
    let mut monitor = MockMonitor::new();
    monitor
        .expect_get_network_info()
        .returning(|| Ok(NetworkInfo::offline()));

    let config = builder(&renderer)
        .network_monitor(Arc::new(monitor))
        .features(FeatureFlags {
            enable_continuity_guard: true,
            enable_play_counts: false,
        })
        .build()
        .unwrap();
    let service = PlaybackService::new(config, PlaybackConfig::default());
    let mut events = service.events().subscribe();

    service.start(&remote_tracks(&["a", "b"]), 0).await.unwrap();
    wait_until(|| service.snapshot().is_some_and(|s| s.is_playing)).await;

    let handle = renderer.current_handle().unwrap();
    renderer.emit(handle, RendererEventKind::Buffering);
    wait_until(|| {
        service
            .snapshot()
            .is_some_and(|s| s.interruption.is_some())
    })
    .await;

    // Several poll intervals pass while still offline and stalled.
    sleep(Duration::from_millis(150)).await;

    let mut interrupted = 0;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted { track_id }) = event {
            assert_eq!(track_id, "a");
            interrupted += 1;
        }
    }
    assert_eq!(interrupted, 1);
    assert_eq!(service.snapshot().unwrap().transport, TransportState::Playing);
}

#[tokio::test]
async fn guard_rearms_after_the_stream_recovers() {
    let renderer = ScriptedRenderer::new();
    let mut monitor = MockMonitor::new();
    monitor
        .expect_get_network_info()
        .returning(|| Ok(NetworkInfo::offline()));

    let config = builder(&renderer)
        .network_monitor(Arc::new(monitor))
        .features(FeatureFlags {
            enable_continuity_guard: true,
            enable_play_counts: false,
        })
        .build()
        .unwrap();
    let service = PlaybackService::new(config, PlaybackConfig::default());
    let mut events = service.events().subscribe();

    service.start(&remote_tracks(&["a"]), 0).await.unwrap();
    wait_until(|| service.snapshot().is_some_and(|s| s.is_playing)).await;
    let handle = renderer.current_handle().unwrap();

    renderer.emit(handle, RendererEventKind::Buffering);
    wait_until(|| service.snapshot().is_some_and(|s| s.interruption.is_some())).await;

    renderer.emit(handle, RendererEventKind::Ready);
    wait_until(|| service.snapshot().is_some_and(|s| s.interruption.is_none())).await;

    renderer.emit(handle, RendererEventKind::Idle);
    wait_until(|| service.snapshot().is_some_and(|s| s.interruption.is_some())).await;

    let interrupted = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| {
            matches!(
                e,
                CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted { .. })
            )
        })
        .count();
    assert_eq!(interrupted, 2);
}

#[tokio::test]
async fn paused_remote_stream_is_never_flagged() {
    let renderer = ScriptedRenderer::new();
    let mut monitor = MockMonitor::new();
    monitor
        .expect_get_network_info()
        .returning(|| Ok(NetworkInfo::offline()));

    let config = builder(&renderer)
        .network_monitor(Arc::new(monitor))
        .features(FeatureFlags {
            enable_continuity_guard: true,
            enable_play_counts: false,
        })
        .build()
        .unwrap();
    let service = PlaybackService::new(config, PlaybackConfig::default());

    service.start(&remote_tracks(&["a"]), 0).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;

    controller.pause().await;
    let handle = renderer.current_handle().unwrap();
    renderer.emit(handle, RendererEventKind::Idle);

    sleep(Duration::from_millis(100)).await;
    assert!(controller.snapshot().unwrap().interruption.is_none());
}

#[tokio::test]
async fn stop_choice_on_an_interruption_degrades_to_loaded() {
    let renderer = ScriptedRenderer::new();
    let mut monitor = MockMonitor::new();
    monitor
        .expect_get_network_info()
        .returning(|| Ok(NetworkInfo::offline()));

    let config = builder(&renderer)
        .network_monitor(Arc::new(monitor))
        .features(FeatureFlags {
            enable_continuity_guard: true,
            enable_play_counts: false,
        })
        .build()
        .unwrap();
    let service = PlaybackService::new(config, PlaybackConfig::default());

    service.start(&remote_tracks(&["a", "b"]), 0).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;

    renderer.emit(renderer.current_handle().unwrap(), RendererEventKind::Buffering);
    wait_for_state(&controller, |s| s.interruption.is_some()).await;

    let status = controller
        .resolve_interruption(InterruptionChoice::Stop)
        .await;
    assert_eq!(status, CommandStatus::Applied);

    let stopped = wait_for_state(&controller, |s| s.transport == TransportState::Loaded).await;
    assert_eq!(current_id(&stopped), "a");
    assert!(!stopped.is_playing);
    wait_until(|| renderer.live_handles() == 0).await;
}

/// Monitor whose answer follows `online`.
fn switchable_monitor(online: Arc<AtomicBool>) -> MockMonitor {
    let mut monitor = MockMonitor::new();
    monitor.expect_get_network_info().returning(move || {
        Ok(if online.load(Ordering::SeqCst) {
            NetworkInfo::online(NetworkType::WiFi)
        } else {
            NetworkInfo::offline()
        })
    });
    monitor
}

fn guarded_service(renderer: &Arc<ScriptedRenderer>, monitor: MockMonitor) -> PlaybackService {
    let config = builder(renderer)
        .network_monitor(Arc::new(monitor))
        .features(FeatureFlags {
            enable_continuity_guard: true,
            enable_play_counts: false,
        })
        .build()
        .unwrap();
    PlaybackService::new(config, PlaybackConfig::default())
}

#[tokio::test]
async fn retry_reloads_the_interrupted_item_once_back_online() {
    let renderer = ScriptedRenderer::new();
    let online = Arc::new(AtomicBool::new(false));
    let service = guarded_service(&renderer, switchable_monitor(online.clone()));

    service.start(&remote_tracks(&["a", "b", "c"]), 1).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;
    assert_eq!(controller.seek_to(42_000).await, CommandStatus::Applied);

    renderer.emit(renderer.current_handle().unwrap(), RendererEventKind::Buffering);
    wait_for_state(&controller, |s| s.interruption.is_some()).await;

    let status = controller
        .resolve_interruption(InterruptionChoice::Retry)
        .await;
    assert_eq!(status, CommandStatus::Applied);
    let pending = wait_for_state(&controller, |s| {
        s.interruption.as_ref().is_some_and(|n| n.retry_pending)
    })
    .await;
    assert_eq!(current_id(&pending), "b");
    assert_eq!(renderer.prepare_count(), 1);

    online.store(true, Ordering::SeqCst);
    let resumed = wait_for_state(&controller, |s| s.is_playing).await;
    assert_eq!(current_id(&resumed), "b");
    assert_eq!(resumed.current_index, Some(1));
    assert!(resumed.interruption.is_none());
    assert_eq!(renderer.prepared_tracks(), vec!["b", "b"]);

    let last_prepare = renderer
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RendererCall::Prepare { .. }))
        .last();
    assert_eq!(
        last_prepare,
        Some(RendererCall::Prepare {
            track_id: "b".into(),
            start: Duration::from_millis(42_000),
        })
    );
}

#[tokio::test]
async fn choice_is_honoured_as_soon_as_the_guard_raises_the_notice() {
    let renderer = ScriptedRenderer::new();
    let service = guarded_service(&renderer, switchable_monitor(Arc::new(AtomicBool::new(false))));
    let mut events = service.events().subscribe();

    service.start(&remote_tracks(&["a"]), 0).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;

    renderer.emit(renderer.current_handle().unwrap(), RendererEventKind::Buffering);
    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(CoreEvent::Connectivity(ConnectivityEvent::StreamInterrupted { .. })) =
                events.recv().await
            {
                break;
            }
        }
    })
    .await
    .expect("no interruption raised");

    // Answered without waiting for the notice to show up in the snapshot.
    let status = controller
        .resolve_interruption(InterruptionChoice::Stop)
        .await;
    assert_eq!(status, CommandStatus::Applied);
    wait_for_state(&controller, |s| s.transport == TransportState::Loaded).await;
}

#[tokio::test]
async fn choice_without_a_notice_is_ignored() {
    let renderer = ScriptedRenderer::new();
    let service = guarded_service(&renderer, switchable_monitor(Arc::new(AtomicBool::new(true))));

    service.start(&remote_tracks(&["a"]), 0).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;

    let status = controller
        .resolve_interruption(InterruptionChoice::Retry)
        .await;
    assert_eq!(status, CommandStatus::Ignored);
    assert_eq!(renderer.prepare_count(), 1);
}

#[tokio::test]
async fn pause_from_one_controller_reaches_another() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a", "b"]), 0).await.unwrap();

    let first = service.connect();
    let second = service.connect();
    first.connected().await.unwrap();
    second.connected().await.unwrap();
    wait_for_state(&second, |s| s.is_playing).await;

    let mut updates = second.subscribe();
    match updates.next().await {
        Some(ControllerUpdate::State(snapshot)) => assert!(snapshot.is_playing),
        other => panic!("expected initial state, got {other:?}"),
    }

    assert_eq!(first.pause().await, CommandStatus::Applied);

    let paused = timeout(Duration::from_secs(1), async {
        loop {
            if let Some(ControllerUpdate::State(snapshot)) = updates.next().await {
                return snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert!(!paused.is_playing);
    assert_eq!(paused.transport, TransportState::Paused);
}

#[tokio::test]
async fn updates_arrive_in_order_without_repeats() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a", "b", "c"]), 0).await.unwrap();

    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;
    controller.pause().await;

    let mut updates = controller.subscribe();
    controller.next().await;
    controller.next().await;
    controller.play().await;

    let mut sequences = Vec::new();
    let _ = timeout(Duration::from_millis(200), async {
        while let Some(update) = updates.next().await {
            if let ControllerUpdate::State(snapshot) = update {
                sequences.push(snapshot.sequence);
            }
        }
    })
    .await;

    assert!(sequences.len() >= 3);
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn stop_is_deferred_while_playing() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    let mut events = service.events().subscribe();

    service.start(&remote_tracks(&["a"]), 0).await.unwrap();
    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;

    assert_eq!(service.stop().await, TeardownOutcome::Deferred);
    assert!(controller.is_connected());

    controller.pause().await;
    assert_eq!(service.stop().await, TeardownOutcome::Released);
    assert_eq!(service.stop().await, TeardownOutcome::AlreadyReleased);

    assert_eq!(renderer.live_handles(), 0);
    assert!(!controller.is_connected());
    assert_eq!(controller.play().await, CommandStatus::Dropped);

    let released = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, CoreEvent::Session(SessionEvent::Released { .. })))
        .count();
    assert_eq!(released, 1);
}

#[tokio::test]
async fn commands_before_connection_are_dropped() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);

    let controller = service.connect();
    assert!(!controller.is_connected());
    assert_eq!(controller.play().await, CommandStatus::Dropped);
    assert_eq!(controller.next().await, CommandStatus::Dropped);

    controller.connected().await.unwrap();
    // Nothing queued: the session has no queue, so play is ignored now.
    assert_eq!(controller.play().await, CommandStatus::Ignored);
    assert_eq!(renderer.prepare_count(), 0);
}

#[tokio::test]
async fn position_is_sampled_only_while_playing() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a"]), 0).await.unwrap();

    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.is_playing).await;
    renderer.set_position(Duration::from_secs(42));

    let mut updates = controller.subscribe();
    let mut positions = 0;
    let _ = timeout(Duration::from_millis(150), async {
        while let Some(update) = updates.next().await {
            if let ControllerUpdate::Position(sample) = update {
                assert_eq!(sample.position_ms, 42_000);
                positions += 1;
            }
        }
    })
    .await;
    assert!(positions >= 2);
    assert!(updates.is_polling());

    controller.pause().await;
    let paused = timeout(Duration::from_secs(1), async {
        loop {
            if let Some(ControllerUpdate::State(snapshot)) = updates.next().await {
                if !snapshot.is_playing {
                    return snapshot;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(paused.position_ms, 42_000);
    assert!(!updates.is_polling());

    let mut after_pause = 0;
    let _ = timeout(Duration::from_millis(120), async {
        while let Some(update) = updates.next().await {
            if matches!(update, ControllerUpdate::Position(_)) {
                after_pause += 1;
            }
        }
    })
    .await;
    assert_eq!(after_pause, 0);
}

#[tokio::test]
async fn renderer_failure_is_reported_to_the_controller() {
    let renderer = ScriptedRenderer::new();
    renderer.fail_acquire("no audio device");
    let service = service_with(&renderer);

    let controller = service.connect();
    let err = controller.connected().await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionFailed(_)));

    let start = service.start(&remote_tracks(&["a"]), 0).await.unwrap_err();
    assert!(matches!(
        start,
        ServiceError::Playback(PlaybackError::RendererUnavailable(_))
    ));
}

#[tokio::test]
async fn disconnect_ends_only_that_controller() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a"]), 0).await.unwrap();

    let leaving = service.connect();
    let staying = service.connect();
    leaving.connected().await.unwrap();
    staying.connected().await.unwrap();

    let mut updates = leaving.subscribe();
    assert!(updates.next().await.is_some());

    leaving.disconnect();
    assert!(updates.next().await.is_none());
    assert_eq!(leaving.pause().await, CommandStatus::Dropped);

    let snapshot = wait_for_state(&staying, |s| s.is_playing).await;
    assert_eq!(snapshot.transport, TransportState::Playing);
}

#[tokio::test]
async fn seek_bar_fraction_maps_onto_duration() {
    let renderer = ScriptedRenderer::new();
    renderer.set_duration(Some(Duration::from_secs(200)));
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a"]), 0).await.unwrap();

    let controller = service.connect();
    controller.connected().await.unwrap();
    wait_for_state(&controller, |s| s.duration_ms.is_some()).await;

    assert_eq!(controller.seek_to_fraction(0.25).await, CommandStatus::Applied);
    let snapshot = controller.snapshot().unwrap();
    assert_eq!(snapshot.position_ms, 50_000);

    controller.seek_to_fraction(3.0).await;
    assert_eq!(controller.snapshot().unwrap().position_ms, 200_000);
}

#[tokio::test]
async fn toggles_flip_modes() {
    let renderer = ScriptedRenderer::new();
    let service = service_with(&renderer);
    service.start(&remote_tracks(&["a", "b", "c"]), 0).await.unwrap();

    let controller = service.connect();
    controller.connected().await.unwrap();

    controller.toggle_shuffle().await;
    controller.toggle_repeat().await;
    let snapshot = controller.snapshot().unwrap();
    assert!(snapshot.shuffle);
    assert_eq!(snapshot.repeat, core_playback::RepeatMode::One);

    controller.toggle_shuffle().await;
    controller.toggle_repeat().await;
    let snapshot = controller.snapshot().unwrap();
    assert!(!snapshot.shuffle);
    assert_eq!(snapshot.repeat, core_playback::RepeatMode::Off);
}
