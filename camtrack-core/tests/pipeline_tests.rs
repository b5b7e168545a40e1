//! Tests for the tracking session, frame scheduler and pipeline loop

use camtrack_core::simulated::*;
use camtrack_core::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

fn reference(width: u32, height: u32) -> ReferenceImage {
    ReferenceImage::new(
        width,
        height,
        vec![128u8; PixelBuffer::expected_len(width, height)],
    )
    .unwrap()
}

fn pose(target_id: i32, focal: f64) -> Option<SimulatedPose> {
    Some(SimulatedPose {
        target_id,
        transform: IDENTITY_TRANSFORM,
        focal,
    })
}

async fn initialized_session(script: Vec<Option<SimulatedPose>>) -> TrackingSession {
    let mut session = TrackingSession::new(Box::new(SimulatedTracker::new(script)), 1);
    let source: Arc<dyn FrameSource> = Arc::new(StaticFrameSource::blank(64, 48));
    session.initialize(source).await.unwrap();
    session
}

struct Harness {
    pipeline: TrackingPipeline,
    handle: PipelineHandle,
    log: RenderLog,
    ticker: ManualTicker,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
}

async fn harness(script: Vec<Option<SimulatedPose>>) -> Harness {
    let viewport = Viewport::new(640, 480);
    let session = initialized_session(script).await;

    let renderer = RecordingRenderer::new();
    let log = renderer.log();
    let render_sync = RenderSync::new(
        Box::new(renderer),
        Box::new(RecordingBackground::with_log(log.clone())),
        viewport,
        DEFAULT_FOCAL,
    );

    let (clock, ticker) = ManualClock::new();
    let scheduler = FrameScheduler::new(Box::new(clock));

    let (events_tx, events) = mpsc::unbounded_channel();
    let (pipeline, handle) =
        TrackingPipeline::new(session, render_sync, scheduler, viewport).unwrap();

    Harness {
        pipeline: pipeline.with_events(events_tx),
        handle,
        log,
        ticker,
        events,
    }
}

fn overlay_adds(log: &RenderLog) -> usize {
    log.lock()
        .iter()
        .filter(|call| matches!(call, RenderCall::AddOverlay(_)))
        .count()
}

// ============================================================================
// TRACKING SESSION TESTS
// ============================================================================

#[tokio::test]
async fn test_register_target_before_initialize_fails() {
    let mut session = TrackingSession::new(Box::new(SimulatedTracker::new(vec![])), 1);

    let err = session.register_target(&reference(16, 16)).await.unwrap_err();
    assert!(matches!(err, TrackingError::TrackerUninitialized { .. }));
    assert!(!err.is_recoverable());
    assert_eq!(session.phase(), SessionPhase::Created);
}

#[tokio::test]
async fn test_process_frame_requires_training() {
    let mut session = initialized_session(vec![]).await;

    assert_err!(session.process_frame(Viewport::new(640, 480)));
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_target_is_set_once() {
    let mut session = initialized_session(vec![]).await;

    let target = assert_ok!(session.register_target(&reference(32, 16)).await);
    assert_eq!(
        target,
        TargetDescriptor {
            width: 32,
            height: 16
        }
    );
    assert_eq!(session.phase(), SessionPhase::Trained);

    let err = session.register_target(&reference(8, 8)).await.unwrap_err();
    assert!(matches!(
        err,
        TrackingError::TargetAlreadyRegistered {
            width: 32,
            height: 16
        }
    ));
    assert_eq!(session.target(), Some(target));
}

#[tokio::test]
async fn test_large_target_is_downscaled() {
    let mut session = initialized_session(vec![]).await.with_target_max_dimension(100);

    let target = session.register_target(&reference(400, 200)).await.unwrap();
    assert_eq!(
        target,
        TargetDescriptor {
            width: 100,
            height: 50
        }
    );
}

#[tokio::test]
async fn test_mismatched_target_data_is_rejected() {
    let mut session = initialized_session(vec![]).await.with_target_max_dimension(100);

    // large enough to take the downscale path, but missing its last rows
    let truncated = ReferenceImage {
        width: 400,
        height: 200,
        data: vec![128u8; PixelBuffer::expected_len(400, 100)].into(),
    };
    let err = assert_err!(session.register_target(&truncated).await);
    assert!(matches!(err, TrackingError::InvalidTarget { .. }));

    let empty = ReferenceImage {
        width: 0,
        height: 16,
        data: Vec::new().into(),
    };
    let err = assert_err!(session.register_target(&empty).await);
    assert!(matches!(err, TrackingError::InvalidTarget { .. }));

    assert_eq!(session.target(), None);
    assert_eq!(session.phase(), SessionPhase::Initialized);
    assert_ok!(session.register_target(&reference(400, 200)).await);
}

#[tokio::test]
async fn test_update_handler_taken_once() {
    let mut session = initialized_session(vec![]).await;

    assert_ok!(session.on_update());
    assert!(matches!(
        session.on_update(),
        Err(TrackingError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_single_update_in_flight() {
    let mut session = initialized_session(vec![pose(7, 320.0)]).await;
    let mut updates = session.on_update().unwrap();
    session.register_target(&reference(16, 16)).await.unwrap();

    let viewport = Viewport::new(320, 240);
    session.process_frame(viewport).unwrap();
    session.process_frame(viewport).unwrap();

    assert_eq!(session.dropped_updates(), 1);
    let first = updates.recv().await.unwrap();
    assert_eq!(first.target_id, 7);
    assert!(updates.try_recv().is_err());
}

// ============================================================================
// SCHEDULER TESTS
// ============================================================================

#[tokio::test]
async fn test_ticks_continue_while_not_ready() {
    let mut session = initialized_session(vec![None]).await;
    let _updates = session.on_update().unwrap();
    let (clock, _ticker) = ManualClock::new();
    let mut scheduler = FrameScheduler::new(Box::new(clock));
    let viewport = Viewport::new(640, 480);

    assert!(!scheduler.on_tick(&mut session, viewport).unwrap());
    assert!(!scheduler.on_tick(&mut session, viewport).unwrap());

    session.register_target(&reference(16, 16)).await.unwrap();
    assert!(scheduler.on_tick(&mut session, viewport).unwrap());

    let stats = scheduler.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.ticks_not_ready, 2);
    assert_eq!(stats.frames_submitted, 1);
}

#[tokio::test]
async fn test_stopped_scheduler_submits_nothing() {
    let mut session = initialized_session(vec![]).await;
    session.register_target(&reference(16, 16)).await.unwrap();
    let (clock, ticker) = ManualClock::new();
    let mut scheduler = FrameScheduler::new(Box::new(clock));

    ticker.tick();
    scheduler.next_tick().await;
    assert!(scheduler.last_tick().is_some());

    scheduler.stop();
    assert!(!scheduler.is_running());
    assert!(!scheduler.on_tick(&mut session, Viewport::new(8, 8)).unwrap());

    ticker.tick();
    let waited = tokio::time::timeout(Duration::from_millis(20), scheduler.next_tick()).await;
    assert!(waited.is_err());
}

// ============================================================================
// READINESS TESTS
// ============================================================================

#[tokio::test]
async fn test_overlay_added_when_surface_attaches_last() {
    let mut h = harness(vec![]).await;

    h.pipeline.on_register_target(&reference(64, 48)).await.unwrap();
    assert!(h.pipeline.readiness().is_trained());
    assert_eq!(overlay_adds(&h.log), 0);

    h.pipeline.on_surface_attached().unwrap();
    assert!(h.pipeline.readiness().is_ready());
    assert_eq!(overlay_adds(&h.log), 1);
    assert!(h.pipeline.scene().overlay_attached);
}

#[tokio::test]
async fn test_overlay_added_when_training_completes_last() {
    let mut h = harness(vec![]).await;

    h.pipeline.on_surface_attached().unwrap();
    assert_eq!(overlay_adds(&h.log), 0);

    h.pipeline.on_register_target(&reference(64, 48)).await.unwrap();
    assert_eq!(overlay_adds(&h.log), 1);

    // repeated attachment does not add a second overlay
    h.pipeline.on_surface_attached().unwrap();
    assert_eq!(overlay_adds(&h.log), 1);

    let events: Vec<_> = std::iter::from_fn(|| h.events.try_recv().ok()).collect();
    assert!(events.contains(&PipelineEvent::OverlayAttached));
}

#[tokio::test]
async fn test_overlay_geometry_follows_target() {
    let mut h = harness(vec![]).await;

    h.pipeline.on_surface_attached().unwrap();
    h.pipeline.on_register_target(&reference(64, 48)).await.unwrap();

    let spec = h
        .log
        .lock()
        .iter()
        .find_map(|call| match call {
            RenderCall::AddOverlay(spec) => Some(spec.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(spec.width, 2.0);
    assert!((spec.height - 1.5).abs() < 1e-9);
    assert_eq!(spec.color, 0xffff00);
}

#[tokio::test]
async fn test_overlay_added_when_ready_before_assembly() {
    let viewport = Viewport::new(640, 480);
    let mut session = initialized_session(vec![]).await;
    assert_ok!(session.register_target(&reference(64, 48)).await);

    let renderer = RecordingRenderer::new();
    let log = renderer.log();
    let mut render_sync = RenderSync::new(
        Box::new(renderer),
        Box::new(RecordingBackground::with_log(log.clone())),
        viewport,
        DEFAULT_FOCAL,
    );
    assert_ok!(render_sync.attach_surface(viewport));

    let (clock, _ticker) = ManualClock::new();
    let (mut pipeline, _handle) = assert_ok!(TrackingPipeline::new(
        session,
        render_sync,
        FrameScheduler::new(Box::new(clock)),
        viewport,
    ));
    assert!(pipeline.readiness().is_ready());
    assert!(pipeline.scene().overlay_attached);
    assert_eq!(overlay_adds(&log), 1);

    let frame = TrackingFrame::detected(
        PixelBuffer::blank(64, 48),
        7,
        IDENTITY_TRANSFORM,
        DEFAULT_FOCAL,
    );
    let outcome = assert_ok!(pipeline.on_update(&frame));
    assert!(matches!(outcome, RenderOutcome::Posed { target_id: 7, .. }));
    assert!(pipeline.scene().visible);

    // a later attach signal must not add the overlay twice
    assert_ok!(pipeline.on_surface_attached());
    assert_eq!(overlay_adds(&log), 1);
}

// ============================================================================
// PIPELINE LOOP TESTS
// ============================================================================

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let h = harness(vec![pose(7, 500.0), None, pose(7, 500.0)]).await;
    let Harness {
        pipeline,
        handle,
        log,
        ticker,
        mut events,
    } = h;

    let task = tokio::spawn(pipeline.run());

    handle.attach_surface().unwrap();
    let target = handle.register_target(reference(64, 48)).await.unwrap();
    assert_eq!(target.width, 64);

    for _ in 0..3 {
        ticker.tick();
    }

    let mut rendered = Vec::new();
    let mut fov_changes = 0;
    tokio::time::timeout(Duration::from_secs(5), async {
        while rendered.len() < 3 {
            match events.recv().await {
                Some(PipelineEvent::FrameRendered { target_id, posed }) => {
                    rendered.push((target_id, posed))
                }
                Some(PipelineEvent::FieldOfViewChanged { .. }) => fov_changes += 1,
                Some(_) => {}
                None => break,
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(rendered, vec![(7, true), (NO_TARGET, false), (7, true)]);
    assert_eq!(fov_changes, 1);

    handle.shutdown().unwrap();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.stats.updates_rendered, 3);
    assert_eq!(report.stats.detections, 2);
    assert_eq!(report.stats.dropped_updates, 0);
    assert_eq!(report.scheduler.frames_submitted, 3);
    assert_eq!(report.scene.focal, 500.0);
    assert_eq!(report.target, Some(target));
    assert!(matches!(log.lock().last(), Some(RenderCall::RemoveOverlay(_))));
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_pipeline_resize_through_handle() {
    let Harness {
        pipeline,
        handle,
        log,
        ..
    } = harness(vec![]).await;
    let task = tokio::spawn(pipeline.run());

    handle.attach_surface().unwrap();
    handle.resize(Viewport::new(480, 640)).unwrap();
    handle.resize(Viewport::new(480, 640)).unwrap();
    handle.shutdown().unwrap();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.scene.viewport, Viewport::new(480, 640));

    let resizes: Vec<_> = log
        .lock()
        .iter()
        .filter_map(|call| match call {
            RenderCall::Resize(w, h) => Some((*w, *h)),
            _ => None,
        })
        .collect();
    assert_eq!(resizes, vec![(640, 480), (480, 640)]);
}

#[tokio::test]
async fn test_pipeline_stops_when_handles_dropped() {
    let Harness {
        pipeline, handle, ..
    } = harness(vec![]).await;
    let task = tokio::spawn(pipeline.run());

    drop(handle);
    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.stats.updates_rendered, 0);
    assert!(report.target.is_none());
}

#[tokio::test]
async fn test_register_target_after_shutdown_fails() {
    let Harness {
        pipeline, handle, ..
    } = harness(vec![]).await;
    let task = tokio::spawn(pipeline.run());

    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();

    let err = handle.register_target(reference(8, 8)).await.unwrap_err();
    assert!(matches!(err, TrackingError::ChannelClosed { .. }));
}
