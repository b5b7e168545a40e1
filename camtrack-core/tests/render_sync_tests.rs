//! Tests for turning tracker updates into renderer state
//!
//! Covers field-of-view recomputation, verbatim transform application,
//! visibility, background compositing and resize idempotence.

use camtrack_core::simulated::{RecordingBackground, RecordingRenderer, RenderCall, RenderLog};
use camtrack_core::*;

fn pose_matrix() -> Transform {
    [
        1.0, 0.0, 0.0, 0.25, //
        0.0, 1.0, 0.0, -0.5, //
        0.0, 0.0, 1.0, -3.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

fn render_sync(viewport: Viewport) -> (RenderSync, RenderLog) {
    let renderer = RecordingRenderer::new();
    let log = renderer.log();
    let background = RecordingBackground::with_log(log.clone());
    let sync = RenderSync::new(
        Box::new(renderer),
        Box::new(background),
        viewport,
        DEFAULT_FOCAL,
    );
    (sync, log)
}

/// Surface attached and overlay added, log cleared
fn ready_sync(viewport: Viewport) -> (RenderSync, RenderLog) {
    let (mut sync, log) = render_sync(viewport);
    sync.attach_surface(viewport).unwrap();
    sync.add_overlay(OverlaySpec::for_target(&TargetDescriptor {
        width: 1024,
        height: 768,
    }))
    .unwrap();
    log.lock().clear();
    (sync, log)
}

fn fov_calls(log: &RenderLog) -> Vec<f64> {
    log.lock()
        .iter()
        .filter_map(|call| match call {
            RenderCall::FieldOfView(fov) => Some(*fov),
            _ => None,
        })
        .collect()
}

// ============================================================================
// DETECTION TESTS
// ============================================================================

#[test]
fn test_detection_updates_fov_transform_and_visibility() {
    let viewport = Viewport::new(640, 480);
    let (mut sync, log) = ready_sync(viewport);

    let frame = TrackingFrame::detected(PixelBuffer::blank(64, 48), 7, pose_matrix(), 500.0);
    let outcome = sync.apply(&frame).unwrap();

    let expected_fov = 2.0 * (240.0f64).atan2(500.0) * 180.0 / std::f64::consts::PI;
    match outcome {
        RenderOutcome::Posed {
            target_id,
            fov_changed,
        } => {
            assert_eq!(target_id, 7);
            let fov = fov_changed.expect("focal changed");
            assert!((fov - expected_fov).abs() < 1e-9);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let calls = log.lock().clone();
    assert_eq!(
        calls[0],
        RenderCall::Composite {
            frame: (64, 48),
            viewport,
        }
    );
    assert!(calls.contains(&RenderCall::Transform(pose_matrix())));
    assert!(calls.contains(&RenderCall::Visible(true)));
    assert_eq!(calls.last(), Some(&RenderCall::Render));

    let state = sync.state();
    assert_eq!(state.focal, 500.0);
    assert_eq!(state.transform, Some(pose_matrix()));
    assert!(state.visible);
}

#[test]
fn test_unchanged_focal_does_not_touch_fov() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    let frame =
        TrackingFrame::detected(PixelBuffer::blank(8, 8), 7, pose_matrix(), DEFAULT_FOCAL);
    let outcome = sync.apply(&frame).unwrap();

    assert_eq!(
        outcome,
        RenderOutcome::Posed {
            target_id: 7,
            fov_changed: None
        }
    );
    assert!(fov_calls(&log).is_empty());
}

#[test]
fn test_visibility_is_set_only_on_transition() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    for _ in 0..3 {
        let frame =
            TrackingFrame::detected(PixelBuffer::blank(8, 8), 7, pose_matrix(), DEFAULT_FOCAL);
        sync.apply(&frame).unwrap();
    }

    let visible_calls = log
        .lock()
        .iter()
        .filter(|call| matches!(call, RenderCall::Visible(_)))
        .count();
    assert_eq!(visible_calls, 1);
}

// ============================================================================
// NO DETECTION TESTS
// ============================================================================

#[test]
fn test_no_detection_composites_only() {
    let viewport = Viewport::new(640, 480);
    let (mut sync, log) = ready_sync(viewport);

    let frame = TrackingFrame::lost(PixelBuffer::blank(32, 24), 900.0);
    let outcome = sync.apply(&frame).unwrap();

    assert_eq!(outcome, RenderOutcome::NoDetection { hidden: false });
    assert_eq!(
        *log.lock(),
        vec![RenderCall::Composite {
            frame: (32, 24),
            viewport,
        }]
    );
    assert_eq!(sync.state().focal, DEFAULT_FOCAL);
    assert!(sync.state().transform.is_none());
}

#[test]
fn test_keep_last_pose_leaves_overlay_visible() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    sync.apply(&TrackingFrame::detected(
        PixelBuffer::blank(8, 8),
        7,
        pose_matrix(),
        DEFAULT_FOCAL,
    ))
    .unwrap();
    log.lock().clear();

    for _ in 0..10 {
        sync.apply(&TrackingFrame::lost(PixelBuffer::blank(8, 8), DEFAULT_FOCAL))
            .unwrap();
    }

    assert!(sync.state().visible);
    assert_eq!(sync.state().transform, Some(pose_matrix()));
    assert!(log
        .lock()
        .iter()
        .all(|call| matches!(call, RenderCall::Composite { .. })));
}

#[test]
fn test_hide_after_policy_hides_once() {
    let (sync, log) = ready_sync(Viewport::new(640, 480));
    let mut sync = sync.with_policy(LostTargetPolicy::HideAfter { frames: 3 });

    sync.apply(&TrackingFrame::detected(
        PixelBuffer::blank(8, 8),
        7,
        pose_matrix(),
        DEFAULT_FOCAL,
    ))
    .unwrap();

    let lost = TrackingFrame::lost(PixelBuffer::blank(8, 8), DEFAULT_FOCAL);
    assert_eq!(
        sync.apply(&lost).unwrap(),
        RenderOutcome::NoDetection { hidden: false }
    );
    assert_eq!(
        sync.apply(&lost).unwrap(),
        RenderOutcome::NoDetection { hidden: false }
    );
    assert_eq!(
        sync.apply(&lost).unwrap(),
        RenderOutcome::NoDetection { hidden: true }
    );
    assert_eq!(
        sync.apply(&lost).unwrap(),
        RenderOutcome::NoDetection { hidden: false }
    );
    assert!(!sync.state().visible);

    let hides = log
        .lock()
        .iter()
        .filter(|call| **call == RenderCall::Visible(false))
        .count();
    assert_eq!(hides, 1);

    // detection brings it back
    sync.apply(&TrackingFrame::detected(
        PixelBuffer::blank(8, 8),
        7,
        pose_matrix(),
        DEFAULT_FOCAL,
    ))
    .unwrap();
    assert!(sync.state().visible);
    assert_eq!(sync.state().missed_frames, 0);
}

#[test]
fn test_updates_before_overlay_are_background_only() {
    let viewport = Viewport::new(640, 480);
    let (mut sync, log) = render_sync(viewport);

    let frame = TrackingFrame::detected(PixelBuffer::blank(8, 8), 7, pose_matrix(), 500.0);
    assert_eq!(sync.apply(&frame).unwrap(), RenderOutcome::BackgroundOnly);
    assert_eq!(log.lock().len(), 1);
    assert!(sync.state().transform.is_none());
}

// ============================================================================
// SURFACE AND RESIZE TESTS
// ============================================================================

#[test]
fn test_attach_surface_sizes_renderer() {
    let viewport = Viewport::new(1280, 720);
    let (mut sync, log) = render_sync(viewport);

    sync.attach_surface(viewport).unwrap();

    let calls = log.lock().clone();
    assert_eq!(calls[0], RenderCall::Resize(1280, 720));
    assert_eq!(fov_calls(&log), vec![field_of_view(720, DEFAULT_FOCAL)]);
    assert!(sync.is_surface_attached());
    assert!(sync.attach_surface(viewport).is_err());
}

#[test]
fn test_resize_is_idempotent() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    assert!(sync.resize(Viewport::new(800, 600)).unwrap());
    assert!(!sync.resize(Viewport::new(800, 600)).unwrap());

    assert_eq!(fov_calls(&log), vec![field_of_view(600, DEFAULT_FOCAL)]);
    let resizes = log
        .lock()
        .iter()
        .filter(|call| matches!(call, RenderCall::Resize(..)))
        .count();
    assert_eq!(resizes, 1);
}

#[test]
fn test_width_only_resize_keeps_fov() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    assert!(sync.resize(Viewport::new(800, 480)).unwrap());
    assert!(fov_calls(&log).is_empty());
    assert_eq!(sync.state().viewport, Viewport::new(800, 480));
}

#[test]
fn test_overlay_added_once() {
    let (mut sync, _log) = ready_sync(Viewport::new(640, 480));
    let spec = OverlaySpec::for_target(&TargetDescriptor {
        width: 10,
        height: 10,
    });

    let err = sync.add_overlay(spec).unwrap_err();
    assert!(matches!(err, TrackingError::OverlayAlreadyAttached));
}

#[test]
fn test_overlay_requires_surface() {
    let (mut sync, _log) = render_sync(Viewport::new(640, 480));
    let spec = OverlaySpec::for_target(&TargetDescriptor {
        width: 10,
        height: 10,
    });

    assert!(matches!(
        sync.add_overlay(spec),
        Err(TrackingError::InvalidState { .. })
    ));
}

#[test]
fn test_detach_removes_overlay() {
    let (mut sync, log) = ready_sync(Viewport::new(640, 480));

    sync.detach().unwrap();
    assert!(matches!(log.lock()[0], RenderCall::RemoveOverlay(_)));
    assert!(!sync.state().overlay_attached);

    // second detach is a no-op
    sync.detach().unwrap();
    assert_eq!(log.lock().len(), 1);
}
