//! Tests for fallback configuration generation
//!
//! These exercise the ordering, uniqueness and aspect-ratio properties of
//! the candidate queue across a range of desired configurations.

use camtrack_media::*;

fn ideal(width: u32, height: u32) -> VideoConstraints {
    VideoConstraints {
        width: Some(ConstraintValue::ideal_only(width)),
        height: Some(ConstraintValue::ideal_only(height)),
        ..Default::default()
    }
}

fn desired_configs() -> Vec<CaptureConfiguration> {
    vec![
        CaptureConfiguration::video(ideal(1920, 1080)),
        CaptureConfiguration::video(ideal(1280, 720)),
        CaptureConfiguration::video(ideal(640, 480)),
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: Some(FacingMode::Environment),
            ..ideal(1080, 1920)
        }),
        CaptureConfiguration::video(VideoConstraints {
            width: Some(ConstraintValue::pinned(1366)),
            height: Some(ConstraintValue::pinned(768)),
            frame_rate: Some(ConstraintValue::Exact(60.0)),
            facing_mode: Some(FacingMode::User),
        }),
        CaptureConfiguration::video(VideoConstraints {
            width: Some(ConstraintValue::Exact(800)),
            height: Some(ConstraintValue::Exact(600)),
            ..Default::default()
        }),
        CaptureConfiguration {
            audio: true,
            ..CaptureConfiguration::video(ideal(1280, 720)).with_device_id("cam-1")
        },
    ]
}

fn near_resolution_candidates(queue: &CandidateQueue) -> Vec<(u32, u32)> {
    queue
        .iter()
        .filter_map(|candidate| candidate.video_constraints()?.ideal_dimensions())
        .collect()
}

// ============================================================================
// QUEUE PROPERTY TESTS
// ============================================================================

#[test]
fn test_queue_has_no_duplicates() {
    for desired in desired_configs() {
        let queue: Vec<_> = build_fallbacks(&desired).into_iter().collect();
        for (i, a) in queue.iter().enumerate() {
            for b in &queue[i + 1..] {
                assert_ne!(a, b, "duplicate candidate for {}", desired);
            }
        }
    }
}

#[test]
fn test_queue_never_contains_desired() {
    for desired in desired_configs() {
        assert!(build_fallbacks(&desired).iter().all(|c| c != &desired));
    }
}

#[test]
fn test_last_candidate_is_any_video() {
    for desired in desired_configs() {
        let queue = build_fallbacks(&desired);
        assert_eq!(
            queue.back(),
            Some(&CaptureConfiguration::any_video(desired.audio)),
            "for {}",
            desired
        );
        let any_count = queue
            .iter()
            .filter(|c| c.video == VideoRequest::Any)
            .count();
        assert!(any_count >= 1);
    }
}

#[test]
fn test_near_resolutions_stay_in_aspect_band() {
    let (low, high) = aspect_band();

    for (width, height) in [(1920, 1080), (1280, 720), (640, 480), (1080, 1920)] {
        let desired = CaptureConfiguration::video(ideal(width, height));
        let queue = build_fallbacks(&desired);
        let swapped = (height, width);

        for dims in near_resolution_candidates(&queue) {
            if dims == swapped {
                continue;
            }
            let ratio = aspect_ratio(dims.0, dims.1);
            assert!(
                ratio >= low && ratio <= high,
                "{}x{} outside band for {}x{}",
                dims.0,
                dims.1,
                width,
                height
            );
        }
    }
}

#[test]
fn test_full_hd_near_resolutions() {
    let queue = build_fallbacks(&CaptureConfiguration::video(ideal(1920, 1080)));
    let near = near_resolution_candidates(&queue);

    assert!(near.contains(&(1920, 1152)));
    assert!(near.contains(&(1366, 1080)));
    assert!(near.contains(&(1280, 960)));
    assert!(!near.contains(&(1920, 480)));
    assert!(!near.contains(&(1920, 960)));
    // the desired pair is only present swapped
    assert!(!near.contains(&(1920, 1080)));
    assert!(near.contains(&(1080, 1920)));
}

// ============================================================================
// ORDERING TESTS
// ============================================================================

#[test]
fn test_full_queue_for_ideal_hd_with_facing_mode() {
    let environment = Some(FacingMode::Environment);
    let desired = CaptureConfiguration::video(VideoConstraints {
        facing_mode: environment,
        ..ideal(1280, 720)
    });

    let queue: Vec<_> = build_fallbacks(&desired).into_iter().collect();

    let expected = vec![
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: environment,
            ..ideal(1280, 768)
        }),
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: environment,
            ..ideal(1152, 720)
        }),
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: environment,
            ..ideal(1152, 768)
        }),
        // swapped
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: environment,
            ..ideal(720, 1280)
        }),
        // ideal-only ranges relax to no dimensions at all
        CaptureConfiguration::video(VideoConstraints {
            facing_mode: environment,
            ..Default::default()
        }),
        // facing mode removed
        CaptureConfiguration::video(ideal(1280, 720)),
        // swapped, facing mode removed
        CaptureConfiguration::video(ideal(720, 1280)),
        CaptureConfiguration::any_video(false),
    ];
    assert_eq!(queue, expected);
}

#[test]
fn test_relaxation_keeps_hard_bounds() {
    let desired = CaptureConfiguration::video(VideoConstraints {
        width: Some(ConstraintValue::pinned(1366)),
        height: Some(ConstraintValue::pinned(768)),
        ..Default::default()
    });

    let relaxed = VideoConstraints {
        width: Some(ConstraintValue::Range(ConstraintRange {
            min: Some(1366),
            max: Some(1366),
            ideal: None,
        })),
        height: Some(ConstraintValue::Range(ConstraintRange {
            min: Some(768),
            max: Some(768),
            ideal: None,
        })),
        ..Default::default()
    };

    let queue = build_fallbacks(&desired);
    assert!(queue
        .iter()
        .any(|c| c.video_constraints() == Some(&relaxed)));
}

#[test]
fn test_exact_dimensions_skip_near_resolutions() {
    let desired = CaptureConfiguration::video(VideoConstraints {
        width: Some(ConstraintValue::Exact(800)),
        height: Some(ConstraintValue::Exact(600)),
        ..Default::default()
    });

    let queue: Vec<_> = build_fallbacks(&desired).into_iter().collect();
    assert_eq!(
        queue,
        vec![
            CaptureConfiguration::video(VideoConstraints {
                width: Some(ConstraintValue::Exact(600)),
                height: Some(ConstraintValue::Exact(800)),
                ..Default::default()
            }),
            CaptureConfiguration::any_video(false),
        ]
    );
}

#[test]
fn test_frame_rate_survives_fallbacks() {
    let desired = CaptureConfiguration::video(VideoConstraints {
        frame_rate: Some(ConstraintValue::Exact(60.0)),
        ..ideal(1280, 720)
    });

    let queue: Vec<_> = build_fallbacks(&desired).into_iter().collect();
    let (last, rest) = queue.split_last().unwrap();

    assert!(rest.iter().all(|c| {
        c.video_constraints().and_then(|v| v.frame_rate) == Some(ConstraintValue::Exact(60.0))
    }));
    assert_eq!(last, &CaptureConfiguration::any_video(false));
}

#[test]
fn test_device_and_audio_carry_over() {
    let desired = CaptureConfiguration {
        audio: true,
        ..CaptureConfiguration::video(ideal(1280, 720)).with_device_id("cam-1")
    };

    let queue: Vec<_> = build_fallbacks(&desired).into_iter().collect();
    let (last, rest) = queue.split_last().unwrap();

    assert!(rest
        .iter()
        .all(|c| c.audio && c.device_id.as_deref() == Some("cam-1")));
    assert_eq!(last, &CaptureConfiguration::any_video(true));
}

#[test]
fn test_empty_queue_without_video_constraints() {
    let audio_only: CaptureConfiguration =
        CaptureConfiguration::from_json_str(r#"{"audio": true, "video": false}"#).unwrap();
    assert!(build_fallbacks(&audio_only).is_empty());

    let any = CaptureConfiguration::from_json_str(r#"{"video": true}"#).unwrap();
    assert!(build_fallbacks(&any).is_empty());
}
