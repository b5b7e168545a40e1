//! Acquisition report tests against a real acquisition run

use camtrack_diagnostics::*;
use camtrack_media::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

fn ideal(width: u32, height: u32) -> CaptureConfiguration {
    CaptureConfiguration::video(VideoConstraints {
        width: Some(ConstraintValue::ideal_only(width)),
        height: Some(ConstraintValue::ideal_only(height)),
        ..Default::default()
    })
}

fn drain(rx: &mut broadcast::Receiver<AcquisitionEvent>) -> Vec<AcquisitionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn element() -> Box<dyn VideoElement> {
    Box::new(StreamElement::with_poll_interval(Duration::from_millis(1)))
}

// ============================================================================
// REPORT TESTS
// ============================================================================

#[tokio::test]
async fn test_report_after_fallback_success() {
    let camera = SimulatedCamera::webcam().failing_first(2);
    let mut acquirer = StreamAcquirer::new(Arc::new(camera), PlatformProfile::desktop());
    let mut rx = acquirer.subscribe_events();

    let _source = assert_ok!(acquirer.acquire(&ideal(1280, 720), element()).await);

    let report = AcquisitionReport::from_events(&drain(&mut rx)).with_metrics(&acquirer.metrics());
    assert_eq!(report.attempts.len(), 3);
    assert!(report.fallbacks_built.is_some());
    assert!(!report.exhausted);
    assert!(report.elapsed.is_some());

    assert!(matches!(
        &report.attempts[0].outcome,
        AttemptOutcome::Failed { kind, .. } if kind == "constraint_unsatisfiable"
    ));
    let success = report.successful_attempt().unwrap();
    assert_eq!(success.attempt, 3);
    assert_eq!(
        success.outcome,
        AttemptOutcome::Validated {
            width: 1280,
            height: 720
        }
    );
    assert!(report.summary().starts_with("stream acquired on attempt 3 of 3"));

    let text = report.to_string();
    assert!(text.contains("#1"));
    assert!(text.contains("playing at 1280x720"));
}

#[tokio::test]
async fn test_report_for_permission_denial() {
    let camera = SimulatedCamera::webcam().deny_permission();
    let mut acquirer = StreamAcquirer::new(Arc::new(camera), PlatformProfile::desktop());
    let mut rx = acquirer.subscribe_events();

    let err = assert_err!(acquirer.acquire(&ideal(1280, 720), element()).await);
    assert!(err.is_permission_denied());

    let report = AcquisitionReport::from_events(&drain(&mut rx));
    assert_eq!(report.attempts.len(), 1);
    assert!(report.permission_denied());
    assert_eq!(report.fallbacks_built, None);
    assert_eq!(report.summary(), "camera access denied");
}

#[tokio::test]
async fn test_report_for_exhaustion_serializes() {
    let camera = SimulatedCamera::new(Vec::new());
    let mut acquirer = StreamAcquirer::new(Arc::new(camera), PlatformProfile::desktop());
    let mut rx = acquirer.subscribe_events();

    assert_err!(
        acquirer
            .acquire(&CaptureConfiguration::any_video(false), element())
            .await
    );

    let report = AcquisitionReport::from_events(&drain(&mut rx));
    assert!(report.exhausted);
    assert_eq!(report.summary(), "no configuration worked after 1 attempts");

    let json = assert_ok!(serde_json::to_string(&report));
    assert!(json.contains("\"result\":\"failed\""));
    let back: AcquisitionReport = assert_ok!(serde_json::from_str(&json));
    assert_eq!(back, report);
}
