//! Simulated tracking session
//!
//! A laptop webcam offering only 640x480 and 1280x720 is asked for a pinned
//! Full-HD rear camera. Acquisition walks the fallback queue until a stream
//! plays, then a scripted tracker drives the overlay for a second.

use camtrack::simulated::{
    CaptureMode, IntervalClock, RecordingBackground, RecordingRenderer, SimulatedCamera,
    SimulatedPose, SimulatedTracker,
};
use camtrack::{
    Camtrack, CaptureConfiguration, ConstraintValue, Event, EventFilter, FacingMode,
    GlobalConfig, ReferenceImage, VideoConstraints, Viewport, IDENTITY_TRANSFORM,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let camtrack = Camtrack::init_with(GlobalConfig {
        debug_logging: true,
        ..Default::default()
    })?;

    println!("📷 Starting simulated session");

    let camera = SimulatedCamera::new(vec![CaptureMode::new(640, 480), CaptureMode::new(1280, 720)])
        .with_facing(vec![FacingMode::User]);
    let desired = CaptureConfiguration::video(VideoConstraints {
        width: Some(ConstraintValue::pinned(1920)),
        height: Some(ConstraintValue::pinned(1080)),
        facing_mode: Some(FacingMode::Environment),
        ..Default::default()
    });

    // detect every other frame, with a slowly changing focal length
    let script = (0..20)
        .map(|i| {
            (i % 2 == 0).then(|| SimulatedPose {
                target_id: 0,
                transform: IDENTITY_TRANSFORM,
                focal: 320.0 + i as f64,
            })
        })
        .collect();

    let renderer = RecordingRenderer::new();
    let render_log = renderer.log();
    let builder = camtrack
        .session()
        .viewport(Viewport::new(1280, 720))
        .capture(desired)
        .device(Arc::new(camera.clone()))
        .tracker(Box::new(SimulatedTracker::new(script)))
        .renderer(
            Box::new(renderer),
            Box::new(RecordingBackground::with_log(render_log.clone())),
        )
        .clock(Box::new(IntervalClock::new(30)));

    let mut acquisition = builder.events().filtered(EventFilter::acquisition_only());
    let session = builder.start().await?;

    while let Ok(Some(event)) = acquisition.try_next() {
        if let Event::Acquisition(event) = event {
            println!("   🔄 {:?}", event);
        }
    }
    println!("{}", session.acquisition_report());
    println!(
        "✅ Playing {}x{} with {}",
        session.stream_metadata().width,
        session.stream_metadata().height,
        session.capture_config()
    );

    let image = ReferenceImage::new(640, 480, vec![255u8; 640 * 480 * 4])?;
    let target = session.register_target(image).await?;
    println!("🎯 Target trained at {}x{}", target.width, target.height);

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("📊 Tracking at {:.1} fps", session.tracking_fps());

    let report = session.shutdown().await?;
    println!(
        "🛑 Stopped: {} updates rendered, {} detections, {} renderer calls",
        report.stats.updates_rendered,
        report.stats.detections,
        render_log.lock().len()
    );
    println!("   Camera saw {} requests", camera.attempts().len());

    Ok(())
}
