//! `simulate`: drive a labelling session against a scripted scene.

use std::{
    fs,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use ml_core::{Classifier, ScriptedClassifier};
use scene::{AssetLibrary, DebugText, SceneGraph, SimulatedTracking};
use tracing::{debug, info, warn};
use video_ingest::{LatestFrame, spawn_frame_pump, spawn_synthetic_reader};
use vision::{
    ArSession, Collaborators, PlaceOutcome, SelectOutcome, SessionConfig, SessionSnapshot,
    TickOutcome, telemetry,
};

use crate::{
    cli::SimulationConfig,
    scenario::{Gesture, Scenario, frame_interval},
};

type Session = ArSession<SimulatedTracking, SceneGraph, AssetLibrary, DebugText>;

#[derive(Debug, Default)]
struct TickTally {
    anchored: u64,
    suspended: u64,
    below_threshold: u64,
    no_hit: u64,
    already_anchored: u64,
}

impl TickTally {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Anchored { .. } => self.anchored += 1,
            TickOutcome::Suspended => self.suspended += 1,
            TickOutcome::BelowThreshold => self.below_threshold += 1,
            TickOutcome::NoHit => self.no_hit += 1,
            TickOutcome::AlreadyAnchored => self.already_anchored += 1,
        }
    }
}

pub fn run(config: SimulationConfig) -> Result<()> {
    let telemetry_guard = telemetry::enter_runtime(&config.telemetry);
    let metrics = if config.print_metrics {
        let handle = telemetry::init_metrics_recorder();
        if handle.is_none() {
            warn!("Metrics recorder unavailable; --metrics output will be empty");
        }
        handle
    } else {
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    }

    let scenario = &config.scenario;
    let span = tracing::info_span!(
        "simulate",
        ticks = scenario.ticks,
        fps = scenario.fps,
        capture_width = scenario.capture.width,
        capture_height = scenario.capture.height
    );
    let _span_guard = span.enter();

    let source = LatestFrame::new();
    let capturing = Arc::new(AtomicBool::new(true));
    let capture = spawn_synthetic_reader(
        (scenario.capture.width, scenario.capture.height),
        scenario.capture.fps,
    )
    .context("failed to start synthetic camera")?;
    let pump = spawn_frame_pump(capture, source.clone(), capturing.clone())
        .context("failed to start frame pump")?;

    let classifier = build_classifier(&config)?;
    let snapshot = drive_session(scenario, source, classifier, &shutdown);

    capturing.store(false, Ordering::Relaxed);
    pump.join().map_err(|_| anyhow!("frame pump panicked"))?;
    let snapshot = snapshot?;

    let json = serde_json::to_string_pretty(&snapshot).context("failed to encode snapshot")?;
    println!("{json}");
    if let Some(path) = config.snapshot_path.as_ref() {
        fs::write(path, &json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }
    if let Some(handle) = metrics {
        println!("{}", handle.render());
    }
    if let Some(path) = telemetry_guard.chrome_trace_path() {
        info!("Chrome trace will be written to {}", path.display());
    }
    Ok(())
}

fn drive_session(
    scenario: &Scenario,
    source: LatestFrame,
    classifier: Arc<dyn Classifier>,
    shutdown: &AtomicBool,
) -> Result<SessionSnapshot> {
    let camera = scenario.camera();
    let tracking = SimulatedTracking::new(camera)
        .with_feature_points(scenario.feature_points.iter().copied())
        .with_planes(scenario.planes.iter().copied());
    let renderer = if scenario.label_textures {
        SceneGraph::new(camera).with_label_textures()
    } else {
        SceneGraph::new(camera)
    };
    let mut session: Session = ArSession::new(
        SessionConfig::default(),
        Arc::new(source),
        classifier,
        Collaborators {
            tracking,
            renderer,
            library: AssetLibrary::new(scenario.asset.clone()).with_asset(scenario.asset.clone()),
            debug: DebugText::default(),
        },
    );
    session
        .on_view_active()
        .context("failed to start the inference loop")?;
    info!("Running simulation; press Ctrl+C to stop early");

    let interval = frame_interval(scenario.fps)
        .with_context(|| format!("fps {} has no frame interval", scenario.fps))?;
    let timeline = scenario.timeline();
    let mut pending = timeline.iter().peekable();
    let mut tally = TickTally::default();
    let mut ticks_run: u64 = 0;

    for tick in 1..=scenario.ticks {
        if shutdown.load(Ordering::SeqCst) {
            warn!("Interrupted after {ticks_run} tick(s)");
            break;
        }
        let started = Instant::now();
        let outcome = session.tick();
        tally.record(&outcome);
        if let TickOutcome::Anchored { label, .. } = &outcome {
            debug!(tick, label = %label, "Anchor created");
        }
        while let Some(scheduled) = pending.next_if(|scheduled| scheduled.at_tick <= tick) {
            fire(&mut session, scheduled.gesture);
        }
        ticks_run = tick;

        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    session.on_view_inactive();
    let snapshot = session.snapshot();
    info!(
        ticks = ticks_run,
        anchors = snapshot.anchors.len(),
        objects = snapshot.objects_placed,
        anchored = tally.anchored,
        already_anchored = tally.already_anchored,
        below_threshold = tally.below_threshold,
        no_hit = tally.no_hit,
        suspended = tally.suspended,
        "Simulation finished"
    );
    Ok(snapshot)
}

fn fire(session: &mut Session, gesture: Gesture) {
    let center = session.renderer().camera().viewport().center();
    match gesture {
        Gesture::LongPress { point } => {
            let point = point.unwrap_or(center);
            match session.on_long_press(point) {
                SelectOutcome::Selected { label } => info!(label = %label, "Long-press selected"),
                other => info!("Long-press at ({}, {}) ignored: {other:?}", point.x, point.y),
            }
        }
        Gesture::Tap { point } => {
            let point = point.unwrap_or(center);
            match session.on_tap(point) {
                PlaceOutcome::Placed { position, .. } => info!(
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    "Tap placed object"
                ),
                other => info!("Tap at ({}, {}) ignored: {other:?}", point.x, point.y),
            }
        }
        Gesture::Cancel => {
            if session.cancel_placement() {
                info!("Pending placement cancelled");
            }
        }
    }
}

#[cfg(not(feature = "with-tch"))]
fn build_classifier(config: &SimulationConfig) -> Result<Arc<dyn Classifier>> {
    Ok(scripted_classifier(&config.scenario))
}

#[cfg(feature = "with-tch")]
fn build_classifier(config: &SimulationConfig) -> Result<Arc<dyn Classifier>> {
    use ml_core::{tch::Device, torch::TorchClassifier};

    let Some(torch) = config.torch.as_ref() else {
        return Ok(scripted_classifier(&config.scenario));
    };
    let device = if torch.use_cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    let capture = &config.scenario.capture;
    let classifier = TorchClassifier::new(
        &torch.model,
        &torch.labels,
        device,
        (capture.width as i64, capture.height as i64),
    )
    .context("failed to load TorchScript classifier")?;
    info!("Using TorchScript classifier on {:?}", classifier.device());
    Ok(Arc::new(classifier))
}

fn scripted_classifier(scenario: &Scenario) -> Arc<dyn Classifier> {
    Arc::new(
        ScriptedClassifier::new(scenario.script())
            .with_latency(Duration::from_millis(scenario.classifier.latency_ms)),
    )
}

#[cfg(test)]
mod tests {
    use bevy_math::{Vec2, Vec3};
    use video_ingest::{Frame, FrameFormat};

    use super::*;
    use crate::scenario::ScheduledGesture;

    fn quick_scenario() -> Scenario {
        let mut scenario = Scenario {
            ticks: 40,
            fps: 200.0,
            ..Scenario::default()
        };
        scenario.classifier.latency_ms = 1;
        scenario.gestures.clear();
        scenario
    }

    fn filled_source(scenario: &Scenario) -> LatestFrame {
        let source = LatestFrame::new();
        let (width, height) = (scenario.capture.width, scenario.capture.height);
        source.store(Frame {
            data: vec![0; (width * height * 3) as usize],
            width,
            height,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        });
        source
    }

    #[test]
    fn interrupted_run_still_returns_a_snapshot() {
        let scenario = quick_scenario();
        let source = filled_source(&scenario);
        let shutdown = AtomicBool::new(true);

        let snapshot = drive_session(&scenario, source, scripted_classifier(&scenario), &shutdown)
            .expect("snapshot");
        assert_eq!(snapshot.frame, 0);
        assert!(snapshot.anchors.is_empty());
    }

    #[test]
    fn gestures_fire_on_schedule() {
        let mut scenario = quick_scenario();
        scenario.ticks = 400;
        scenario.feature_points = vec![Vec3::new(0.0, 1.5, -1.0)];
        // Select once the first label is up, then place on the floor.
        scenario.gestures = vec![
            ScheduledGesture {
                at_tick: 300,
                gesture: Gesture::LongPress { point: None },
            },
            ScheduledGesture {
                at_tick: 301,
                gesture: Gesture::Tap {
                    point: Some(Vec2::new(375.0, 1300.0)),
                },
            },
        ];
        let source = filled_source(&scenario);
        let shutdown = AtomicBool::new(false);

        let snapshot = drive_session(&scenario, source, scripted_classifier(&scenario), &shutdown)
            .expect("snapshot");
        assert!(!snapshot.anchors.is_empty());
        assert_eq!(snapshot.objects_placed, 1);
        assert!(!snapshot.awaiting_placement);
    }
}
