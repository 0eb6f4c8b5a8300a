//! Render/interaction context of an annotation session.
//!
//! [`ArSession`] owns everything the render thread touches: the prediction
//! handoff, the anchor set, the placement state machine and the rendering and
//! tracking collaborators. Only the inference loop runs elsewhere, and it
//! reaches this context exclusively through the prediction handoff.

use std::{io, sync::Arc};

use ml_core::{Classifier, Prediction};
use serde::Serialize;
use tracing::{debug, info};
use video_ingest::FrameSource;

use crate::{
    anchors::{Anchor, AnchorSet},
    annotation::{TickOutcome, annotate},
    config::SessionConfig,
    inference::{InferenceHandle, InferenceLoop},
    placement::{PlaceOutcome, PlacementState, PlacementStateMachine, SelectOutcome},
    prediction::PredictionState,
    render::{DebugSurface, ObjectLibrary, Renderer},
    spatial::{ScreenPoint, SpatialResolver, TrackingConfig, TrackingSession},
};

/// External collaborators driven by the session.
pub struct Collaborators<T, R, L, D> {
    pub tracking: T,
    pub renderer: R,
    pub library: L,
    pub debug: D,
}

#[derive(Clone, Debug, Serialize)]
/// Serializable summary of session state.
pub struct SessionSnapshot {
    pub frame: u64,
    pub latest_label: String,
    pub latest_confidence: f32,
    pub awaiting_placement: bool,
    pub pending_label: Option<String>,
    pub objects_placed: u64,
    pub anchors: Vec<Anchor>,
}

pub struct ArSession<T, R, L, D> {
    config: SessionConfig,
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    tracking: T,
    renderer: R,
    library: L,
    debug: D,
    prediction: PredictionState,
    anchors: AnchorSet,
    placement: PlacementStateMachine,
    inference: Option<InferenceHandle>,
    /// Signalled loops whose last cycle may still be running.
    retiring: Vec<InferenceHandle>,
    frame: u64,
    objects_placed: u64,
}

impl<T, R, L, D> ArSession<T, R, L, D>
where
    T: SpatialResolver + TrackingSession,
    R: Renderer,
    L: ObjectLibrary,
    D: DebugSurface,
{
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        collaborators: Collaborators<T, R, L, D>,
    ) -> Self {
        let Collaborators {
            tracking,
            renderer,
            library,
            debug,
        } = collaborators;
        Self {
            config,
            source,
            classifier,
            tracking,
            renderer,
            library,
            debug,
            prediction: PredictionState::new(),
            anchors: AnchorSet::new(),
            placement: PlacementStateMachine::new(),
            inference: None,
            retiring: Vec::new(),
            frame: 0,
            objects_placed: 0,
        }
    }

    /// View became active: start world tracking and the inference loop.
    pub fn on_view_active(&mut self) -> io::Result<()> {
        self.tracking
            .run(TrackingConfig::world_with_horizontal_planes());
        self.reap_retired();
        if self.inference.is_none() {
            let inference = InferenceLoop::new(
                self.source.clone(),
                self.classifier.clone(),
                self.prediction.publisher(),
                self.config.debug_ranked_entries,
            );
            self.inference = Some(inference.spawn(self.config.watchdog)?);
        }
        info!("Session active; tracking with horizontal plane detection");
        Ok(())
    }

    /// View became inactive: pause tracking and signal the inference loop.
    ///
    /// Never waits for the cycle in flight; the loop exits once it completes
    /// and its threads are joined on a later activation.
    pub fn on_view_inactive(&mut self) {
        self.tracking.pause();
        if let Some(handle) = self.inference.take() {
            handle.signal();
            self.retiring.push(handle);
        }
        info!("Session paused");
    }

    fn reap_retired(&mut self) {
        let (finished, pending): (Vec<_>, Vec<_>) = self
            .retiring
            .drain(..)
            .partition(InferenceHandle::is_finished);
        for handle in finished {
            handle.stop();
        }
        if !pending.is_empty() {
            debug!("{} signalled inference loop(s) still finishing", pending.len());
        }
        self.retiring = pending;
    }

    /// Per-rendered-frame work: absorb the newest prediction, then annotate.
    pub fn tick(&mut self) -> TickOutcome {
        self.frame = self.frame.wrapping_add(1);
        if self.prediction.sync() {
            self.refresh_debug_surface();
        }
        let outcome = annotate(
            self.prediction.latest(),
            &self.placement,
            &mut self.anchors,
            &self.tracking,
            &mut self.renderer,
            &self.config,
        );
        metrics::counter!("annotation_ticks_total", "outcome" => outcome.label()).increment(1);
        outcome
    }

    /// Long-press gesture.
    pub fn on_long_press(&mut self, point: ScreenPoint) -> SelectOutcome {
        self.placement
            .select(point, &self.renderer, &self.anchors, &self.library)
    }

    /// Tap gesture.
    pub fn on_tap(&mut self, point: ScreenPoint) -> PlaceOutcome {
        let outcome = self
            .placement
            .place(point, &self.tracking, &mut self.renderer, &self.config);
        if matches!(outcome, PlaceOutcome::Placed { .. }) {
            self.objects_placed += 1;
        }
        outcome
    }

    pub fn cancel_placement(&mut self) -> bool {
        self.placement.cancel()
    }

    fn refresh_debug_surface(&mut self) {
        let confidence = self.prediction.latest().confidence;
        match self.prediction.ranked_text() {
            Some(text) if confidence > self.config.debug_confidence => self.debug.show(text),
            _ => self.debug.show(&self.config.debug_placeholder),
        }
        debug!(
            label = %self.prediction.latest().label,
            confidence,
            "Prediction updated"
        );
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let latest = self.prediction.latest();
        SessionSnapshot {
            frame: self.frame,
            latest_label: latest.label.clone(),
            latest_confidence: latest.confidence,
            awaiting_placement: self.placement.is_awaiting_placement(),
            pending_label: self.placement.pending_label().map(str::to_string),
            objects_placed: self.objects_placed,
            anchors: self.anchors.iter().cloned().collect(),
        }
    }

    pub fn is_inference_running(&self) -> bool {
        self.inference
            .as_ref()
            .is_some_and(InferenceHandle::is_running)
    }

    pub fn latest_prediction(&self) -> &Prediction {
        self.prediction.latest()
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn placement_state(&self) -> &PlacementState {
        self.placement.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tracking(&self) -> &T {
        &self.tracking
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn debug_surface(&self) -> &D {
        &self.debug
    }
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use bevy_math::{Vec2, Vec3};
    use ml_core::{ScriptStep, ScriptedClassifier};
    use video_ingest::{Frame, FrameFormat, LatestFrame};

    use super::*;
    use crate::{
        prediction::PredictionUpdate,
        render::ObjectTemplate,
        spatial::PlaneDetection,
        testing::{FakeRenderer, FakeTracking, FixedLibrary, RecordingDebug},
    };

    type TestSession = ArSession<FakeTracking, FakeRenderer, FixedLibrary, RecordingDebug>;

    fn session() -> TestSession {
        session_with(
            Arc::new(LatestFrame::new()),
            Arc::new(ScriptedClassifier::new(Vec::new())),
        )
    }

    fn session_with(source: Arc<dyn FrameSource>, classifier: Arc<dyn Classifier>) -> TestSession {
        let mut tracking = FakeTracking::default();
        tracking.feature_hit = Some(Vec3::new(0.0, 0.0, -0.5));
        ArSession::new(
            SessionConfig {
                watchdog: false,
                ..SessionConfig::default()
            },
            source,
            classifier,
            Collaborators {
                tracking,
                renderer: FakeRenderer::default(),
                library: FixedLibrary(Some(ObjectTemplate::new("ship"))),
                debug: RecordingDebug::default(),
            },
        )
    }

    fn publish(session: &TestSession, label: &str, confidence: f32) {
        session.prediction.publisher().publish(PredictionUpdate {
            prediction: Prediction::new(label, confidence),
            ranked: format!("{label} - {confidence:.2}"),
        });
    }

    #[test]
    fn repeated_detection_creates_one_anchor() {
        let mut session = session();
        let mut anchored = 0;
        for _ in 0..5 {
            publish(&session, "cup", 0.81);
            if matches!(session.tick(), TickOutcome::Anchored { .. }) {
                anchored += 1;
            }
        }
        assert_eq!(anchored, 1);
        assert_eq!(session.anchors().len(), 1);
        assert_eq!(session.renderer().labels.len(), 1);
    }

    #[test]
    fn stale_prediction_is_reused_between_updates() {
        let mut session = session();
        publish(&session, "cup", 0.9);
        assert!(matches!(session.tick(), TickOutcome::Anchored { .. }));
        assert_eq!(session.tick(), TickOutcome::AlreadyAnchored);
        assert_eq!(session.latest_prediction(), &Prediction::new("cup", 0.9));
    }

    #[test]
    fn debug_surface_follows_debug_threshold() {
        let mut session = session();
        publish(&session, "cup", 0.42);
        session.tick();
        publish(&session, "lint", 0.05);
        session.tick();
        publish(&session, "lamp", 0.10);
        session.tick();
        session.tick();

        assert_eq!(
            session.debug_surface().shown,
            ["cup - 0.42", "null", "null"]
        );
    }

    #[test]
    fn select_place_round_trip() {
        let mut session = session();
        publish(&session, "cup", 0.81);
        session.tick();

        session.renderer.push_label_hit("cup");
        assert_eq!(
            session.on_long_press(Vec2::new(200.0, 400.0)),
            SelectOutcome::Selected {
                label: "cup".into()
            }
        );

        publish(&session, "mug", 0.95);
        assert_eq!(session.tick(), TickOutcome::Suspended);

        assert_eq!(session.on_tap(Vec2::new(50.0, 700.0)), PlaceOutcome::NoPlaneHit);
        assert!(session.snapshot().awaiting_placement);

        session.tracking.plane_hit = Some(Vec3::new(1.0, 0.0, 2.0));
        let PlaceOutcome::Placed { position, .. } = session.on_tap(Vec2::new(50.0, 700.0)) else {
            panic!("expected placement");
        };
        assert!((position - Vec3::new(1.0, 0.2, 2.0)).length() < 1e-6);
        assert_eq!(session.placement_state(), &PlacementState::Scanning);
        assert_eq!(session.renderer().objects.len(), 1);

        assert!(matches!(session.tick(), TickOutcome::Anchored { .. }));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.objects_placed, 1);
        assert_eq!(snapshot.anchors.len(), 2);
    }

    #[test]
    fn lifecycle_runs_and_pauses_tracking() {
        let mut session = session();
        session.on_view_active().expect("activate");
        assert!(session.is_inference_running());
        assert_eq!(
            session.tracking().runs,
            [TrackingConfig {
                plane_detection: PlaneDetection::Horizontal
            }]
        );

        session.on_view_inactive();
        assert!(!session.is_inference_running());
        assert_eq!(session.tracking().pauses, 1);

        session.on_view_active().expect("reactivate");
        assert!(session.is_inference_running());
        session.on_view_inactive();
    }

    fn slow_session(latency: Duration) -> (TestSession, Arc<ScriptedClassifier>) {
        let slot = LatestFrame::new();
        slot.store(Frame {
            data: vec![0; 2 * 2 * 3],
            width: 2,
            height: 2,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        });
        let classifier = Arc::new(
            ScriptedClassifier::new(vec![ScriptStep::top("cup", 0.81)]).with_latency(latency),
        );
        (session_with(Arc::new(slot), classifier.clone()), classifier)
    }

    fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn deactivation_does_not_wait_for_a_slow_cycle() {
        let (mut session, classifier) = slow_session(Duration::from_secs(2));
        session.on_view_active().expect("activate");
        wait_until("first classify call", || classifier.calls() >= 1);

        let started = Instant::now();
        session.on_view_inactive();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!session.is_inference_running());
        assert_eq!(session.tracking().pauses, 1);
        assert_eq!(session.retiring.len(), 1);
    }

    #[test]
    fn retired_loops_are_joined_on_reactivation() {
        let (mut session, classifier) = slow_session(Duration::from_millis(30));
        session.on_view_active().expect("activate");
        wait_until("first classify call", || classifier.calls() >= 1);
        session.on_view_inactive();
        wait_until("retired loop exit", || {
            session.retiring.iter().all(InferenceHandle::is_finished)
        });

        session.on_view_active().expect("reactivate");
        assert!(session.retiring.is_empty());
        assert!(session.is_inference_running());
        session.on_view_inactive();
    }

    #[test]
    fn snapshot_serializes() {
        let mut session = session();
        publish(&session, "cup", 0.81);
        session.tick();
        let json = serde_json::to_value(session.snapshot()).expect("serialize");
        assert_eq!(json["latest_label"], "cup");
        assert_eq!(json["anchors"][0]["label"], "cup");
        assert_eq!(json["awaiting_placement"], false);
    }
}
