//! Dedicated serial inference context.
//!
//! One thread pulls the newest frame, classifies it, and publishes the top
//! result, then immediately starts the next cycle. Cycles never overlap and
//! are paced only by model latency.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use ml_core::{Classifier, Prediction, ranked_summary};
use tracing::{debug, error, warn};
use video_ingest::FrameSource;

use crate::{
    prediction::{PredictionPublisher, PredictionUpdate},
    telemetry,
    watchdog::{InferenceHealth, spawn_watchdog},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What a single cycle did.
pub enum CycleOutcome {
    /// No frame yet; skipped.
    NoFrame,
    Published,
    /// Classifier returned nothing usable; nothing published.
    Unusable,
    /// Classifier error; previous prediction stays in place.
    Failed,
    /// Render side is gone; the loop should end.
    Disconnected,
}

impl CycleOutcome {
    pub fn label(self) -> &'static str {
        match self {
            CycleOutcome::NoFrame => "no_frame",
            CycleOutcome::Published => "published",
            CycleOutcome::Unusable => "unusable",
            CycleOutcome::Failed => "failed",
            CycleOutcome::Disconnected => "disconnected",
        }
    }
}

pub struct InferenceLoop {
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    publisher: PredictionPublisher,
    health: Arc<InferenceHealth>,
    ranked_entries: usize,
}

impl InferenceLoop {
    pub fn new(
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        publisher: PredictionPublisher,
        ranked_entries: usize,
    ) -> Self {
        Self {
            source,
            classifier,
            publisher,
            health: Arc::new(InferenceHealth::new()),
            ranked_entries,
        }
    }

    pub fn health(&self) -> Arc<InferenceHealth> {
        self.health.clone()
    }

    /// Run one fetch → classify → publish cycle.
    pub fn run_cycle(&self) -> CycleOutcome {
        let Some(frame) = self.source.current_frame() else {
            return CycleOutcome::NoFrame;
        };

        let started = Instant::now();
        let result = self.classifier.classify(&frame);
        metrics::histogram!("inference_latency_seconds").record(started.elapsed().as_secs_f64());

        let ranked = match result {
            Ok(ranked) => ranked,
            Err(err) => {
                warn!("Classification failed: {err}");
                return CycleOutcome::Failed;
            }
        };
        let Some(prediction) = Prediction::from_ranked(&ranked) else {
            debug!("Classifier returned no usable label ({} entries)", ranked.len());
            return CycleOutcome::Unusable;
        };

        let update = PredictionUpdate {
            ranked: ranked_summary(&ranked, self.ranked_entries),
            prediction,
        };
        if self.publisher.publish(update) {
            CycleOutcome::Published
        } else {
            CycleOutcome::Disconnected
        }
    }

    /// Move the loop onto its own thread, optionally with a stall watchdog.
    pub fn spawn(self, with_watchdog: bool) -> io::Result<InferenceHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let watchdog = if with_watchdog {
            Some(spawn_watchdog(self.health.clone(), running.clone())?)
        } else {
            None
        };

        let loop_running = running.clone();
        let worker = match telemetry::spawn_thread("inference", move || self.run(loop_running)) {
            Ok(worker) => worker,
            Err(err) => {
                running.store(false, Ordering::SeqCst);
                if let Some(handle) = watchdog {
                    let _ = handle.join();
                }
                return Err(err);
            }
        };

        Ok(InferenceHandle {
            running,
            worker: Some(worker),
            watchdog,
        })
    }

    fn run(self, running: Arc<AtomicBool>) {
        let mut cycles: u64 = 0;
        while running.load(Ordering::Acquire) {
            let outcome =
                tracing::trace_span!("inference.cycle", cycle = cycles).in_scope(|| self.run_cycle());
            cycles = cycles.wrapping_add(1);
            self.health.beat();
            metrics::counter!("inference_cycles_total", "outcome" => outcome.label()).increment(1);

            match outcome {
                CycleOutcome::NoFrame => thread::yield_now(),
                CycleOutcome::Disconnected => {
                    debug!("Prediction consumer gone; stopping inference loop");
                    break;
                }
                _ => {}
            }
        }
        running.store(false, Ordering::Release);
        debug!("Inference loop exited after {cycles} cycle(s)");
    }
}

/// Owner of a running inference loop.
///
/// [`InferenceHandle::signal`] asks the loop to end after the cycle in flight
/// and returns at once. [`InferenceHandle::stop`] also waits for the threads.
/// Dropping the handle only signals the loop.
pub struct InferenceHandle {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    watchdog: Option<thread::JoinHandle<()>>,
}

impl InferenceHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the loop to end without waiting for the cycle in flight.
    pub fn signal(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether every thread behind this handle has exited, so that
    /// [`InferenceHandle::stop`] would not block.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(thread::JoinHandle::is_finished)
            && self.watchdog.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Signal the loop and join its threads.
    pub fn stop(mut self) {
        self.signal();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Inference thread panicked");
            }
        }
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
    }
}

impl Drop for InferenceHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        time::{Duration, Instant},
    };

    use ml_core::{Classification, ClassifyError, ScriptStep, ScriptedClassifier};
    use video_ingest::{Frame, FrameFormat, LatestFrame};

    use super::*;
    use crate::prediction::PredictionState;

    fn frame() -> Frame {
        Frame {
            data: vec![0; 2 * 2 * 3],
            width: 2,
            height: 2,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        }
    }

    fn inference(
        slot: &LatestFrame,
        classifier: Arc<dyn Classifier>,
        state: &PredictionState,
    ) -> InferenceLoop {
        InferenceLoop::new(Arc::new(slot.clone()), classifier, state.publisher(), 2)
    }

    #[test]
    fn skips_when_no_frame_is_available() {
        let slot = LatestFrame::new();
        let classifier = Arc::new(ScriptedClassifier::new(vec![ScriptStep::top("cup", 0.9)]));
        let mut state = PredictionState::new();
        let cycle = inference(&slot, classifier.clone(), &state);

        assert_eq!(cycle.run_cycle(), CycleOutcome::NoFrame);
        assert_eq!(classifier.calls(), 0);
        assert!(!state.sync());
    }

    #[test]
    fn publishes_canonical_top_result() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(ScriptedClassifier::new(vec![ScriptStep::Ranked(vec![
            Classification::new("golden retriever, dog", 0.92),
            Classification::new("labrador", 0.04),
        ])]));
        let mut state = PredictionState::new();
        let cycle = inference(&slot, classifier, &state);

        assert_eq!(cycle.run_cycle(), CycleOutcome::Published);
        assert!(state.sync());
        assert_eq!(state.latest(), &Prediction::new("golden retriever", 0.92));
        assert_eq!(
            state.ranked_text(),
            Some("golden retriever, dog - 0.92\nlabrador - 0.04")
        );
    }

    #[test]
    fn failure_keeps_the_previous_prediction() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            ScriptStep::top("cup", 0.81),
            ScriptStep::Fail("model error".into()),
        ]));
        let mut state = PredictionState::new();
        let cycle = inference(&slot, classifier, &state);

        assert_eq!(cycle.run_cycle(), CycleOutcome::Published);
        assert_eq!(cycle.run_cycle(), CycleOutcome::Failed);
        state.sync();
        assert_eq!(state.latest(), &Prediction::new("cup", 0.81));
    }

    #[test]
    fn empty_ranking_is_not_published() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(ScriptedClassifier::new(Vec::new()));
        let mut state = PredictionState::new();
        let cycle = inference(&slot, classifier, &state);

        assert_eq!(cycle.run_cycle(), CycleOutcome::Unusable);
        assert!(!state.sync());
    }

    #[test]
    fn spawned_loop_publishes_and_stops() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(ScriptedClassifier::new(vec![ScriptStep::top("cup", 0.81)]));
        let mut state = PredictionState::new();
        let handle = inference(&slot, classifier.clone(), &state)
            .spawn(false)
            .expect("spawn loop");

        let deadline = Instant::now() + Duration::from_secs(5);
        while !state.sync() {
            assert!(Instant::now() < deadline, "no prediction published");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_running());
        handle.stop();

        let calls = classifier.calls();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(classifier.calls(), calls);
        assert_eq!(state.latest(), &Prediction::new("cup", 0.81));
    }

    #[test]
    fn loop_ends_when_consumer_is_dropped() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(ScriptedClassifier::new(vec![ScriptStep::top("cup", 0.81)]));
        let state = PredictionState::new();
        let handle = inference(&slot, classifier, &state)
            .spawn(false)
            .expect("spawn loop");
        drop(state);

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_running() {
            assert!(Instant::now() < deadline, "loop kept running");
            thread::sleep(Duration::from_millis(5));
        }
        handle.stop();
    }

    #[test]
    fn signal_returns_while_a_cycle_is_in_flight() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let classifier = Arc::new(
            ScriptedClassifier::new(vec![ScriptStep::top("cup", 0.81)])
                .with_latency(Duration::from_millis(300)),
        );
        let state = PredictionState::new();
        let handle = inference(&slot, classifier.clone(), &state)
            .spawn(false)
            .expect("spawn loop");

        let deadline = Instant::now() + Duration::from_secs(5);
        while classifier.calls() == 0 {
            assert!(Instant::now() < deadline, "classifier never called");
            thread::sleep(Duration::from_millis(2));
        }
        let started = Instant::now();
        handle.signal();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!handle.is_finished());

        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "loop never exited");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.is_running());
        handle.stop();
    }

    struct OverlapCounter {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Classifier for OverlapCounter {
        fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, ClassifyError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Classification::new("cup", 0.5)])
        }
    }

    #[test]
    fn cycles_never_overlap() {
        let slot = LatestFrame::new();
        slot.store(frame());
        let counter = Arc::new(OverlapCounter {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let state = PredictionState::new();
        let handle = inference(&slot, counter.clone(), &state)
            .spawn(false)
            .expect("spawn loop");

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.calls.load(Ordering::SeqCst) < 10 {
            assert!(Instant::now() < deadline, "loop too slow");
            thread::sleep(Duration::from_millis(2));
        }
        handle.stop();
        assert_eq!(counter.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
