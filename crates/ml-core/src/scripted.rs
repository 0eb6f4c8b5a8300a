use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use anyhow::anyhow;
use video_ingest::Frame;

use crate::classifier::{Classification, ClassifyError, Classifier};

/// One scripted classifier response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Ranked(Vec<Classification>),
    Fail(String),
}

impl ScriptStep {
    /// Ranked response with a single entry.
    pub fn top(label: impl Into<String>, confidence: f32) -> Self {
        ScriptStep::Ranked(vec![Classification::new(label, confidence)])
    }
}

/// Deterministic classifier replaying a cyclic script of responses.
///
/// Each call advances the script by one step regardless of the frame
/// contents. An empty script always returns an empty ranking.
pub struct ScriptedClassifier {
    steps: Vec<ScriptStep>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `latency` inside every call, emulating model cost.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `classify` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, ClassifyError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.steps.is_empty() {
            return Ok(Vec::new());
        }
        match &self.steps[index % self.steps.len()] {
            ScriptStep::Ranked(ranked) => Ok(ranked.clone()),
            ScriptStep::Fail(reason) => Err(ClassifyError::Inference(anyhow!(reason.clone()))),
        }
    }
}
