//! Handoff of the latest classification from the inference context to the
//! render context.
//!
//! The inference side only ever writes complete [`PredictionUpdate`]s into a
//! single-value slot, replacing whatever the render side has not consumed yet.
//! [`PredictionState`] lives in the render context and takes the pending
//! update in one assignment, so a reader never sees a label paired with
//! another cycle's confidence. The slot lock is held only for the swap.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ml_core::Prediction;

#[derive(Clone, Debug, PartialEq)]
/// Everything one inference cycle publishes.
pub struct PredictionUpdate {
    pub prediction: Prediction,
    /// Ranked classifier output rendered for the debug surface.
    pub ranked: String,
}

type PendingSlot = Mutex<Option<PredictionUpdate>>;

fn lock(slot: &PendingSlot) -> MutexGuard<'_, Option<PredictionUpdate>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
/// Write half, handed to the inference loop.
pub struct PredictionPublisher {
    pending: Weak<PendingSlot>,
}

impl PredictionPublisher {
    /// Replace the pending update. Returns `false` once the render side has
    /// gone away.
    pub fn publish(&self, update: PredictionUpdate) -> bool {
        let Some(pending) = self.pending.upgrade() else {
            return false;
        };
        if lock(&pending).replace(update).is_some() {
            metrics::counter!("prediction_updates_superseded_total").increment(1);
        }
        true
    }
}

/// Latest prediction as seen by the render context.
pub struct PredictionState {
    latest: Prediction,
    ranked: Option<String>,
    pending: Arc<PendingSlot>,
}

impl PredictionState {
    pub fn new() -> Self {
        Self {
            latest: Prediction::unknown(),
            ranked: None,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn publisher(&self) -> PredictionPublisher {
        PredictionPublisher {
            pending: Arc::downgrade(&self.pending),
        }
    }

    /// Apply the pending update, if any.
    ///
    /// Returns `true` when the state changed.
    pub fn sync(&mut self) -> bool {
        let Some(update) = lock(&self.pending).take() else {
            return false;
        };
        self.latest = update.prediction;
        self.ranked = Some(update.ranked);
        true
    }

    pub fn latest(&self) -> &Prediction {
        &self.latest
    }

    /// Ranked text from the most recent update, if any arrived yet.
    pub fn ranked_text(&self) -> Option<&str> {
        self.ranked.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

impl Default for PredictionState {
    fn default() -> Self {
        Self::new()
    }
}
