//! Stall detection for the inference loop.
//!
//! The loop beats once per completed cycle. A classifier that stops returning
//! only delays new predictions, so the watchdog reports the stall and its
//! recovery; it never cancels the cycle in flight.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{info, warn};

use crate::telemetry;

/// Sleep interval between watchdog health checks.
pub(crate) const WATCHDOG_POLL_INTERVAL_MS: u64 = 250;
/// Time without a completed cycle before inference is reported as stalled.
pub(crate) const INFERENCE_STALL_THRESHOLD_MS: u64 = 2_000;
/// Grace period at startup allowing the model to warm up.
pub(crate) const WATCHDOG_STARTUP_GRACE_MS: u64 = 5_000;

/// Heartbeat shared between the inference loop and its watchdog.
pub struct InferenceHealth {
    last_beat: AtomicU64,
    stalled: AtomicBool,
}

impl InferenceHealth {
    pub fn new() -> Self {
        let grace_deadline = current_millis().saturating_add(WATCHDOG_STARTUP_GRACE_MS);
        Self {
            last_beat: AtomicU64::new(grace_deadline),
            stalled: AtomicBool::new(false),
        }
    }

    /// Register a completed cycle.
    pub fn beat(&self) {
        self.last_beat.store(current_millis(), Ordering::Relaxed);
    }

    /// Milliseconds since the last beat, if that exceeds the stall threshold.
    pub(crate) fn stalled_for(&self, now: u64) -> Option<u64> {
        let elapsed = now.saturating_sub(self.last_beat.load(Ordering::Relaxed));
        (elapsed > INFERENCE_STALL_THRESHOLD_MS).then_some(elapsed)
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }

    /// Evaluate health at `now`, logging transitions into and out of a stall.
    pub(crate) fn check(&self, now: u64) {
        match self.stalled_for(now) {
            Some(elapsed) => {
                if !self.stalled.swap(true, Ordering::Relaxed) {
                    warn!("Inference stalled for {elapsed} ms; predictions are stale");
                    metrics::counter!("inference_stalls_total").increment(1);
                }
            }
            None => {
                if self.stalled.swap(false, Ordering::Relaxed) {
                    info!("Inference recovered");
                }
            }
        }
    }
}

impl Default for InferenceHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the watchdog thread; it exits once `running` is cleared.
pub(crate) fn spawn_watchdog(
    health: Arc<InferenceHealth>,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    telemetry::spawn_thread("inference-watchdog", move || {
        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));
            health.check(current_millis());
        }
    })
}

pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_health_is_within_grace_period() {
        let health = InferenceHealth::new();
        let now = current_millis();
        assert_eq!(health.stalled_for(now), None);
        assert_eq!(
            health.stalled_for(now + WATCHDOG_STARTUP_GRACE_MS + 1),
            None
        );
    }

    #[test]
    fn stall_and_recovery_toggle_the_flag() {
        let health = InferenceHealth::new();
        health.beat();
        let later = current_millis() + INFERENCE_STALL_THRESHOLD_MS + 500;

        health.check(later);
        assert!(health.is_stalled());

        health.beat();
        health.check(current_millis());
        assert!(!health.is_stalled());
    }
}
