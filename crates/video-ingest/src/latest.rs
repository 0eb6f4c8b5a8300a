use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error};

use crate::types::{CaptureError, Frame, FrameSource};

const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Single-slot frame buffer, overwritten every time capture advances.
///
/// Cloning shares the slot. Readers get the newest frame only; there is no
/// history.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Arc<Frame>>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame.
    pub fn store(&self, frame: Frame) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(Arc::new(frame));
        }
    }

    /// Forget the current frame, as if tracking had not started.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}

impl FrameSource for LatestFrame {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Spawns a thread that drains capture output into `slot`.
///
/// The pump exits when `running` is cleared, when the capture channel closes,
/// or after the first capture error.
pub fn spawn_frame_pump(
    rx: Receiver<Result<Frame, CaptureError>>,
    slot: LatestFrame,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("frame-pump".into())
        .spawn(move || {
            let mut frames: u64 = 0;
            while running.load(Ordering::Relaxed) {
                match rx.recv_timeout(PUMP_POLL_INTERVAL) {
                    Ok(Ok(frame)) => {
                        frames = frames.wrapping_add(1);
                        slot.store(frame);
                    }
                    Ok(Err(err)) => {
                        error!("Capture error: {err}");
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Frame pump stopped after {frames} frame(s)");
        })
}
