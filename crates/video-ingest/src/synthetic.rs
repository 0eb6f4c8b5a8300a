use std::{thread, time::Duration};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::debug;

use crate::types::{CaptureError, Frame, FrameFormat};

/// Spawns a background thread producing BGR gradient frames at `fps`.
/// A non-positive `fps` produces frames as fast as they are consumed.
///
/// Frames are delivered over a small bounded channel so the generator blocks
/// when downstream consumers fall behind. The thread exits once the receiver
/// is dropped.
pub fn spawn_synthetic_reader(
    target_size: (i32, i32),
    fps: f32,
) -> Result<Receiver<Result<Frame, CaptureError>>, CaptureError> {
    let (width, height) = target_size;
    if width <= 0 || height <= 0 {
        return Err(CaptureError::Geometry { width, height });
    }
    let interval = if fps.is_nan() {
        return Err(CaptureError::Rate { fps });
    } else if fps > 0.0 {
        Duration::try_from_secs_f32(1.0 / fps).map_err(|_| CaptureError::Rate { fps })?
    } else {
        Duration::ZERO
    };

    let (tx, rx) = bounded(2);
    thread::Builder::new()
        .name("synthetic-camera".into())
        .spawn(move || synthetic_loop(width, height, interval, tx))
        .map_err(|err| CaptureError::Other(err.into()))?;

    Ok(rx)
}

fn synthetic_loop(
    width: i32,
    height: i32,
    interval: Duration,
    tx: Sender<Result<Frame, CaptureError>>,
) {
    let mut phase: u8 = 0;
    loop {
        let frame = gradient_frame(width, height, phase);
        if tx.send(Ok(frame)).is_err() {
            break;
        }
        phase = phase.wrapping_add(1);
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    debug!("Synthetic camera stopped");
}

fn gradient_frame(width: i32, height: i32, phase: u8) -> Frame {
    let (w, h) = (width as usize, height as usize);
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            let blue = ((x * 255) / w.max(1)) as u8;
            let green = ((y * 255) / h.max(1)) as u8;
            data.extend_from_slice(&[blue, green, phase]);
        }
    }
    Frame {
        data,
        width,
        height,
        timestamp_ms: Utc::now().timestamp_millis(),
        format: FrameFormat::Bgr8,
    }
}
