use std::{fmt, sync::Arc};

use thiserror::Error;

/// Raw frame captured from the tracking camera.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

impl Frame {
    /// Number of bytes a buffer of this geometry and format must hold.
    pub fn expected_len(&self) -> usize {
        let width = self.width.max(0) as usize;
        let height = self.height.max(0) as usize;
        width * height * self.format.bytes_per_pixel()
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
    Rgba8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Bgr8 => 3,
            FrameFormat::Rgba8 => 4,
        }
    }
}

/// Supplies the most recent camera frame.
///
/// `None` means tracking has not produced a frame yet; callers treat it as a
/// reason to skip work, not as an error.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<Arc<Frame>>;
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid capture geometry {width}x{height}")]
    Geometry { width: i32, height: i32 },
    #[error("invalid capture rate {fps} fps")]
    Rate { fps: f32 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
