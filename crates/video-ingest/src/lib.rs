//! Frame acquisition for the scene labeler.
//!
//! Capture threads push frames into a [`LatestFrame`] slot; the inference loop
//! pulls whatever is newest through the [`FrameSource`] trait.

mod latest;
mod synthetic;
mod types;

pub use latest::{LatestFrame, spawn_frame_pump};
pub use synthetic::spawn_synthetic_reader;
pub use types::{CaptureError, Frame, FrameFormat, FrameSource};
