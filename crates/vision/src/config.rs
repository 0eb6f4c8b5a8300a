//! Tuning constants for annotation and placement, plus telemetry knobs.
//!
//! The constants are fixed for the current scope; [`SessionConfig::default`]
//! is the only constructor callers are expected to use outside of tests.

use std::path::PathBuf;

use bevy_math::{Vec2, Vec3};

/// Minimum top-1 confidence before a label may be anchored.
pub const MINIMUM_CONFIDENCE_THRESHOLD: f32 = 0.75;
/// Confidence above which the raw ranked text is shown on the debug surface.
pub const DEBUG_CONFIDENCE_THRESHOLD: f32 = 0.10;
/// World-space size of a billboarded label plane.
pub const LABEL_PLANE_SIZE: Vec2 = Vec2::new(0.1, 0.1);
/// Upward offset applied to a placed object so it does not z-fight the plane.
pub const PLACEMENT_VERTICAL_BIAS: f32 = 0.2;
/// Uniform scale of the placed object.
pub const OBJECT_SCALE: f32 = 0.5;
/// Pivot translation of the placed object.
pub const OBJECT_PIVOT_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -1.0);
/// Ranked entries rendered on the debug surface.
pub const DEBUG_RANKED_ENTRIES: usize = 2;
/// Debug surface text while confidence is below the debug threshold.
pub const DEBUG_PLACEHOLDER: &str = "null";

#[derive(Clone, Debug)]
/// Settings shared by the annotation tick, placement, and debug surface.
pub struct SessionConfig {
    pub minimum_confidence: f32,
    pub debug_confidence: f32,
    pub label_size: Vec2,
    pub placement_bias: f32,
    pub object_scale: f32,
    pub object_pivot: Vec3,
    pub debug_ranked_entries: usize,
    pub debug_placeholder: String,
    /// Run the inference stall watchdog alongside the loop.
    pub watchdog: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            minimum_confidence: MINIMUM_CONFIDENCE_THRESHOLD,
            debug_confidence: DEBUG_CONFIDENCE_THRESHOLD,
            label_size: LABEL_PLANE_SIZE,
            placement_bias: PLACEMENT_VERTICAL_BIAS,
            object_scale: OBJECT_SCALE,
            object_pivot: OBJECT_PIVOT_OFFSET,
            debug_ranked_entries: DEBUG_RANKED_ENTRIES,
            debug_placeholder: DEBUG_PLACEHOLDER.to_string(),
            watchdog: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing output.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing inference and tick spans.
    pub chrome_trace_path: Option<PathBuf>,
    /// Emit log lines as JSON instead of text.
    pub json_logs: bool,
}
