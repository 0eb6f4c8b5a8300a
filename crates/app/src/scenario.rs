//! Scripted world, classifier output and gesture timeline for `simulate`.
//!
//! Scenarios are JSON documents; every field is optional and falls back to
//! the built-in demo scene.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use bevy_math::{Vec2, Vec3};
use ml_core::{Classification, ScriptStep};
use scene::{DEFAULT_OBJECT_ASSET, HorizontalPlane, PinholeCamera};
use serde::{Deserialize, Serialize};
use vision::Viewport;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Render ticks to run.
    pub ticks: u64,
    /// Render tick rate.
    pub fps: f32,
    pub camera: CameraSetup,
    pub capture: CaptureSetup,
    pub classifier: ClassifierSetup,
    pub feature_points: Vec<Vec3>,
    pub planes: Vec<HorizontalPlane>,
    pub asset: String,
    /// Rasterize label textures as nodes are added.
    pub label_textures: bool,
    pub gestures: Vec<ScheduledGesture>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSetup {
    pub position: Vec3,
    pub focal_px: f32,
    pub viewport: Vec2,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSetup {
    pub width: i32,
    pub height: i32,
    pub fps: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSetup {
    /// Simulated model cost per classification.
    pub latency_ms: u64,
    /// Responses replayed in order, cycling.
    pub script: Vec<ScriptEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptEntry {
    Ranked { entries: Vec<RankedEntry> },
    Fail { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGesture {
    /// 1-based tick after which the gesture fires.
    pub at_tick: u64,
    #[serde(flatten)]
    pub gesture: Gesture,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum Gesture {
    /// Screen point defaults to the viewport center.
    LongPress { point: Option<Vec2> },
    Tap { point: Option<Vec2> },
    Cancel,
}

impl Default for Scenario {
    fn default() -> Self {
        let camera = CameraSetup::default();
        let center = camera.viewport / 2.0;
        Self {
            ticks: 180,
            fps: 60.0,
            capture: CaptureSetup::default(),
            classifier: ClassifierSetup::default(),
            feature_points: vec![
                Vec3::new(0.0, 1.5, -1.0),
                Vec3::new(0.4, 1.2, -1.6),
                Vec3::new(-0.5, 0.9, -2.0),
            ],
            planes: vec![HorizontalPlane::new(
                Vec3::new(0.0, 0.0, -2.0),
                Vec2::new(4.0, 4.0),
            )],
            asset: DEFAULT_OBJECT_ASSET.to_string(),
            label_textures: true,
            gestures: vec![
                ScheduledGesture {
                    at_tick: 90,
                    gesture: Gesture::LongPress { point: None },
                },
                ScheduledGesture {
                    at_tick: 120,
                    gesture: Gesture::Tap {
                        point: Some(Vec2::new(center.x, camera.viewport.y * 0.9)),
                    },
                },
            ],
            camera,
        }
    }
}

impl Default for CameraSetup {
    fn default() -> Self {
        let camera = PinholeCamera::default();
        let viewport = camera.viewport();
        Self {
            position: camera.position(),
            focal_px: camera.focal_px(),
            viewport: Vec2::new(viewport.width, viewport.height),
        }
    }
}

impl Default for CaptureSetup {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            fps: 30.0,
        }
    }
}

impl Default for ClassifierSetup {
    fn default() -> Self {
        let ranked = |entries: &[(&str, f32)]| ScriptEntry::Ranked {
            entries: entries
                .iter()
                .map(|&(label, confidence)| RankedEntry {
                    label: label.to_string(),
                    confidence,
                })
                .collect(),
        };
        Self {
            latency_ms: 40,
            script: vec![
                ranked(&[("coffee mug, cup", 0.81), ("espresso", 0.07)]),
                ranked(&[("coffee mug, cup", 0.86), ("teapot", 0.05)]),
                ranked(&[("table lamp", 0.42), ("lampshade", 0.31)]),
                ScriptEntry::Fail {
                    reason: "simulated model hiccup".to_string(),
                },
                ranked(&[("lint", 0.04)]),
            ],
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticks == 0 {
            bail!("scenario must run at least one tick");
        }
        if frame_interval(self.fps).is_none() {
            bail!("scenario fps must be a positive rate, got {}", self.fps);
        }
        if self.capture.width <= 0 || self.capture.height <= 0 {
            bail!(
                "capture size must be positive, got {}x{}",
                self.capture.width,
                self.capture.height
            );
        }
        if frame_interval(self.capture.fps).is_none() {
            bail!("capture fps must be a positive rate, got {}", self.capture.fps);
        }
        if !positive(self.camera.focal_px) {
            bail!("camera focal length must be positive");
        }
        if !positive(self.camera.viewport.x) || !positive(self.camera.viewport.y) {
            bail!("camera viewport must be positive");
        }
        Ok(())
    }

    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::new(
            self.camera.position,
            self.camera.focal_px,
            Viewport::new(self.camera.viewport.x, self.camera.viewport.y),
        )
    }

    pub fn script(&self) -> Vec<ScriptStep> {
        self.classifier
            .script
            .iter()
            .map(|entry| match entry {
                ScriptEntry::Ranked { entries } => ScriptStep::Ranked(
                    entries
                        .iter()
                        .map(|entry| Classification::new(entry.label.clone(), entry.confidence))
                        .collect(),
                ),
                ScriptEntry::Fail { reason } => ScriptStep::Fail(reason.clone()),
            })
            .collect()
    }

    /// Gestures ordered by the tick they fire on.
    pub fn timeline(&self) -> Vec<ScheduledGesture> {
        let mut gestures = self.gestures.clone();
        gestures.sort_by_key(|scheduled| scheduled.at_tick);
        gestures
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Time between frames at `fps`, or `None` when the rate has no finite,
/// non-zero interval.
pub fn frame_interval(fps: f32) -> Option<Duration> {
    if !positive(fps) {
        return None;
    }
    Duration::try_from_secs_f32(1.0 / fps)
        .ok()
        .filter(|interval| !interval.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_is_valid() {
        let scenario = Scenario::default();
        scenario.validate().expect("valid");
        assert_eq!(scenario.script().len(), 5);
        assert!(scenario.timeline().windows(2).all(|w| w[0].at_tick <= w[1].at_tick));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "ticks": 10,
                "classifier": {
                    "script": [
                        { "kind": "ranked", "entries": [{ "label": "cup", "confidence": 0.9 }] },
                        { "kind": "fail", "reason": "boom" }
                    ]
                },
                "gestures": [
                    { "at_tick": 8, "gesture": "tap", "point": [10.0, 20.0] },
                    { "at_tick": 3, "gesture": "long_press", "point": null },
                    { "at_tick": 9, "gesture": "cancel" }
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(scenario.ticks, 10);
        assert_eq!(scenario.fps, 60.0);
        assert_eq!(scenario.classifier.latency_ms, 40);
        assert_eq!(
            scenario.script(),
            [
                ScriptStep::top("cup", 0.9),
                ScriptStep::Fail("boom".to_string())
            ]
        );
        let timeline = scenario.timeline();
        assert_eq!(timeline[0].gesture, Gesture::LongPress { point: None });
        assert_eq!(
            timeline[1].gesture,
            Gesture::Tap {
                point: Some(Vec2::new(10.0, 20.0))
            }
        );
        assert_eq!(timeline[2].gesture, Gesture::Cancel);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<Scenario>(r#"{ "tickz": 3 }"#).is_err());
    }

    #[test]
    fn zero_ticks_is_invalid() {
        let scenario = Scenario {
            ticks: 0,
            ..Scenario::default()
        };
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn rates_without_a_frame_interval_are_invalid() {
        for fps in [0.0, -1.0, 1e-39, f32::NAN, f32::INFINITY] {
            let scenario = Scenario {
                fps,
                ..Scenario::default()
            };
            assert!(scenario.validate().is_err(), "fps {fps}");

            let mut scenario = Scenario::default();
            scenario.capture.fps = fps;
            assert!(scenario.validate().is_err(), "capture fps {fps}");
        }
        let interval = frame_interval(50.0).expect("50 fps");
        assert!(interval.abs_diff(Duration::from_millis(20)) < Duration::from_micros(1));
    }

    #[test]
    fn non_finite_camera_geometry_is_invalid() {
        let mut scenario = Scenario::default();
        scenario.camera.viewport = Vec2::new(f32::NAN, 800.0);
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.camera.focal_px = f32::INFINITY;
        assert!(scenario.validate().is_err());
    }
}
