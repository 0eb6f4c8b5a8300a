//! Scene-graph seams: node creation, node hit-testing, assets, debug text.

use bevy_math::{Vec2, Vec3};
use serde::Serialize;

use crate::spatial::{ScreenPoint, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

/// Identity key attached to a rendered node for later hit-test lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum NodeIdentity {
    /// Billboard for an anchored label; the key is the canonical label.
    Label(String),
    /// A placed object; the key is its asset name.
    Object(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Rotation axes a billboard may turn around to face the viewer.
pub enum BillboardAxes {
    /// Single free axis: the vertical one.
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Texture layout of a label billboard.
pub struct LabelStyle {
    pub texture_px: u32,
    pub corner_radius_px: u32,
    pub font_px: u32,
    pub background: [u8; 4],
    pub foreground: [u8; 4],
    pub double_sided: bool,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            texture_px: 200,
            corner_radius_px: 10,
            font_px: 20,
            background: [0, 0, 0, 255],
            foreground: [255, 255, 255, 255],
            double_sided: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Camera-facing textured plane showing `text` at `position`.
pub struct LabelNode {
    pub text: String,
    pub position: Vec3,
    pub identity: NodeIdentity,
    pub size: Vec2,
    pub billboard: BillboardAxes,
    pub style: LabelStyle,
}

impl LabelNode {
    pub fn new(label: impl Into<String>, position: Vec3, size: Vec2) -> Self {
        let text = label.into();
        Self {
            identity: NodeIdentity::Label(text.clone()),
            text,
            position,
            size,
            billboard: BillboardAxes::Y,
            style: LabelStyle::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
/// Opaque handle to an instantiated placeable object.
pub struct ObjectTemplate {
    pub asset: String,
}

impl ObjectTemplate {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectNode {
    pub template: ObjectTemplate,
    pub position: Vec3,
    pub scale: f32,
    pub pivot_offset: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
/// Node under a screen point, as reported by [`Renderer::hit_test_nodes`].
pub struct NodeHit {
    pub node: NodeId,
    pub identity: Option<NodeIdentity>,
    pub distance: f32,
}

/// Rendering collaborator owning the scene graph.
pub trait Renderer {
    fn viewport(&self) -> Viewport;

    fn add_label_node(&mut self, node: LabelNode) -> NodeId;

    fn add_object_node(&mut self, node: ObjectNode) -> NodeId;

    /// Nodes under `point`, nearest first.
    fn hit_test_nodes(&self, point: ScreenPoint) -> Vec<NodeHit>;
}

/// Source of the placeable object. `None` means the asset is unavailable.
pub trait ObjectLibrary {
    fn instantiate(&self) -> Option<ObjectTemplate>;
}

/// On-screen debug text.
pub trait DebugSurface {
    fn show(&mut self, text: &str);
}
