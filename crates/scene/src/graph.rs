//! In-memory scene graph with screen-space node hit-testing.

use std::collections::HashMap;

use bevy_math::{Vec2, Vec3};
use image::RgbaImage;
use tracing::debug;
use vision::{
    LabelNode, NodeHit, NodeId, NodeIdentity, ObjectNode, Renderer, ScreenPoint, Viewport,
};

use crate::{camera::PinholeCamera, label_texture::rasterize_label};

/// Edge length of an unscaled object's bounding square, in meters.
pub const OBJECT_FOOTPRINT_M: f32 = 0.4;

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNodeKind {
    Label(LabelNode),
    Object(ObjectNode),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub identity: NodeIdentity,
    pub kind: SceneNodeKind,
}

impl SceneNode {
    /// World-space center of what the node draws.
    ///
    /// An object's pivot is the local point that sits at its position, so the
    /// geometry is shifted by the negated, scaled pivot.
    pub fn visual_center(&self) -> Vec3 {
        match &self.kind {
            SceneNodeKind::Label(label) => label.position,
            SceneNodeKind::Object(object) => object.position - object.pivot_offset * object.scale,
        }
    }

    /// Half width and half height of the camera-facing footprint, in meters.
    fn half_extent(&self) -> Vec2 {
        match &self.kind {
            SceneNodeKind::Label(label) => label.size / 2.0,
            SceneNodeKind::Object(object) => Vec2::splat(OBJECT_FOOTPRINT_M * object.scale / 2.0),
        }
    }
}

pub struct SceneGraph {
    camera: PinholeCamera,
    nodes: Vec<SceneNode>,
    next_id: u64,
    textures: Option<HashMap<NodeId, RgbaImage>>,
}

impl SceneGraph {
    pub fn new(camera: PinholeCamera) -> Self {
        Self {
            camera,
            nodes: Vec::new(),
            next_id: 0,
            textures: None,
        }
    }

    /// Rasterize every label added from now on into a billboard texture.
    pub fn with_label_textures(mut self) -> Self {
        self.textures = Some(HashMap::new());
        self
    }

    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn labels(&self) -> impl Iterator<Item = &LabelNode> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            SceneNodeKind::Label(label) => Some(label),
            SceneNodeKind::Object(_) => None,
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectNode> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            SceneNodeKind::Object(object) => Some(object),
            SceneNodeKind::Label(_) => None,
        })
    }

    pub fn label_texture(&self, id: NodeId) -> Option<&RgbaImage> {
        self.textures.as_ref()?.get(&id)
    }

    fn insert(&mut self, identity: NodeIdentity, kind: SceneNodeKind) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.push(SceneNode { id, identity, kind });
        id
    }
}

impl Renderer for SceneGraph {
    fn viewport(&self) -> Viewport {
        self.camera.viewport()
    }

    fn add_label_node(&mut self, node: LabelNode) -> NodeId {
        let texture = self
            .textures
            .is_some()
            .then(|| rasterize_label(&node.text, &node.style));
        let identity = node.identity.clone();
        let id = self.insert(identity, SceneNodeKind::Label(node));
        if let (Some(textures), Some(texture)) = (self.textures.as_mut(), texture) {
            textures.insert(id, texture);
        }
        debug!(node = id.0, "Label node added");
        id
    }

    fn add_object_node(&mut self, node: ObjectNode) -> NodeId {
        let identity = NodeIdentity::Object(node.template.asset.clone());
        let id = self.insert(identity, SceneNodeKind::Object(node));
        debug!(node = id.0, "Object node added");
        id
    }

    fn hit_test_nodes(&self, point: ScreenPoint) -> Vec<NodeHit> {
        let mut hits: Vec<NodeHit> = self
            .nodes
            .iter()
            .filter_map(|node| {
                let center = node.visual_center();
                let (projected, depth) = self.camera.project(center)?;
                let half = node.half_extent();
                let reach_x = self.camera.scale_at(half.x, depth);
                let reach_y = self.camera.scale_at(half.y, depth);
                let offset = (point - projected).abs();
                (offset.x <= reach_x && offset.y <= reach_y).then(|| NodeHit {
                    node: node.id,
                    identity: Some(node.identity.clone()),
                    distance: center.distance(self.camera.position()),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
