//! In-crate doubles for the rendering and tracking collaborators.

use std::cell::RefCell;

use bevy_math::Vec3;

use crate::{
    render::{
        DebugSurface, LabelNode, NodeHit, NodeId, NodeIdentity, ObjectLibrary, ObjectNode,
        ObjectTemplate, Renderer,
    },
    spatial::{
        HitTestMode, ScreenPoint, SpatialResolver, TrackingConfig, TrackingSession, Viewport,
    },
};

#[derive(Default)]
pub(crate) struct FakeTracking {
    pub(crate) feature_hit: Option<Vec3>,
    pub(crate) plane_hit: Option<Vec3>,
    pub(crate) queries: RefCell<Vec<(ScreenPoint, HitTestMode)>>,
    pub(crate) runs: Vec<TrackingConfig>,
    pub(crate) pauses: usize,
}

impl SpatialResolver for FakeTracking {
    fn hit_test(&self, point: ScreenPoint, mode: HitTestMode) -> Option<Vec3> {
        self.queries.borrow_mut().push((point, mode));
        match mode {
            HitTestMode::FeaturePoint => self.feature_hit,
            HitTestMode::ExistingPlane => self.plane_hit,
        }
    }
}

impl TrackingSession for FakeTracking {
    fn run(&mut self, config: TrackingConfig) {
        self.runs.push(config);
    }

    fn pause(&mut self) {
        self.pauses += 1;
    }
}

/// Renderer recording created nodes; node hits are scripted per test.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    pub(crate) labels: Vec<LabelNode>,
    pub(crate) objects: Vec<ObjectNode>,
    pub(crate) hits: Vec<NodeHit>,
    next_id: u64,
}

impl FakeRenderer {
    /// Queue a hit on a label node behind any already queued hits.
    pub(crate) fn push_label_hit(&mut self, label: &str) {
        let distance = 1.0 + self.hits.len() as f32;
        self.hits.push(NodeHit {
            node: NodeId(1_000 + self.hits.len() as u64),
            identity: Some(NodeIdentity::Label(label.to_string())),
            distance,
        });
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }
}

impl Renderer for FakeRenderer {
    fn viewport(&self) -> Viewport {
        Viewport::new(400.0, 800.0)
    }

    fn add_label_node(&mut self, node: LabelNode) -> NodeId {
        self.labels.push(node);
        self.allocate()
    }

    fn add_object_node(&mut self, node: ObjectNode) -> NodeId {
        self.objects.push(node);
        self.allocate()
    }

    fn hit_test_nodes(&self, _point: ScreenPoint) -> Vec<NodeHit> {
        self.hits.clone()
    }
}

pub(crate) struct FixedLibrary(pub(crate) Option<ObjectTemplate>);

impl ObjectLibrary for FixedLibrary {
    fn instantiate(&self) -> Option<ObjectTemplate> {
        self.0.clone()
    }
}

#[derive(Default)]
pub(crate) struct RecordingDebug {
    pub(crate) shown: Vec<String>,
}

impl DebugSurface for RecordingDebug {
    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }
}
