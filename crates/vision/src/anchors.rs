//! Append-only set of world-anchored labels, at most one per label.

use std::collections::HashMap;

use bevy_math::Vec3;
use serde::Serialize;

use crate::render::NodeIdentity;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anchor {
    pub label: String,
    pub position: Vec3,
}

#[derive(Debug, Default)]
pub struct AnchorSet {
    index: HashMap<String, usize>,
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Insert a new anchor. A label that is already present is left untouched
    /// and `None` is returned.
    pub fn insert(&mut self, label: &str, position: Vec3) -> Option<&Anchor> {
        if self.contains(label) {
            return None;
        }
        let slot = self.anchors.len();
        self.anchors.push(Anchor {
            label: label.to_string(),
            position,
        });
        self.index.insert(label.to_string(), slot);
        self.anchors.last()
    }

    pub fn lookup(&self, label: &str) -> Option<Vec3> {
        self.get(label).map(|anchor| anchor.position)
    }

    pub fn get(&self, label: &str) -> Option<&Anchor> {
        self.index.get(label).map(|&slot| &self.anchors[slot])
    }

    /// Anchor behind a rendered node's identity key, if it is an anchored label.
    pub fn resolve(&self, identity: &NodeIdentity) -> Option<&Anchor> {
        match identity {
            NodeIdentity::Label(label) => self.get(label),
            NodeIdentity::Object(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Anchors in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }
}
