//! Two-phase select-then-place interaction.
//!
//! `Scanning` → long-press on an anchored label → `Selected` → tap on a
//! detected plane → object placed, back to `Scanning`. Misses in either phase
//! leave the state untouched.

use bevy_math::Vec3;
use tracing::{debug, info, warn};

use crate::{
    anchors::AnchorSet,
    config::SessionConfig,
    render::{NodeId, ObjectLibrary, ObjectNode, ObjectTemplate, Renderer},
    spatial::{HitTestMode, ScreenPoint, SpatialResolver},
};

#[derive(Clone, Debug, PartialEq, Default)]
pub enum PlacementState {
    #[default]
    Scanning,
    /// An object is instantiated and waiting for a plane tap.
    Selected {
        label: String,
        template: ObjectTemplate,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectOutcome {
    Selected { label: String },
    /// No node under the point.
    Missed,
    /// The nearest node is not an anchored label.
    NotAnchored,
    /// The placeable asset could not be instantiated.
    TemplateUnavailable,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaceOutcome {
    Placed { node: NodeId, position: Vec3 },
    /// Nothing is selected; taps are ignored while scanning.
    NotSelected,
    NoPlaneHit,
}

#[derive(Debug, Default)]
pub struct PlacementStateMachine {
    state: PlacementState,
}

impl PlacementStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn is_awaiting_placement(&self) -> bool {
        matches!(self.state, PlacementState::Selected { .. })
    }

    pub fn pending_label(&self) -> Option<&str> {
        match &self.state {
            PlacementState::Selected { label, .. } => Some(label),
            PlacementState::Scanning => None,
        }
    }

    /// Handle a long-press: hit-test rendered nodes and select the nearest one
    /// if it is an anchored label.
    ///
    /// A successful select while already `Selected` re-targets the pending
    /// object.
    pub fn select<R, L>(
        &mut self,
        point: ScreenPoint,
        renderer: &R,
        anchors: &AnchorSet,
        library: &L,
    ) -> SelectOutcome
    where
        R: Renderer + ?Sized,
        L: ObjectLibrary + ?Sized,
    {
        let Some(hit) = renderer.hit_test_nodes(point).into_iter().next() else {
            debug!("Select at ({}, {}) hit no node", point.x, point.y);
            return SelectOutcome::Missed;
        };
        let Some(anchor) = hit.identity.as_ref().and_then(|id| anchors.resolve(id)) else {
            debug!("Select hit node {:?} which is not an anchored label", hit.node);
            return SelectOutcome::NotAnchored;
        };
        let Some(template) = library.instantiate() else {
            warn!("Placeable object unavailable; staying in scanning mode");
            return SelectOutcome::TemplateUnavailable;
        };

        let label = anchor.label.clone();
        info!(label = %label, asset = %template.asset, "Selected label; scanning paused");
        metrics::counter!("placement_selections_total").increment(1);
        self.state = PlacementState::Selected {
            label: label.clone(),
            template,
        };
        SelectOutcome::Selected { label }
    }

    /// Handle a tap: place the pending object on the detected plane under
    /// `point`, raised by the configured vertical bias.
    pub fn place<S, R>(
        &mut self,
        point: ScreenPoint,
        resolver: &S,
        renderer: &mut R,
        config: &SessionConfig,
    ) -> PlaceOutcome
    where
        S: SpatialResolver + ?Sized,
        R: Renderer + ?Sized,
    {
        if !self.is_awaiting_placement() {
            return PlaceOutcome::NotSelected;
        }
        let Some(hit) = resolver.hit_test(point, HitTestMode::ExistingPlane) else {
            debug!("Tap at ({}, {}) found no plane", point.x, point.y);
            return PlaceOutcome::NoPlaneHit;
        };

        let PlacementState::Selected { label, template } = std::mem::take(&mut self.state) else {
            return PlaceOutcome::NotSelected;
        };
        let position = hit + Vec3::Y * config.placement_bias;
        let node = renderer.add_object_node(ObjectNode {
            template,
            position,
            scale: config.object_scale,
            pivot_offset: config.object_pivot,
        });

        info!(
            label = %label,
            x = position.x,
            y = position.y,
            z = position.z,
            "Placed object; scanning resumed"
        );
        metrics::counter!("objects_placed_total").increment(1);
        PlaceOutcome::Placed { node, position }
    }

    /// Abandon a pending placement. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_awaiting_placement();
        if was_pending {
            debug!("Placement abandoned");
        }
        self.state = PlacementState::Scanning;
        was_pending
    }
}
