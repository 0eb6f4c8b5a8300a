//! Per-frame annotation: turn a confident, unseen label into a world anchor.

use bevy_math::Vec3;
use ml_core::Prediction;
use tracing::info;

use crate::{
    anchors::AnchorSet,
    config::SessionConfig,
    placement::PlacementStateMachine,
    render::{LabelNode, NodeId, Renderer},
    spatial::{HitTestMode, SpatialResolver},
};

#[derive(Clone, Debug, PartialEq)]
/// Why a tick did or did not create an anchor.
pub enum TickOutcome {
    /// A placement is pending; scanning is frozen.
    Suspended,
    BelowThreshold,
    /// No feature point under the screen center.
    NoHit,
    AlreadyAnchored,
    Anchored {
        label: String,
        position: Vec3,
        node: NodeId,
    },
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Suspended => "suspended",
            TickOutcome::BelowThreshold => "below_threshold",
            TickOutcome::NoHit => "no_hit",
            TickOutcome::AlreadyAnchored => "already_anchored",
            TickOutcome::Anchored { .. } => "anchored",
        }
    }
}

/// Run one annotation tick against the latest prediction.
///
/// Each step gates the next: placement freeze, confidence threshold,
/// feature-point hit under the screen center, label uniqueness.
pub fn annotate<S, R>(
    prediction: &Prediction,
    placement: &PlacementStateMachine,
    anchors: &mut AnchorSet,
    resolver: &S,
    renderer: &mut R,
    config: &SessionConfig,
) -> TickOutcome
where
    S: SpatialResolver + ?Sized,
    R: Renderer + ?Sized,
{
    if placement.is_awaiting_placement() {
        return TickOutcome::Suspended;
    }
    if prediction.confidence.is_nan() || prediction.confidence < config.minimum_confidence {
        return TickOutcome::BelowThreshold;
    }

    let center = renderer.viewport().center();
    let Some(position) = resolver.hit_test(center, HitTestMode::FeaturePoint) else {
        return TickOutcome::NoHit;
    };

    let Some(anchor) = anchors.insert(&prediction.label, position) else {
        return TickOutcome::AlreadyAnchored;
    };
    let label = anchor.label.clone();
    let node = renderer.add_label_node(LabelNode::new(label.clone(), position, config.label_size));

    info!(
        label = %label,
        confidence = prediction.confidence,
        x = position.x,
        y = position.y,
        z = position.z,
        "Anchored new label"
    );
    metrics::counter!("anchors_created_total").increment(1);
    metrics::gauge!("anchors_total").set(anchors.len() as f64);

    TickOutcome::Anchored {
        label,
        position,
        node,
    }
}
