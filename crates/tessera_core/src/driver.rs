//! One frame of work: revalidate, collect damage, draw

use tessera_paint::{Matrix, Rect, Renderer};

use crate::damage::DamageAccumulator;
use crate::graph::RenderGraph;
use crate::refs::NodeId;

/// What a frame changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Root bounds after revalidation
    pub bounds: Rect,
    /// Disjoint damaged rectangles in root space
    pub damage: Vec<Rect>,
    /// Bounding box of `damage`
    pub damage_bounds: Rect,
}

impl FrameReport {
    pub fn has_damage(&self) -> bool {
        !self.damage.is_empty()
    }
}

/// Revalidate `root` with a fresh accumulator, then render it
///
/// All invalidation for the frame must have happened before this call.
pub fn render_frame(graph: &mut RenderGraph, root: NodeId, renderer: &mut dyn Renderer) -> FrameReport {
    let mut acc = DamageAccumulator::new();
    let bounds = graph.revalidate(root, Some(&mut acc), &Matrix::IDENTITY);
    let damage = acc.merged();
    let damage_bounds = acc.bounds();
    tracing::debug!(
        "frame: {} raw damage rects merged into {}, bounds {:?}",
        acc.len(),
        damage.len(),
        damage_bounds
    );

    graph.render(root, renderer);
    FrameReport {
        bounds,
        damage,
        damage_bounds,
    }
}
