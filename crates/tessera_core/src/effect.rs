//! Transform + content composition
//!
//! A [`TransformEffect`] draws its child through a transform node. Its own
//! bounds are the child's outer bounds, in the space the effect's matrix
//! maps from; anything that needs them in the parent's space maps them
//! through the applied matrix.

use smallvec::{smallvec, SmallVec};
use tessera_paint::{Matrix, Point, Rect, Renderer};

use crate::damage::DamageAccumulator;
use crate::graph::RenderGraph;
use crate::node::NodeKind;
use crate::refs::{NodeId, Ref};

#[derive(Debug)]
pub struct TransformEffect {
    transform: Ref,
    child: Ref,
    /// Matrix in effect at the last revalidate
    applied: Matrix,
}

impl TransformEffect {
    pub fn transform(&self) -> NodeId {
        self.transform.id()
    }

    pub fn child(&self) -> NodeId {
        self.child.id()
    }

    pub fn applied(&self) -> Matrix {
        self.applied
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        smallvec![self.transform.id(), self.child.id()]
    }

    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        smallvec![self.transform, self.child]
    }
}

impl RenderGraph {
    /// Draw `child` through the matrix of `transform`
    pub fn create_transform_effect(&mut self, transform: Ref, child: Ref) -> Ref {
        let applied = self.matrix(transform.id());
        self.insert(NodeKind::TransformEffect(TransformEffect {
            transform,
            child,
            applied,
        }))
    }

    fn effect_parts(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match &self.get(id)?.kind {
            NodeKind::TransformEffect(effect) => Some((effect.transform(), effect.child())),
            _ => None,
        }
    }

    pub(crate) fn revalidate_effect(
        &mut self,
        id: NodeId,
        acc: Option<&mut DamageAccumulator>,
        ctm: &Matrix,
    ) -> Rect {
        let Some((transform, child)) = self.effect_parts(id) else {
            return Rect::EMPTY;
        };
        self.revalidate(transform, None, &Matrix::IDENTITY);
        let matrix = self.matrix(transform);
        self.revalidate(child, acc, &ctm.concat(&matrix));
        let bounds = self.outer_bounds(child);

        if let Some(NodeKind::TransformEffect(effect)) = self.get_mut(id).map(|node| &mut node.kind) {
            effect.applied = matrix;
        }
        bounds
    }

    pub(crate) fn render_effect(&self, id: NodeId, renderer: &mut dyn Renderer) {
        let Some((transform, child)) = self.effect_parts(id) else {
            return;
        };
        renderer.save();
        renderer.concat(&self.matrix(transform));
        self.render(child, renderer);
        renderer.restore();
    }

    pub(crate) fn effect_node_at(
        &self,
        id: NodeId,
        point: Point,
        visitor: &mut dyn FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let (transform, child) = self.effect_parts(id)?;
        let local = self.inverse_matrix(transform)?.transform_point(point);
        self.node_at(child, local, visitor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tessera_paint::{Color, Paint, PictureRecorder};

    use super::*;

    fn square(size: f32) -> Arc<dyn tessera_paint::Picture> {
        let mut recorder = PictureRecorder::new();
        recorder.fill_rect(0.0, 0.0, size, size, Paint::fill(Color::RED));
        Arc::new(recorder.finish())
    }

    #[test]
    fn test_bounds_are_untransformed() {
        let mut graph = RenderGraph::new();
        let leaf = graph.create_picture(Some(square(10.0)));
        let m = graph.create_matrix(Matrix::translation(100.0, 0.0));
        let effect = graph.create_transform_effect(m, leaf);

        let bounds = graph.revalidate(effect.id(), None, &Matrix::IDENTITY);
        assert_eq!(bounds, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(graph.outer_bounds(effect.id()), Rect::new(100.0, 0.0, 10.0, 10.0));
        graph.release(effect);
    }

    #[test]
    fn test_moving_the_transform_damages_old_and_new() {
        let mut graph = RenderGraph::new();
        let leaf = graph.create_picture(Some(square(10.0)));
        let m = graph.create_matrix(Matrix::IDENTITY);
        let transform = m.id();
        let effect = graph.create_transform_effect(m, leaf);
        graph.revalidate(effect.id(), None, &Matrix::IDENTITY);

        graph.set_matrix(transform, Matrix::translation(50.0, 0.0)).unwrap();
        assert!(graph.has_damage(effect.id()));

        let mut acc = DamageAccumulator::new();
        graph.revalidate(effect.id(), Some(&mut acc), &Matrix::IDENTITY);
        assert_eq!(
            acc.rects(),
            &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 0.0, 10.0, 10.0)]
        );
        graph.release(effect);
    }

    /// Outer effect at identity around an inner effect at (50, 50)
    fn nested(graph: &mut RenderGraph) -> (Ref, NodeId) {
        let leaf = graph.create_picture(Some(square(10.0)));
        let inner_m = graph.create_matrix(Matrix::translation(50.0, 50.0));
        let inner = graph.create_transform_effect(inner_m, leaf);
        let outer_m = graph.create_matrix(Matrix::IDENTITY);
        let transform = outer_m.id();
        (graph.create_transform_effect(outer_m, inner), transform)
    }

    #[test]
    fn test_nested_effects_report_mapped_bounds() {
        let mut graph = RenderGraph::new();
        let (outer, _) = nested(&mut graph);
        let frame = graph.create_frame(Rect::new(0.0, 0.0, 200.0, 200.0), false);
        graph.add_child(frame.id(), outer).unwrap();

        let bounds = graph.revalidate(frame.id(), None, &Matrix::IDENTITY);
        assert_eq!(bounds, Rect::new(50.0, 50.0, 10.0, 10.0));
        graph.release(frame);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_moving_an_outer_effect_damages_the_moved_pixels() {
        let mut graph = RenderGraph::new();
        let (outer, transform) = nested(&mut graph);
        graph.revalidate(outer.id(), None, &Matrix::IDENTITY);

        graph.set_matrix(transform, Matrix::translation(5.0, 0.0)).unwrap();
        let mut acc = DamageAccumulator::new();
        graph.revalidate(outer.id(), Some(&mut acc), &Matrix::IDENTITY);
        assert_eq!(
            acc.rects(),
            &[Rect::new(50.0, 50.0, 10.0, 10.0), Rect::new(55.0, 50.0, 10.0, 10.0)]
        );
        graph.release(outer);
    }

    #[test]
    fn test_hit_test_maps_through_inverse() {
        let mut graph = RenderGraph::new();
        let leaf = graph.create_picture(Some(square(10.0)));
        let leaf_id = leaf.id();
        let m = graph.create_matrix(Matrix::translation(100.0, 100.0));
        let effect = graph.create_transform_effect(m, leaf);

        let mut accept = |_: NodeId| true;
        assert_eq!(graph.node_at(effect.id(), Point::new(105.0, 105.0), &mut accept), Some(leaf_id));
        assert_eq!(graph.node_at(effect.id(), Point::new(5.0, 5.0), &mut accept), None);
        graph.release(effect);
    }

    #[test]
    fn test_singular_transform_is_unhittable() {
        let mut graph = RenderGraph::new();
        let leaf = graph.create_picture(Some(square(10.0)));
        let m = graph.create_matrix(Matrix::scale(0.0, 1.0));
        let effect = graph.create_transform_effect(m, leaf);

        let mut accept = |_: NodeId| true;
        assert_eq!(graph.node_at(effect.id(), Point::ZERO, &mut accept), None);
        graph.release(effect);
    }
}
