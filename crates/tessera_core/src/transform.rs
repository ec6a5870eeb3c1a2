//! Plain matrix and composed transform nodes
//!
//! Transform nodes have no bounds of their own. They carry
//! [`NodeTraits::BUBBLE_DAMAGE`](crate::node::NodeTraits::BUBBLE_DAMAGE), so a
//! change is forwarded to whichever render node consumes the matrix.

use smallvec::{smallvec, SmallVec};
use tessera_paint::Matrix;

use crate::error::Result;
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind};
use crate::refs::{NodeId, Ref};

/// A settable matrix
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MatrixTransform {
    matrix: Matrix,
}

impl MatrixTransform {
    pub fn new(matrix: Matrix) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> Matrix {
        self.matrix
    }
}

/// Composition of two transforms: `a` is applied first, then `b`
#[derive(Debug)]
pub struct Concat {
    a: Ref,
    b: Ref,
}

impl Concat {
    pub fn a(&self) -> NodeId {
        self.a.id()
    }

    pub fn b(&self) -> NodeId {
        self.b.id()
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        smallvec![self.a.id(), self.b.id()]
    }

    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        smallvec![self.a, self.b]
    }
}

impl RenderGraph {
    pub fn create_matrix(&mut self, matrix: Matrix) -> Ref {
        self.insert(NodeKind::Matrix(MatrixTransform::new(matrix)))
    }

    /// Compose two transform nodes; the new node owns and observes both
    pub fn create_concat(&mut self, a: Ref, b: Ref) -> Ref {
        self.insert(NodeKind::Concat(Concat { a, b }))
    }

    /// Current matrix of a transform node
    ///
    /// Concat matrices are composed on demand. Non-transform and dead nodes
    /// yield the identity.
    pub fn matrix(&self, id: NodeId) -> Matrix {
        let Some(node) = self.get(id) else {
            return Matrix::IDENTITY;
        };
        match &node.kind {
            NodeKind::Matrix(transform) => transform.matrix(),
            NodeKind::Viewport(viewport) => viewport.matrix(),
            NodeKind::Zoomer(zoomer) => zoomer.matrix(),
            NodeKind::Concat(concat) => self.matrix(concat.b()).concat(&self.matrix(concat.a())),
            _ => Matrix::IDENTITY,
        }
    }

    pub fn inverse_matrix(&self, id: NodeId) -> Option<Matrix> {
        self.matrix(id).invert()
    }

    /// Replace the matrix of a [`MatrixTransform`] node
    ///
    /// Returns whether the value changed; only a change invalidates.
    pub fn set_matrix(&mut self, id: NodeId, matrix: Matrix) -> Result<bool> {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Matrix(transform) => {
                let changed = transform.matrix != matrix;
                transform.matrix = matrix;
                changed
            }
            other => return Err(Self::mismatch(KindTag::Matrix, other.tag())),
        };
        if changed {
            self.invalidate(id, true);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_paint::Point;

    #[test]
    fn test_concat_applies_a_first() {
        let mut graph = RenderGraph::new();
        let scale = graph.create_matrix(Matrix::scale(2.0, 2.0));
        let shift = graph.create_matrix(Matrix::translation(10.0, 0.0));
        let both = graph.create_concat(scale, shift);

        let p = graph.matrix(both.id()).transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
        graph.release(both);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_set_matrix_invalidates_only_on_change() {
        let mut graph = RenderGraph::new();
        let m = graph.create_matrix(Matrix::IDENTITY);
        graph.revalidate(m.id(), None, &Matrix::IDENTITY);

        assert_eq!(graph.set_matrix(m.id(), Matrix::IDENTITY), Ok(false));
        assert!(!graph.is_invalid(m.id()));
        assert_eq!(graph.set_matrix(m.id(), Matrix::scale(3.0, 3.0)), Ok(true));
        assert!(graph.is_invalid(m.id()));
        graph.release(m);
    }

    #[test]
    fn test_set_matrix_on_wrong_kind_fails() {
        let mut graph = RenderGraph::new();
        let scene = graph.create_scene();
        assert!(matches!(
            graph.set_matrix(scene.id(), Matrix::IDENTITY),
            Err(crate::GraphError::KindMismatch { expected: "matrix", .. })
        ));
        graph.release(scene);
    }
}
