//! Ownership handles for graph nodes
//!
//! Nodes live in a generational arena owned by
//! [`RenderGraph`](crate::graph::RenderGraph). Every edge in the graph is one
//! of two kinds:
//!
//! - **Owning**: a [`Ref`] held by the parent. It keeps the child alive by
//!   contributing to its strong count.
//! - **Observing**: a [`WeakRef`] back-reference from child to parent so that
//!   invalidation can flow upwards. It never keeps anything alive.
//!
//! A `Ref` is intentionally neither `Clone` nor `Copy`: duplicating one goes
//! through [`RenderGraph::clone_ref`](crate::graph::RenderGraph::clone_ref) and
//! giving one up goes through
//! [`RenderGraph::release`](crate::graph::RenderGraph::release), so strong
//! counts always match the handles in existence. Generational keys mean a
//! `WeakRef` to a destroyed node can never resolve to a newer node that reused
//! the slot.

use slotmap::new_key_type;

new_key_type! {
    /// Stable identity of a node in the render graph
    pub struct NodeId;
}

/// Strong, owning handle to a node
#[must_use = "strong references must be handed back with RenderGraph::release"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Ref(NodeId);

impl Ref {
    pub(crate) fn new(id: NodeId) -> Self {
        Self(id)
    }

    pub fn id(&self) -> NodeId {
        self.0
    }

    pub(crate) fn into_id(self) -> NodeId {
        self.0
    }
}

/// Non-owning handle to a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeakRef(NodeId);

impl WeakRef {
    pub fn new(id: NodeId) -> Self {
        Self(id)
    }

    pub fn id(&self) -> NodeId {
        self.0
    }
}

impl From<&Ref> for WeakRef {
    fn from(strong: &Ref) -> Self {
        Self(strong.0)
    }
}
