//! The render graph arena and its invalidation protocol
//!
//! # Push phase
//!
//! [`RenderGraph::invalidate`] marks a node and, transitively, everything that
//! observes it. A damage request travels upwards through nodes carrying
//! [`NodeTraits::BUBBLE_DAMAGE`] and is absorbed by the first node that does
//! not; that node owns the on-screen consequences of the change.
//!
//! # Pull phase
//!
//! [`RenderGraph::revalidate`] recomputes bounds bottom-up, only for invalid
//! nodes. Nodes holding damage emit their old and new bounds into the
//! per-frame [`DamageAccumulator`].

use std::sync::Arc;

use slotmap::SlotMap;
use smallvec::SmallVec;
use tessera_paint::{Matrix, Picture, Point, Rect, Renderer};

use crate::damage::DamageAccumulator;
use crate::error::{GraphError, Result};
use crate::node::{KindTag, Node, NodeKind, NodeState, NodeTraits};
use crate::refs::{NodeId, Ref, WeakRef};

/// Owner of every node in a scene
#[derive(Default)]
pub struct RenderGraph {
    nodes: SlotMap<NodeId, Node>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, kind: NodeKind) -> Ref {
        let dependencies = kind.dependencies();
        let tag = kind.tag();
        let id = self.nodes.insert(Node::new(kind));
        for dependency in dependencies {
            self.observe(dependency, id);
        }
        tracing::trace!("created {} node {:?}", tag.name(), id);
        Ref::new(id)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(GraphError::DeadNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(GraphError::DeadNode)
    }

    pub(crate) fn mismatch(expected: KindTag, found: KindTag) -> GraphError {
        tracing::warn!("expected a {} node, got a {} node", expected.name(), found.name());
        GraphError::KindMismatch {
            expected: expected.name(),
            found: found.name(),
        }
    }

    pub fn kind(&self, id: NodeId) -> Option<KindTag> {
        self.nodes.get(id).map(|node| node.kind.tag())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ownership
    // ─────────────────────────────────────────────────────────────────────

    /// Take another strong reference to the same node
    pub fn clone_ref(&mut self, handle: &Ref) -> Ref {
        if let Some(node) = self.nodes.get_mut(handle.id()) {
            node.strong += 1;
        }
        Ref::new(handle.id())
    }

    /// Give up a strong reference
    ///
    /// When the count reaches zero the node is destroyed, detached from the
    /// observer lists of its dependencies, and every reference it owned is
    /// released in turn.
    pub fn release(&mut self, handle: Ref) {
        let mut pending = vec![handle.into_id()];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            node.strong = node.strong.saturating_sub(1);
            if node.strong > 0 {
                continue;
            }
            let Some(node) = self.nodes.remove(id) else {
                continue;
            };
            tracing::trace!("destroyed {} node {:?}", node.kind.tag().name(), id);
            for owned in node.kind.into_refs() {
                let owned = owned.into_id();
                self.unobserve(owned, id);
                pending.push(owned);
            }
        }
    }

    pub fn downgrade(&self, handle: &Ref) -> WeakRef {
        WeakRef::from(handle)
    }

    /// Upgrade a weak reference if its node is still alive
    pub fn lock(&mut self, weak: WeakRef) -> Option<Ref> {
        let node = self.nodes.get_mut(weak.id())?;
        node.strong += 1;
        Some(Ref::new(weak.id()))
    }

    /// Register `observer` to be invalidated whenever `target` is
    pub fn observe(&mut self, target: NodeId, observer: NodeId) {
        if let Some(node) = self.nodes.get_mut(target) {
            let weak = WeakRef::new(observer);
            if !node.observers.contains(&weak) {
                node.observers.push(weak);
            }
        }
    }

    pub fn unobserve(&mut self, target: NodeId, observer: NodeId) {
        if let Some(node) = self.nodes.get_mut(target) {
            node.observers.retain(|weak| weak.id() != observer);
        }
    }

    pub fn strong_count(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |node| node.strong)
    }

    pub fn observer_count(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |node| node.observers.len())
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────

    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(id).map(|node| node.state)
    }

    pub fn traits(&self, id: NodeId) -> Option<NodeTraits> {
        self.nodes.get(id).map(|node| node.traits)
    }

    /// Replace the traits of a node; takes effect from the next invalidate
    pub fn set_traits(&mut self, id: NodeId, traits: NodeTraits) -> Result<()> {
        self.node_mut(id)?.traits = traits;
        Ok(())
    }

    pub fn is_invalid(&self, id: NodeId) -> bool {
        self.has_state(id, NodeState::INVALIDATE)
    }

    pub fn has_damage(&self, id: NodeId) -> bool {
        self.has_state(id, NodeState::DAMAGE)
    }

    /// Whether cached derived data was regenerated in the last revalidate
    pub fn is_updated(&self, id: NodeId) -> bool {
        self.has_state(id, NodeState::UPDATE)
    }

    pub fn clear_update(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state.remove(NodeState::UPDATE);
        }
    }

    fn has_state(&self, id: NodeId, state: NodeState) -> bool {
        self.nodes.get(id).is_some_and(|node| node.state.contains(state))
    }

    /// Bounds cached by the last revalidate, in the node's own space
    pub fn bounds(&self, id: NodeId) -> Rect {
        self.nodes.get(id).map_or(Rect::EMPTY, |node| node.bounds)
    }

    /// Cached bounds in the space of whoever draws the node
    pub fn outer_bounds(&self, id: NodeId) -> Rect {
        let Some(node) = self.nodes.get(id) else {
            return Rect::EMPTY;
        };
        match &node.kind {
            NodeKind::TransformEffect(effect) => node.bounds.map(&effect.applied()),
            _ => node.bounds,
        }
    }

    /// Matrix that damage emitted by `id` is mapped through
    fn damage_matrix(&self, id: NodeId, ctm: &Matrix) -> Matrix {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::TransformEffect(effect)) => ctm.concat(&effect.applied()),
            _ => *ctm,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Invalidate / revalidate
    // ─────────────────────────────────────────────────────────────────────

    /// Mark `id` and everything observing it as needing revalidation
    pub fn invalidate(&mut self, id: NodeId, damage: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.state.contains(NodeState::INVALIDATE)
            && (!damage || node.state.intersects(NodeState::DAMAGE | NodeState::BUBBLED))
        {
            return;
        }
        if node.state.contains(NodeState::TRAVERSALING) {
            tracing::warn!("reentrant invalidate of {:?}, graph has a cycle", id);
            return;
        }

        let mut damage = damage;
        if damage {
            if node.traits.contains(NodeTraits::BUBBLE_DAMAGE) {
                node.state.insert(NodeState::BUBBLED);
            } else {
                node.state.insert(NodeState::DAMAGE);
                damage = false;
            }
        }
        node.state.insert(NodeState::INVALIDATE | NodeState::TRAVERSALING);

        let observers: SmallVec<[WeakRef; 4]> = node.observers.iter().copied().collect();
        let mut dead: SmallVec<[NodeId; 4]> = SmallVec::new();
        for observer in observers {
            if self.nodes.contains_key(observer.id()) {
                self.invalidate(observer.id(), damage);
            } else {
                dead.push(observer.id());
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.state.remove(NodeState::TRAVERSALING);
            if !dead.is_empty() {
                node.observers.retain(|weak| !dead.contains(&weak.id()));
            }
        }
    }

    /// Bring `id` up to date and return its bounds
    ///
    /// `ctm` maps the node's space into the accumulator's space.
    pub fn revalidate(
        &mut self,
        id: NodeId,
        mut acc: Option<&mut DamageAccumulator>,
        ctm: &Matrix,
    ) -> Rect {
        let Some(node) = self.nodes.get_mut(id) else {
            return Rect::EMPTY;
        };
        if !node.state.contains(NodeState::INVALIDATE) {
            return node.bounds;
        }
        if node.state.contains(NodeState::TRAVERSALING) {
            tracing::warn!("reentrant revalidate of {:?}, returning cached bounds", id);
            return node.bounds;
        }

        node.state.insert(NodeState::TRAVERSALING);
        node.state.remove(NodeState::UPDATE);
        let overrides = node.traits.contains(NodeTraits::OVERRIDE_DAMAGE);
        let generate = acc.is_some() && (overrides || node.state.contains(NodeState::DAMAGE));
        let previous = node.bounds;
        let tag = node.kind.tag();
        let previous_matrix = self.damage_matrix(id, ctm);

        let child_acc = if overrides { None } else { acc.as_deref_mut() };
        let bounds = self.on_revalidate(id, tag, child_acc, ctm);
        tracing::trace!("revalidated {} node {:?}: {:?}", tag.name(), id, bounds);

        if generate {
            let matrix = self.damage_matrix(id, ctm);
            if let Some(acc) = acc {
                acc.inval(previous, &previous_matrix);
                if bounds != previous || matrix != previous_matrix {
                    acc.inval(bounds, &matrix);
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.bounds = bounds;
            node.state.remove(
                NodeState::INVALIDATE | NodeState::DAMAGE | NodeState::BUBBLED | NodeState::TRAVERSALING,
            );
        }
        bounds
    }

    fn on_revalidate(
        &mut self,
        id: NodeId,
        tag: KindTag,
        acc: Option<&mut DamageAccumulator>,
        ctm: &Matrix,
    ) -> Rect {
        match tag {
            KindTag::Picture => match self.nodes.get(id).map(|node| &node.kind) {
                Some(NodeKind::Picture(picture)) => picture.bounds(),
                _ => Rect::EMPTY,
            },
            KindTag::Matrix | KindTag::Concat | KindTag::Viewport | KindTag::Zoomer => {
                let dependencies = self
                    .nodes
                    .get(id)
                    .map(|node| node.kind.dependencies())
                    .unwrap_or_default();
                for dependency in dependencies {
                    self.revalidate(dependency, None, &Matrix::IDENTITY);
                }
                Rect::EMPTY
            }
            KindTag::TransformEffect => self.revalidate_effect(id, acc, ctm),
            KindTag::TileCache => self.revalidate_tile_cache(id, acc, ctm),
            KindTag::Frame | KindTag::Scene => self.revalidate_group(id, acc, ctm),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Render node contract
    // ─────────────────────────────────────────────────────────────────────

    /// Draw `id` into `renderer` in the node's own space
    pub fn render(&self, id: NodeId, renderer: &mut dyn Renderer) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Picture(picture) => self.render_picture(picture, renderer),
            NodeKind::TransformEffect(_) => self.render_effect(id, renderer),
            NodeKind::TileCache(cache) => self.render_tile_cache(id, cache, renderer),
            NodeKind::Frame(_) | NodeKind::Scene(_) => self.render_group(id, renderer),
            NodeKind::Matrix(_) | NodeKind::Concat(_) | NodeKind::Viewport(_) | NodeKind::Zoomer(_) => {}
        }
    }

    /// Topmost leaf under `point` that `visitor` accepts
    pub fn node_at(
        &self,
        id: NodeId,
        point: Point,
        visitor: &mut dyn FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        match &node.kind {
            NodeKind::Picture(picture) => self.picture_node_at(id, picture, point, visitor),
            NodeKind::TransformEffect(_) => self.effect_node_at(id, point, visitor),
            NodeKind::TileCache(cache) => self.tile_cache_node_at(cache, point, visitor),
            NodeKind::Frame(_) | NodeKind::Scene(_) => self.group_node_at(id, point, visitor),
            NodeKind::Matrix(_) | NodeKind::Concat(_) | NodeKind::Viewport(_) | NodeKind::Zoomer(_) => {
                None
            }
        }
    }

    /// The picture a node draws, if it can be expressed as one
    pub fn picture(&self, id: NodeId) -> Option<Arc<dyn Picture>> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Picture(picture) => picture.picture().cloned(),
            NodeKind::Frame(_) | NodeKind::Scene(_) => self
                .group_recording(id)
                .map(|recording| recording as Arc<dyn Picture>),
            _ => None,
        }
    }
}
