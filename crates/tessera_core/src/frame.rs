//! Frame and scene grouping
//!
//! Both kinds own an ordered list of render nodes, painted first to last.
//! Every revalidate re-records the children into a fresh
//! [`RecordedPicture`], so its content token changes exactly when something
//! below the group changed. A tile cache above the group keys its pixels on
//! that token.

use std::sync::Arc;

use smallvec::SmallVec;
use tessera_paint::{Matrix, Picture, PictureRecorder, Point, Rect, RecordedPicture, Renderer};

use crate::damage::DamageAccumulator;
use crate::error::{GraphError, Result};
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind, NodeState};
use crate::refs::{NodeId, Ref};

type ChildIds = SmallVec<[NodeId; 8]>;

/// A top-level artboard
#[derive(Debug, Default)]
pub struct Frame {
    rect: Rect,
    clip: bool,
    children: Vec<Ref>,
    recording: Option<Arc<RecordedPicture>>,
}

impl Frame {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Whether children are clipped to [`Frame::rect`]
    pub fn clips(&self) -> bool {
        self.clip
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().map(Ref::id)
    }

    pub fn recording(&self) -> Option<&Arc<RecordedPicture>> {
        self.recording.as_ref()
    }

    fn clip_rect(&self) -> Option<Rect> {
        self.clip.then_some(self.rect)
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        self.children().collect()
    }

    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        self.children.into_iter().collect()
    }
}

/// Ordered container of frames or any other render nodes
#[derive(Debug, Default)]
pub struct Scene {
    children: Vec<Ref>,
    recording: Option<Arc<RecordedPicture>>,
}

impl Scene {
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().map(Ref::id)
    }

    pub fn recording(&self) -> Option<&Arc<RecordedPicture>> {
        self.recording.as_ref()
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        self.children().collect()
    }

    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        self.children.into_iter().collect()
    }
}

impl RenderGraph {
    pub fn create_frame(&mut self, rect: Rect, clip: bool) -> Ref {
        self.insert(NodeKind::Frame(Frame {
            rect,
            clip,
            ..Frame::default()
        }))
    }

    pub fn create_scene(&mut self) -> Ref {
        self.insert(NodeKind::Scene(Scene::default()))
    }

    pub fn frame(&self, id: NodeId) -> Result<&Frame> {
        match &self.node(id)?.kind {
            NodeKind::Frame(frame) => Ok(frame),
            other => Err(Self::mismatch(KindTag::Frame, other.tag())),
        }
    }

    pub fn scene(&self, id: NodeId) -> Result<&Scene> {
        match &self.node(id)?.kind {
            NodeKind::Scene(scene) => Ok(scene),
            other => Err(Self::mismatch(KindTag::Scene, other.tag())),
        }
    }

    /// Children of a frame or scene in paint order
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        match &self.node(id)?.kind {
            NodeKind::Frame(frame) => Ok(frame.children().collect()),
            NodeKind::Scene(scene) => Ok(scene.children().collect()),
            other => Err(Self::mismatch(KindTag::Frame, other.tag())),
        }
    }

    fn group_children_mut(&mut self, id: NodeId) -> Option<&mut Vec<Ref>> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Frame(frame) => Some(&mut frame.children),
            NodeKind::Scene(scene) => Some(&mut scene.children),
            _ => None,
        }
    }

    /// Whether `target` is `from` or one of its transitive dependencies
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut pending = vec![from];
        let mut seen = Vec::new();
        while let Some(id) = pending.pop() {
            if id == target {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(node) = self.get(id) {
                pending.extend(node.kind.dependencies());
            }
        }
        false
    }

    fn group_parts(&self, id: NodeId) -> Option<(ChildIds, Option<Rect>)> {
        match &self.get(id)?.kind {
            NodeKind::Frame(frame) => Some((frame.children().collect(), frame.clip_rect())),
            NodeKind::Scene(scene) => Some((scene.children().collect(), None)),
            _ => None,
        }
    }

    /// Append `child` on top of a frame or scene
    ///
    /// On failure the child reference is released.
    pub fn add_child(&mut self, parent: NodeId, child: Ref) -> Result<()> {
        let tag = match self.node(parent) {
            Ok(node) => node.kind.tag(),
            Err(err) => {
                self.release(child);
                return Err(err);
            }
        };
        if !matches!(tag, KindTag::Frame | KindTag::Scene) {
            self.release(child);
            return Err(Self::mismatch(KindTag::Frame, tag));
        }

        let child_id = child.id();
        if self.reaches(child_id, parent) {
            tracing::warn!("refusing to add {:?} below its own descendant {:?}", child_id, parent);
            self.release(child);
            return Err(GraphError::Cycle);
        }
        match self.group_children_mut(parent) {
            Some(children) => children.push(child),
            None => {
                self.release(child);
                return Ok(());
            }
        }
        self.observe(child_id, parent);
        self.invalidate(parent, true);
        Ok(())
    }

    /// Remove the topmost occurrence of `child`; returns whether it was found
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let tag = self.node(parent)?.kind.tag();
        let Some(children) = self.group_children_mut(parent) else {
            return Err(Self::mismatch(KindTag::Frame, tag));
        };
        let Some(index) = children.iter().rposition(|c| c.id() == child) else {
            return Ok(false);
        };
        let removed = children.remove(index);
        let still_owned = children.iter().any(|c| c.id() == child);

        if !still_owned {
            self.unobserve(child, parent);
        }
        self.release(removed);
        self.invalidate(parent, true);
        Ok(true)
    }

    pub fn set_frame_clip(&mut self, id: NodeId, clip: bool) -> Result<bool> {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Frame(frame) => std::mem::replace(&mut frame.clip, clip) != clip,
            other => return Err(Self::mismatch(KindTag::Frame, other.tag())),
        };
        if changed {
            self.invalidate(id, true);
        }
        Ok(changed)
    }

    pub fn set_frame_rect(&mut self, id: NodeId, rect: Rect) -> Result<bool> {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Frame(frame) => std::mem::replace(&mut frame.rect, rect) != rect,
            other => return Err(Self::mismatch(KindTag::Frame, other.tag())),
        };
        if changed {
            self.invalidate(id, true);
        }
        Ok(changed)
    }

    pub(crate) fn revalidate_group(
        &mut self,
        id: NodeId,
        mut acc: Option<&mut DamageAccumulator>,
        ctm: &Matrix,
    ) -> Rect {
        let Some((children, clip)) = self.group_parts(id) else {
            return Rect::EMPTY;
        };

        let mut bounds = Rect::EMPTY;
        for &child in &children {
            self.revalidate(child, acc.as_deref_mut(), ctm);
            bounds = bounds.union(&self.outer_bounds(child));
        }
        if let Some(clip) = clip {
            bounds = bounds.intersect(&clip).unwrap_or(Rect::EMPTY);
        }

        let mut recorder = PictureRecorder::new();
        self.paint_children(&children, clip, &mut recorder);
        let recording = Arc::new(recorder.finish());
        tracing::trace!("re-recorded group {:?} as {:?}", id, recording.token());

        if let Some(node) = self.get_mut(id) {
            match &mut node.kind {
                NodeKind::Frame(frame) => frame.recording = Some(recording),
                NodeKind::Scene(scene) => scene.recording = Some(recording),
                _ => {}
            }
            node.state.insert(NodeState::UPDATE);
        }
        bounds
    }

    fn paint_children(&self, children: &[NodeId], clip: Option<Rect>, renderer: &mut dyn Renderer) {
        renderer.save();
        if let Some(clip) = clip {
            renderer.clip_rect(clip);
        }
        for &child in children {
            self.render(child, renderer);
        }
        renderer.restore();
    }

    pub(crate) fn group_recording(&self, id: NodeId) -> Option<Arc<RecordedPicture>> {
        match &self.get(id)?.kind {
            NodeKind::Frame(frame) => frame.recording.clone(),
            NodeKind::Scene(scene) => scene.recording.clone(),
            _ => None,
        }
    }

    pub(crate) fn render_group(&self, id: NodeId, renderer: &mut dyn Renderer) {
        if let Some(recording) = self.group_recording(id) {
            recording.playback(renderer);
            return;
        }
        if let Some((children, clip)) = self.group_parts(id) {
            self.paint_children(&children, clip, renderer);
        }
    }

    pub(crate) fn group_node_at(
        &self,
        id: NodeId,
        point: Point,
        visitor: &mut dyn FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let (children, clip) = self.group_parts(id)?;
        if clip.is_some_and(|clip| !clip.contains(point)) {
            return None;
        }
        children
            .iter()
            .rev()
            .find_map(|&child| self.node_at(child, point, visitor))
    }
}

#[cfg(test)]
mod tests {
    use tessera_paint::{Color, Paint};

    use super::*;

    fn leaf(graph: &mut RenderGraph, rect: Rect) -> Ref {
        let mut recorder = PictureRecorder::new();
        recorder.fill_rect(rect.x(), rect.y(), rect.width(), rect.height(), Paint::fill(Color::GREEN));
        graph.create_picture(Some(Arc::new(recorder.finish())))
    }

    fn effect(graph: &mut RenderGraph, rect: Rect) -> Ref {
        let picture = leaf(graph, rect);
        let m = graph.create_matrix(Matrix::IDENTITY);
        graph.create_transform_effect(m, picture)
    }

    #[test]
    fn test_bounds_union_children() {
        let mut graph = RenderGraph::new();
        let frame = graph.create_frame(Rect::new(0.0, 0.0, 100.0, 100.0), false);
        let a = effect(&mut graph, Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = effect(&mut graph, Rect::new(90.0, 90.0, 20.0, 20.0));
        graph.add_child(frame.id(), a).unwrap();
        graph.add_child(frame.id(), b).unwrap();

        let bounds = graph.revalidate(frame.id(), None, &Matrix::IDENTITY);
        assert_eq!(bounds, Rect::new(0.0, 0.0, 110.0, 110.0));

        graph.set_frame_clip(frame.id(), true).unwrap();
        let bounds = graph.revalidate(frame.id(), None, &Matrix::IDENTITY);
        assert_eq!(bounds, Rect::new(0.0, 0.0, 100.0, 100.0));
        graph.release(frame);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_every_revalidate_records_fresh_token() {
        let mut graph = RenderGraph::new();
        let frame = graph.create_frame(Rect::new(0.0, 0.0, 50.0, 50.0), true);
        let a = effect(&mut graph, Rect::new(0.0, 0.0, 10.0, 10.0));
        graph.add_child(frame.id(), a).unwrap();

        graph.revalidate(frame.id(), None, &Matrix::IDENTITY);
        assert!(graph.is_updated(frame.id()));
        let first = graph.picture(frame.id()).map(|p| p.token());

        graph.invalidate(frame.id(), false);
        graph.revalidate(frame.id(), None, &Matrix::IDENTITY);
        let second = graph.picture(frame.id()).map(|p| p.token());
        assert!(first.is_some());
        assert_ne!(first, second);
        graph.release(frame);
    }

    #[test]
    fn test_remove_child_damages_old_area() {
        let mut graph = RenderGraph::new();
        let frame = graph.create_frame(Rect::new(0.0, 0.0, 100.0, 100.0), false);
        let a = effect(&mut graph, Rect::new(10.0, 10.0, 10.0, 10.0));
        let a_id = a.id();
        graph.add_child(frame.id(), a).unwrap();
        graph.revalidate(frame.id(), None, &Matrix::IDENTITY);

        assert_eq!(graph.remove_child(frame.id(), a_id), Ok(true));
        assert!(!graph.is_alive(a_id));
        assert_eq!(graph.remove_child(frame.id(), a_id), Ok(false));

        let mut acc = DamageAccumulator::new();
        let bounds = graph.revalidate(frame.id(), Some(&mut acc), &Matrix::IDENTITY);
        assert_eq!(bounds, Rect::EMPTY);
        assert_eq!(acc.bounds(), Rect::new(10.0, 10.0, 10.0, 10.0));
        graph.release(frame);
    }

    #[test]
    fn test_hit_testing_prefers_topmost_child() {
        let mut graph = RenderGraph::new();
        let scene = graph.create_scene();
        let bottom = leaf(&mut graph, Rect::new(0.0, 0.0, 20.0, 20.0));
        let top = leaf(&mut graph, Rect::new(10.0, 10.0, 20.0, 20.0));
        let (bottom_id, top_id) = (bottom.id(), top.id());
        graph.add_child(scene.id(), bottom).unwrap();
        graph.add_child(scene.id(), top).unwrap();

        let mut accept = |_: NodeId| true;
        assert_eq!(graph.node_at(scene.id(), Point::new(15.0, 15.0), &mut accept), Some(top_id));
        assert_eq!(graph.node_at(scene.id(), Point::new(5.0, 5.0), &mut accept), Some(bottom_id));

        let mut skip_top = |id: NodeId| id != top_id;
        assert_eq!(graph.node_at(scene.id(), Point::new(15.0, 15.0), &mut skip_top), Some(bottom_id));
        graph.release(scene);
    }

    #[test]
    fn test_add_child_to_wrong_kind_releases_child() {
        let mut graph = RenderGraph::new();
        let m = graph.create_matrix(Matrix::IDENTITY);
        let child = graph.create_scene();
        let child_id = child.id();
        assert!(graph.add_child(m.id(), child).is_err());
        assert!(!graph.is_alive(child_id));
        graph.release(m);
    }
}
