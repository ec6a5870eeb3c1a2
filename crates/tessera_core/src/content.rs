//! Picture leaves

use std::fmt;
use std::sync::Arc;

use tessera_paint::{Picture, Point, Rect, Renderer};

use crate::error::Result;
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind};
use crate::refs::{NodeId, Ref};

/// Leaf node wrapping externally supplied content
#[derive(Default)]
pub struct PictureNode {
    picture: Option<Arc<dyn Picture>>,
}

impl PictureNode {
    pub fn new(picture: Option<Arc<dyn Picture>>) -> Self {
        Self { picture }
    }

    pub fn picture(&self) -> Option<&Arc<dyn Picture>> {
        self.picture.as_ref()
    }

    pub(crate) fn bounds(&self) -> Rect {
        self.picture.as_ref().map_or(Rect::EMPTY, |picture| picture.bounds())
    }
}

impl fmt::Debug for PictureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureNode")
            .field("token", &self.picture.as_ref().map(|p| p.token()))
            .field("bounds", &self.bounds())
            .finish()
    }
}

impl RenderGraph {
    pub fn create_picture(&mut self, picture: Option<Arc<dyn Picture>>) -> Ref {
        self.insert(NodeKind::Picture(PictureNode::new(picture)))
    }

    /// Swap the content of a picture leaf and damage it
    pub fn set_picture(&mut self, id: NodeId, picture: Option<Arc<dyn Picture>>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Picture(node) => node.picture = picture,
            other => return Err(Self::mismatch(KindTag::Picture, other.tag())),
        }
        self.invalidate(id, true);
        Ok(())
    }

    pub(crate) fn render_picture(&self, node: &PictureNode, renderer: &mut dyn Renderer) {
        if let Some(picture) = &node.picture {
            picture.playback(renderer);
        }
    }

    pub(crate) fn picture_node_at(
        &self,
        id: NodeId,
        node: &PictureNode,
        point: Point,
        visitor: &mut dyn FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let picture = node.picture.as_ref()?;
        (picture.contains(point) && visitor(id)).then_some(id)
    }
}
