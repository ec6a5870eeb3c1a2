//! Node storage, state bits and the closed set of node kinds

use bitflags::bitflags;
use smallvec::SmallVec;
use tessera_paint::Rect;

use crate::content::PictureNode;
use crate::effect::TransformEffect;
use crate::frame::{Frame, Scene};
use crate::refs::{NodeId, Ref, WeakRef};
use crate::tile_cache::TileCache;
use crate::transform::{Concat, MatrixTransform};
use crate::viewport::Viewport;
use crate::zoomer::Zoomer;

bitflags! {
    /// Per-node invalidation state
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeState: u8 {
        /// An upstream dependency changed since the last revalidate
        const INVALIDATE   = 0b0000_0001;
        /// The node's visual output changed and must emit damage
        const DAMAGE       = 0b0000_0010;
        /// The node is being traversed; set during push and pull phases
        const TRAVERSALING = 0b0000_0100;
        /// Cached derived data was regenerated in the last revalidate
        const UPDATE       = 0b0000_1000;
        /// Damage was already forwarded to observers since the last revalidate
        const BUBBLED      = 0b0001_0000;
    }
}

bitflags! {
    /// Static behaviour of a node kind in the invalidation protocol
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeTraits: u8 {
        /// Never absorbs damage; forwards it to observers instead
        const BUBBLE_DAMAGE   = 0b0000_0001;
        /// Always emits its own bounds and suppresses descendant damage
        const OVERRIDE_DAMAGE = 0b0000_0010;
    }
}

/// Discriminant of [`NodeKind`], cheap to copy out of a borrow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KindTag {
    Picture,
    Matrix,
    Concat,
    Viewport,
    Zoomer,
    TransformEffect,
    TileCache,
    Frame,
    Scene,
}

impl KindTag {
    pub fn name(self) -> &'static str {
        match self {
            KindTag::Picture => "picture",
            KindTag::Matrix => "matrix",
            KindTag::Concat => "concat",
            KindTag::Viewport => "viewport",
            KindTag::Zoomer => "zoomer",
            KindTag::TransformEffect => "transform effect",
            KindTag::TileCache => "tile cache",
            KindTag::Frame => "frame",
            KindTag::Scene => "scene",
        }
    }

    /// Transform kinds produce a matrix and never have bounds
    pub fn is_transform(self) -> bool {
        matches!(
            self,
            KindTag::Matrix | KindTag::Concat | KindTag::Viewport | KindTag::Zoomer
        )
    }
}

/// Every kind of node the graph can hold
pub enum NodeKind {
    Picture(PictureNode),
    Matrix(MatrixTransform),
    Concat(Concat),
    Viewport(Viewport),
    Zoomer(Zoomer),
    TransformEffect(TransformEffect),
    TileCache(Box<TileCache>),
    Frame(Frame),
    Scene(Scene),
}

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::Picture(_) => KindTag::Picture,
            NodeKind::Matrix(_) => KindTag::Matrix,
            NodeKind::Concat(_) => KindTag::Concat,
            NodeKind::Viewport(_) => KindTag::Viewport,
            NodeKind::Zoomer(_) => KindTag::Zoomer,
            NodeKind::TransformEffect(_) => KindTag::TransformEffect,
            NodeKind::TileCache(_) => KindTag::TileCache,
            NodeKind::Frame(_) => KindTag::Frame,
            NodeKind::Scene(_) => KindTag::Scene,
        }
    }

    pub(crate) fn default_traits(&self) -> NodeTraits {
        match self.tag() {
            // Geometry and content bubble their damage up to the nearest
            // render node, which knows where it lands on screen.
            KindTag::Picture
            | KindTag::Matrix
            | KindTag::Concat
            | KindTag::Viewport
            | KindTag::Zoomer => NodeTraits::BUBBLE_DAMAGE,
            KindTag::TransformEffect | KindTag::TileCache | KindTag::Frame | KindTag::Scene => {
                NodeTraits::empty()
            }
        }
    }

    /// Nodes this node owns and observes
    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        match self {
            NodeKind::Picture(_)
            | NodeKind::Matrix(_)
            | NodeKind::Viewport(_)
            | NodeKind::Zoomer(_) => SmallVec::new(),
            NodeKind::Concat(concat) => concat.dependencies(),
            NodeKind::TransformEffect(effect) => effect.dependencies(),
            NodeKind::TileCache(cache) => cache.dependencies(),
            NodeKind::Frame(frame) => frame.dependencies(),
            NodeKind::Scene(scene) => scene.dependencies(),
        }
    }

    /// Give up the owning edges so they can be released
    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        match self {
            NodeKind::Picture(_)
            | NodeKind::Matrix(_)
            | NodeKind::Viewport(_)
            | NodeKind::Zoomer(_) => SmallVec::new(),
            NodeKind::Concat(concat) => concat.into_refs(),
            NodeKind::TransformEffect(effect) => effect.into_refs(),
            NodeKind::TileCache(cache) => (*cache).into_refs(),
            NodeKind::Frame(frame) => frame.into_refs(),
            NodeKind::Scene(scene) => scene.into_refs(),
        }
    }
}

/// Arena entry for a single node
pub(crate) struct Node {
    pub(crate) strong: usize,
    pub(crate) state: NodeState,
    pub(crate) traits: NodeTraits,
    pub(crate) observers: SmallVec<[WeakRef; 2]>,
    pub(crate) bounds: Rect,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            strong: 1,
            // A fresh node has never been validated
            state: NodeState::INVALIDATE,
            traits: kind.default_traits(),
            observers: SmallVec::new(),
            bounds: Rect::EMPTY,
            kind,
        }
    }
}
