//! Tile raster cache
//!
//! A [`TileCache`] sits between a content subtree and the screen. Each
//! revalidate it decides why its pixels went stale ([`DamageReason`]), hands
//! the merged device-space damage to its [`Rasterizer`], and keeps the
//! resulting tiles until the next change. Rendering blits the tiles through
//! whatever part of the device transform moved since they were produced.

use std::fmt;

use bitflags::bitflags;
use smallvec::{smallvec, SmallVec};
use tessera_paint::{ContentToken, Matrix, Point, Rect, Renderer};

use crate::damage::DamageAccumulator;
use crate::error::Result;
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind, NodeState};
use crate::raster::{RasterContext, Rasterizer, Tile};
use crate::refs::{NodeId, Ref};

bitflags! {
    /// Why cached tiles went stale
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DamageReason: u8 {
        /// The content token changed
        const CONTENT          = 0b0001;
        /// Scale or skew of the device matrix changed
        const ZOOM_SCALE       = 0b0010;
        /// Only the translation of the device matrix changed
        const ZOOM_TRANSLATION = 0b0100;
        /// The viewport was resized or its pixel ratio changed
        const VIEWPORT         = 0b1000;
    }
}

impl DamageReason {
    /// Any change to the device transform or drawable area
    pub fn is_geometric(self) -> bool {
        self.intersects(Self::ZOOM_SCALE | Self::ZOOM_TRANSLATION | Self::VIEWPORT)
    }
}

/// Classify the difference between two raster passes
///
/// A content change overrides matrix comparison; the viewport bit is
/// independent of both.
pub fn classify(
    previous_token: Option<ContentToken>,
    token: Option<ContentToken>,
    previous_matrix: &Matrix,
    matrix: &Matrix,
    viewport_changed: bool,
) -> DamageReason {
    let mut reason = if previous_token != token {
        DamageReason::CONTENT
    } else if !previous_matrix.same_linear(matrix) {
        DamageReason::ZOOM_SCALE
    } else if !previous_matrix.same_translation(matrix) {
        DamageReason::ZOOM_TRANSLATION
    } else {
        DamageReason::empty()
    };
    if viewport_changed {
        reason |= DamageReason::VIEWPORT;
    }
    reason
}

/// Counters for cache effectiveness
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileCacheStats {
    pub rasters: u64,
    pub tiles_rendered: u64,
    pub tiles_reused: u64,
}

pub struct TileCache {
    child: Ref,
    viewport: Ref,
    zoomer: Option<Ref>,
    /// `viewport x zoomer`, or the viewport alone
    device: Ref,
    token: Option<ContentToken>,
    /// Device matrix at the last revalidate
    matrix: Matrix,
    /// Viewport rectangle at the last revalidate
    viewport_rect: Rect,
    raster_matrix: Matrix,
    tiles: Vec<Tile>,
    last_reason: DamageReason,
    rasterizer: Option<Box<dyn Rasterizer>>,
    stats: TileCacheStats,
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("child", &self.child)
            .field("token", &self.token)
            .field("matrix", &self.matrix)
            .field("tiles", &self.tiles.len())
            .field("last_reason", &self.last_reason)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TileCache {
    pub fn child(&self) -> NodeId {
        self.child.id()
    }

    pub fn viewport(&self) -> NodeId {
        self.viewport.id()
    }

    pub fn zoomer(&self) -> Option<NodeId> {
        self.zoomer.as_ref().map(Ref::id)
    }

    /// The transform node producing the content-to-device matrix
    pub fn device(&self) -> NodeId {
        self.device.id()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn raster_matrix(&self) -> Matrix {
        self.raster_matrix
    }

    pub fn last_reason(&self) -> DamageReason {
        self.last_reason
    }

    pub fn stats(&self) -> TileCacheStats {
        self.stats
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[NodeId; 4]> {
        let mut deps: SmallVec<[NodeId; 4]> = smallvec![self.child.id(), self.viewport.id()];
        deps.extend(self.zoomer());
        deps.push(self.device.id());
        deps
    }

    pub(crate) fn into_refs(self) -> SmallVec<[Ref; 4]> {
        let mut refs: SmallVec<[Ref; 4]> = smallvec![self.child, self.viewport];
        refs.extend(self.zoomer);
        refs.push(self.device);
        refs
    }
}

#[derive(Clone, Copy)]
struct CacheParts {
    child: NodeId,
    viewport: NodeId,
    zoomer: Option<NodeId>,
    device: NodeId,
}

impl RenderGraph {
    /// Cache `child` in device-space tiles
    ///
    /// The device matrix is `viewport x zoomer` when a zoomer is given and
    /// the viewport's matrix otherwise.
    pub fn create_tile_cache(
        &mut self,
        child: Ref,
        viewport: Ref,
        zoomer: Option<Ref>,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Ref {
        let viewport_rect = self.viewport_rect(viewport.id());
        let device = match &zoomer {
            Some(zoomer) => {
                let a = self.clone_ref(zoomer);
                let b = self.clone_ref(&viewport);
                self.create_concat(a, b)
            }
            None => self.clone_ref(&viewport),
        };
        self.insert(NodeKind::TileCache(Box::new(TileCache {
            child,
            viewport,
            zoomer,
            device,
            token: None,
            matrix: Matrix::IDENTITY,
            viewport_rect,
            raster_matrix: Matrix::IDENTITY,
            tiles: Vec::new(),
            last_reason: DamageReason::empty(),
            rasterizer: Some(rasterizer),
            stats: TileCacheStats::default(),
        })))
    }

    pub fn tile_cache(&self, id: NodeId) -> Result<&TileCache> {
        match &self.node(id)?.kind {
            NodeKind::TileCache(cache) => Ok(&**cache),
            other => Err(Self::mismatch(KindTag::TileCache, other.tag())),
        }
    }

    fn cache_parts(&self, id: NodeId) -> Option<CacheParts> {
        match &self.get(id)?.kind {
            NodeKind::TileCache(cache) => Some(CacheParts {
                child: cache.child(),
                viewport: cache.viewport(),
                zoomer: cache.zoomer(),
                device: cache.device(),
            }),
            _ => None,
        }
    }

    fn cache_mut(&mut self, id: NodeId) -> Option<&mut TileCache> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::TileCache(cache) => Some(&mut **cache),
            _ => None,
        }
    }

    pub(crate) fn revalidate_tile_cache(
        &mut self,
        id: NodeId,
        acc: Option<&mut DamageAccumulator>,
        ctm: &Matrix,
    ) -> Rect {
        let Some(parts) = self.cache_parts(id) else {
            return Rect::EMPTY;
        };
        let previous_bounds = self.bounds(id);
        self.revalidate(parts.device, None, &Matrix::IDENTITY);
        let device = self.matrix(parts.device);
        let viewport = self.viewport_rect(parts.viewport);
        let viewport_changed = self
            .cache_mut(id)
            .is_some_and(|cache| std::mem::replace(&mut cache.viewport_rect, viewport) != viewport);

        if viewport.is_empty() {
            self.revalidate(parts.child, None, &device);
            if let Some(cache) = self.cache_mut(id) {
                cache.tiles.clear();
                cache.token = None;
                cache.matrix = device;
                cache.last_reason = if viewport_changed {
                    DamageReason::VIEWPORT
                } else {
                    DamageReason::empty()
                };
            }
            if let Some(acc) = acc {
                acc.inval(previous_bounds, ctm);
            }
            tracing::debug!("tile cache {:?}: empty viewport, nothing to raster", id);
            return Rect::EMPTY;
        }

        let mut local = DamageAccumulator::new();
        self.revalidate(parts.child, Some(&mut local), &device);
        let damage: Vec<Rect> = local
            .merged()
            .into_iter()
            .filter_map(|rect| rect.intersect(&viewport))
            .collect();
        let content_bounds = self.outer_bounds(parts.child).map(&device);
        let visible = content_bounds.intersect(&viewport).unwrap_or(Rect::EMPTY);
        let token = self.picture(parts.child).map(|picture| picture.token());

        let Some(cache) = self.cache_mut(id) else {
            return Rect::EMPTY;
        };
        let mut reason = classify(cache.token, token, &cache.matrix, &device, viewport_changed);
        if !damage.is_empty() {
            reason |= DamageReason::CONTENT;
        }
        let needs_raster = token.is_some() && (!reason.is_empty() || cache.tiles.is_empty());
        let previous_matrix = cache.raster_matrix;
        cache.token = token;
        cache.matrix = device;
        cache.last_reason = reason;
        tracing::debug!("tile cache {:?}: reason {:?}, {} damage rects", id, reason, damage.len());

        if token.is_none() {
            // Nothing to cache yet; render draws the child directly
            cache.tiles.clear();
        } else if needs_raster {
            let previous = std::mem::take(&mut cache.tiles);
            if let Some(mut rasterizer) = cache.rasterizer.take() {
                let ctx = RasterContext {
                    matrix: device,
                    content_bounds,
                    viewport,
                    level_of_detail: parts.zoomer.map_or(-1, |zoomer| self.zoomer_lod(zoomer)),
                    reason,
                    damage: &damage,
                    previous_matrix,
                };
                let graph: &RenderGraph = self;
                let output = rasterizer.rasterize(&ctx, previous, &mut |renderer: &mut dyn Renderer| {
                    graph.render(parts.child, renderer)
                });

                if let Some(node) = self.get_mut(id) {
                    node.state.insert(NodeState::UPDATE);
                    if let NodeKind::TileCache(cache) = &mut node.kind {
                        cache.rasterizer = Some(rasterizer);
                        cache.tiles = output.tiles;
                        cache.raster_matrix = output.matrix;
                        cache.stats.rasters += 1;
                        cache.stats.tiles_rendered += output.rendered as u64;
                        cache.stats.tiles_reused += output.reused as u64;
                    }
                }
                tracing::debug!(
                    "tile cache {:?}: rendered {} tiles, reused {}",
                    id,
                    output.rendered,
                    output.reused
                );
            }
        }

        let bounds = if reason.contains(DamageReason::VIEWPORT) {
            viewport
        } else {
            visible
        };
        if let Some(acc) = acc {
            if reason.is_geometric() || (reason.contains(DamageReason::CONTENT) && damage.is_empty()) {
                acc.inval(previous_bounds, ctm);
                acc.inval(bounds, ctm);
            } else {
                for rect in &damage {
                    acc.inval(*rect, ctm);
                }
            }
        }
        bounds
    }

    pub(crate) fn render_tile_cache(&self, id: NodeId, cache: &TileCache, renderer: &mut dyn Renderer) {
        let viewport = self.viewport_rect(cache.viewport());
        if viewport.is_empty() {
            return;
        }
        let device = self.matrix(cache.device());

        let inverse = cache.raster_matrix.invert();
        match inverse {
            Some(inverse) if !cache.tiles.is_empty() => {
                renderer.save();
                renderer.concat(&device.concat(&inverse));
                for tile in &cache.tiles {
                    renderer.draw_image(&tile.image, tile.rect.origin);
                }
                renderer.restore();
            }
            _ => {
                tracing::trace!("tile cache {:?}: drawing content directly", id);
                renderer.save();
                renderer.clip_rect(viewport);
                renderer.concat(&device);
                self.render(cache.child(), renderer);
                renderer.restore();
            }
        }
    }

    pub(crate) fn tile_cache_node_at(
        &self,
        cache: &TileCache,
        point: Point,
        visitor: &mut dyn FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let local = self.inverse_matrix(cache.device())?.transform_point(point);
        self.node_at(cache.child(), local, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_only_is_zoom_translation() {
        let token = Some(ContentToken::from_raw(7));
        let reason = classify(
            token,
            token,
            &Matrix::translation(5.0, 5.0),
            &Matrix::translation(-20.0, 3.0),
            false,
        );
        assert_eq!(reason, DamageReason::ZOOM_TRANSLATION);
    }

    #[test]
    fn test_token_change_wins_over_matrix() {
        let reason = classify(
            Some(ContentToken::from_raw(1)),
            Some(ContentToken::from_raw(2)),
            &Matrix::IDENTITY,
            &Matrix::scale(2.0, 2.0),
            false,
        );
        assert_eq!(reason, DamageReason::CONTENT);
    }

    #[test]
    fn test_scale_change_and_viewport_combine() {
        let token = Some(ContentToken::from_raw(3));
        let reason = classify(
            token,
            token,
            &Matrix::IDENTITY,
            &Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 0.0),
            true,
        );
        assert_eq!(reason, DamageReason::ZOOM_SCALE | DamageReason::VIEWPORT);
        assert!(reason.is_geometric());
    }

    #[test]
    fn test_unchanged_is_empty() {
        let token = Some(ContentToken::from_raw(3));
        assert!(classify(token, token, &Matrix::IDENTITY, &Matrix::IDENTITY, false).is_empty());
    }
}
