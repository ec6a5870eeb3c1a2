//! Device pixel ratio and drawable surface size

use tessera_paint::{Matrix, Rect};

use crate::error::Result;
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind};
use crate::refs::{NodeId, Ref};

/// Maps logical canvas units to device pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    device_pixel_ratio: f32,
    width: f32,
    height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl Viewport {
    /// `width` and `height` are in device pixels
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        let device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            device_pixel_ratio,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn matrix(&self) -> Matrix {
        Matrix::scale(self.device_pixel_ratio, self.device_pixel_ratio)
    }

    /// Drawable area in device pixels
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.rect().is_empty()
    }

    /// Returns whether the size changed
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        let (width, height) = (width.max(0.0), height.max(0.0));
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    /// Returns whether the ratio changed; non-positive ratios are refused
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) -> bool {
        if !ratio.is_finite() || ratio <= 0.0 || ratio == self.device_pixel_ratio {
            return false;
        }
        self.device_pixel_ratio = ratio;
        true
    }
}

impl RenderGraph {
    pub fn create_viewport(&mut self, viewport: Viewport) -> Ref {
        self.insert(NodeKind::Viewport(viewport))
    }

    pub fn viewport(&self, id: NodeId) -> Result<&Viewport> {
        match &self.node(id)?.kind {
            NodeKind::Viewport(viewport) => Ok(viewport),
            other => Err(Self::mismatch(KindTag::Viewport, other.tag())),
        }
    }

    /// Mutate a viewport in place; `f` reports whether anything changed
    pub fn update_viewport<F>(&mut self, id: NodeId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Viewport) -> bool,
    {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Viewport(viewport) => f(viewport),
            other => return Err(Self::mismatch(KindTag::Viewport, other.tag())),
        };
        if changed {
            self.invalidate(id, true);
        }
        Ok(changed)
    }

    pub fn resize_viewport(&mut self, id: NodeId, width: f32, height: f32) -> Result<bool> {
        self.update_viewport(id, |viewport| viewport.resize(width, height))
    }

    pub fn set_device_pixel_ratio(&mut self, id: NodeId, ratio: f32) -> Result<bool> {
        self.update_viewport(id, |viewport| viewport.set_device_pixel_ratio(ratio))
    }

    /// Drawable rectangle of a viewport node, empty for anything else
    pub(crate) fn viewport_rect(&self, id: NodeId) -> Rect {
        self.viewport(id).map(Viewport::rect).unwrap_or(Rect::EMPTY)
    }
}
