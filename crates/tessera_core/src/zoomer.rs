//! Pan and zoom
//!
//! The zoomer's matrix is `translate(offset) * scale(scale)`: canvas points
//! are scaled first, then shifted by the pan offset. Scale changes keep a
//! chosen anchor point fixed on screen.

use serde::{Deserialize, Serialize};
use tessera_paint::{Matrix, Point};

use crate::error::Result;
use crate::graph::RenderGraph;
use crate::node::{KindTag, NodeKind};
use crate::refs::{NodeId, Ref};

/// Discrete zoom steps
pub const ZOOM_LEVELS: [f32; 12] = [
    1.0 / 4.0,
    1.0 / 3.0,
    1.0 / 2.0,
    2.0 / 3.0,
    3.0 / 4.0,
    1.0,
    4.0 / 3.0,
    3.0 / 2.0,
    2.0,
    3.0,
    4.0,
    5.0,
];

/// Exclusive lower bound for any scale
pub const MIN_SCALE: f32 = 0.01;
/// Exclusive upper bound for any scale
pub const MAX_SCALE: f32 = 100.0;

const DEFAULT_LEVEL: usize = 5;

/// How requested scales map onto the applied scale
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomMode {
    /// Snap to the nearest entry of [`ZOOM_LEVELS`]
    Discrete,
    /// Use the requested scale as is
    #[default]
    Continuous,
}

/// Pan/zoom state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoomer {
    mode: ZoomMode,
    scale: f32,
    offset: Point,
}

impl Default for Zoomer {
    fn default() -> Self {
        Self::new(ZoomMode::default())
    }
}

impl Zoomer {
    pub fn new(mode: ZoomMode) -> Self {
        Self {
            mode,
            scale: 1.0,
            offset: Point::ZERO,
        }
    }

    pub fn mode(&self) -> ZoomMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ZoomMode) {
        self.mode = mode;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn matrix(&self) -> Matrix {
        Matrix::translation(self.offset.x, self.offset.y).concat(&Matrix::scale(self.scale, self.scale))
    }

    /// Ladder index of the current scale, `None` when it sits between steps
    pub fn level(&self) -> Option<usize> {
        ZOOM_LEVELS
            .iter()
            .position(|level| (level - self.scale).abs() <= f32::EPSILON * 4.0)
    }

    /// Level-of-detail hint for rasterizers; -1 in continuous mode
    pub fn lod(&self) -> i32 {
        match self.mode {
            ZoomMode::Continuous => -1,
            ZoomMode::Discrete => self.level().map_or(-1, |level| level as i32),
        }
    }

    /// Zoom to `scale` keeping `anchor` fixed on screen
    ///
    /// Returns `false` without touching any state when the scale is not
    /// finite or lies outside `(MIN_SCALE, MAX_SCALE)`, or when nothing
    /// would change.
    pub fn set_scale(&mut self, scale: f32, anchor: Point) -> bool {
        if !scale.is_finite() || scale <= MIN_SCALE || scale >= MAX_SCALE {
            return false;
        }
        let scale = match self.mode {
            ZoomMode::Discrete => ZOOM_LEVELS[nearest_level(scale)],
            ZoomMode::Continuous => scale,
        };
        if scale == self.scale {
            return false;
        }

        let ratio = (scale - self.scale) / self.scale;
        self.offset.x -= (anchor.x - self.offset.x) * ratio;
        self.offset.y -= (anchor.y - self.offset.y) * ratio;
        self.scale = scale;
        true
    }

    pub fn set_level(&mut self, level: usize, anchor: Point) -> bool {
        match ZOOM_LEVELS.get(level) {
            Some(&scale) => self.set_scale(scale, anchor),
            None => false,
        }
    }

    /// Step to the next larger ladder entry
    pub fn zoom_in(&mut self, anchor: Point) -> bool {
        match ZOOM_LEVELS.iter().position(|&level| level > self.scale + f32::EPSILON) {
            Some(level) => self.set_level(level, anchor),
            None => false,
        }
    }

    /// Step to the next smaller ladder entry
    pub fn zoom_out(&mut self, anchor: Point) -> bool {
        match ZOOM_LEVELS.iter().rposition(|&level| level < self.scale - f32::EPSILON) {
            Some(level) => self.set_level(level, anchor),
            None => false,
        }
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        if (dx == 0.0 && dy == 0.0) || !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        self.offset = self.offset.offset(dx, dy);
        true
    }

    pub fn set_offset(&mut self, offset: Point) -> bool {
        if offset == self.offset || !offset.x.is_finite() || !offset.y.is_finite() {
            return false;
        }
        self.offset = offset;
        true
    }

    /// Back to 1:1 with no pan
    pub fn reset(&mut self) -> bool {
        let reset = Self {
            mode: self.mode,
            scale: ZOOM_LEVELS[DEFAULT_LEVEL],
            offset: Point::ZERO,
        };
        let changed = *self != reset;
        *self = reset;
        changed
    }
}

fn nearest_level(scale: f32) -> usize {
    let mut best = 0;
    for (index, level) in ZOOM_LEVELS.iter().enumerate() {
        if (level - scale).abs() < (ZOOM_LEVELS[best] - scale).abs() {
            best = index;
        }
    }
    best
}

impl RenderGraph {
    pub fn create_zoomer(&mut self, zoomer: Zoomer) -> Ref {
        self.insert(NodeKind::Zoomer(zoomer))
    }

    pub fn zoomer(&self, id: NodeId) -> Result<&Zoomer> {
        match &self.node(id)?.kind {
            NodeKind::Zoomer(zoomer) => Ok(zoomer),
            other => Err(Self::mismatch(KindTag::Zoomer, other.tag())),
        }
    }

    /// Mutate a zoomer in place; `f` reports whether anything changed
    pub fn update_zoomer<F>(&mut self, id: NodeId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Zoomer) -> bool,
    {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Zoomer(zoomer) => f(zoomer),
            other => return Err(Self::mismatch(KindTag::Zoomer, other.tag())),
        };
        if changed {
            self.invalidate(id, true);
        }
        Ok(changed)
    }

    pub fn set_zoom_scale(&mut self, id: NodeId, scale: f32, anchor: Point) -> Result<bool> {
        self.update_zoomer(id, |zoomer| zoomer.set_scale(scale, anchor))
    }

    pub fn pan_by(&mut self, id: NodeId, dx: f32, dy: f32) -> Result<bool> {
        self.update_zoomer(id, |zoomer| zoomer.pan_by(dx, dy))
    }

    /// Ladder index of a zoomer node, or -1
    pub(crate) fn zoomer_lod(&self, id: NodeId) -> i32 {
        match self.get(id).map(|node| &node.kind) {
            Some(NodeKind::Zoomer(zoomer)) => zoomer.lod(),
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen_of(zoomer: &Zoomer, canvas: Point) -> Point {
        zoomer.matrix().transform_point(canvas)
    }

    #[test]
    fn test_anchor_stays_fixed() {
        let mut zoomer = Zoomer::default();
        zoomer.pan_by(7.0, -3.0);
        let anchor = Point::new(40.0, 25.0);
        let canvas = zoomer.matrix().invert().unwrap().transform_point(anchor);

        assert!(zoomer.set_scale(2.5, anchor));
        let after = screen_of(&zoomer, canvas);
        assert!((after.x - anchor.x).abs() < 1e-3);
        assert!((after.y - anchor.y).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_scale_is_rejected() {
        let mut zoomer = Zoomer::default();
        assert!(!zoomer.set_scale(0.005, Point::ZERO));
        assert!(!zoomer.set_scale(150.0, Point::ZERO));
        assert!(!zoomer.set_scale(f32::INFINITY, Point::ZERO));
        assert_eq!(zoomer, Zoomer::default());
    }

    #[test]
    fn test_discrete_mode_snaps_to_ladder() {
        let mut zoomer = Zoomer::new(ZoomMode::Discrete);
        assert!(zoomer.set_scale(1.9, Point::ZERO));
        assert_eq!(zoomer.scale(), 2.0);
        assert_eq!(zoomer.level(), Some(8));
    }

    #[test]
    fn test_continuous_mode_reports_no_lod() {
        let mut zoomer = Zoomer::default();
        assert_eq!(zoomer.level(), Some(5));
        assert_eq!(zoomer.lod(), -1);
        zoomer.set_scale(2.0, Point::ZERO);
        assert_eq!(zoomer.lod(), -1);
        zoomer.set_scale(1.1, Point::ZERO);
        assert_eq!(zoomer.level(), None);
        assert_eq!(zoomer.lod(), -1);
    }

    #[test]
    fn test_discrete_mode_reports_ladder_lod() {
        let mut zoomer = Zoomer::new(ZoomMode::Discrete);
        assert_eq!(zoomer.lod(), 5);
        assert!(zoomer.zoom_in(Point::ZERO));
        assert_eq!(zoomer.lod(), 6);
    }

    #[test]
    fn test_zoom_steps_walk_the_ladder() {
        let mut zoomer = Zoomer::default();
        assert!(zoomer.zoom_in(Point::ZERO));
        assert_eq!(zoomer.scale(), 4.0 / 3.0);
        assert!(zoomer.zoom_out(Point::ZERO));
        assert!(zoomer.zoom_out(Point::ZERO));
        assert_eq!(zoomer.scale(), 0.75);

        zoomer.set_scale(1.1, Point::ZERO);
        assert!(zoomer.zoom_in(Point::ZERO));
        assert_eq!(zoomer.scale(), 4.0 / 3.0);

        zoomer.set_level(ZOOM_LEVELS.len() - 1, Point::ZERO);
        assert!(!zoomer.zoom_in(Point::ZERO));
    }

    #[test]
    fn test_reset() {
        let mut zoomer = Zoomer::default();
        assert!(!zoomer.reset());
        zoomer.set_scale(3.0, Point::new(10.0, 10.0));
        assert!(zoomer.reset());
        assert_eq!(zoomer.matrix(), Matrix::IDENTITY);
    }
}
