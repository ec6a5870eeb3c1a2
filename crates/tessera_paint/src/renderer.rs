//! The drawing interface every backend implements
//!
//! A [`Renderer`] carries a current matrix and clip that are saved and
//! restored as a stack, mirroring a 2D canvas. Render nodes only ever draw
//! through this trait, so the same graph can paint into a recording, a CPU
//! pixmap or a tile surface.

use crate::color::Color;
use crate::geometry::{Matrix, Point, Rect};
use crate::image::Image;
use crate::path::Path;

/// How a shape is painted
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintStyle {
    Fill,
    Stroke { width: f32 },
}

/// Paint parameters for shape drawing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub style: PaintStyle,
    pub anti_alias: bool,
}

impl Paint {
    pub fn fill(color: Color) -> Self {
        Self {
            color,
            style: PaintStyle::Fill,
            anti_alias: true,
        }
    }

    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            color,
            style: PaintStyle::Stroke { width },
            anti_alias: true,
        }
    }

    /// Extra extent the paint adds around geometry
    pub fn outset(&self) -> f32 {
        match self.style {
            PaintStyle::Fill => 0.0,
            PaintStyle::Stroke { width } => width.max(0.0) / 2.0,
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self::fill(Color::BLACK)
    }
}

/// A drawing target with a save/restore matrix and clip stack
pub trait Renderer {
    /// Push the current matrix and clip
    fn save(&mut self);

    /// Pop the matrix and clip pushed by the matching `save`
    fn restore(&mut self);

    /// Current total matrix
    fn matrix(&self) -> Matrix;

    /// Replace the current total matrix
    fn set_matrix(&mut self, matrix: &Matrix);

    /// Pre-multiply the current matrix: `matrix` is applied before the current one
    fn concat(&mut self, matrix: &Matrix) {
        let total = self.matrix().concat(matrix);
        self.set_matrix(&total);
    }

    /// Intersect the clip with `rect`, given in current local coordinates
    fn clip_rect(&mut self, rect: Rect);

    fn draw_rect(&mut self, rect: Rect, paint: &Paint);

    fn draw_path(&mut self, path: &Path, paint: &Paint);

    /// Draw an image with its top-left corner at `origin` (local coordinates)
    fn draw_image(&mut self, image: &Image, origin: Point);
}
