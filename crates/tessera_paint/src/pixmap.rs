//! CPU raster backend on top of tiny-skia

use tiny_skia::{FillRule, Mask, Pixmap, PixmapPaint, Stroke, Transform};

use crate::color::Color;
use crate::geometry::{Matrix, Point, Rect};
use crate::image::{Image, ImageData, Surface, SurfaceProvider};
use crate::path::{Path, PathCommand};
use crate::recording::replay;
use crate::renderer::{Paint, PaintStyle, Renderer};

fn to_transform(matrix: &Matrix) -> Transform {
    let [a, b, c, d, tx, ty] = matrix.elements;
    Transform::from_row(a, b, c, d, tx, ty)
}

fn to_skia_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut builder = tiny_skia::PathBuilder::new();
    for command in path.commands() {
        match *command {
            PathCommand::MoveTo(p) => builder.move_to(p.x, p.y),
            PathCommand::LineTo(p) => builder.line_to(p.x, p.y),
            PathCommand::QuadTo { control, end } => {
                builder.quad_to(control.x, control.y, end.x, end.y)
            }
            PathCommand::Close => builder.close(),
        }
    }
    builder.finish()
}

fn to_skia_paint(paint: &Paint) -> tiny_skia::Paint<'static> {
    let [r, g, b, a] = paint.color.to_rgba8();
    let mut skia_paint = tiny_skia::Paint::default();
    skia_paint.set_color_rgba8(r, g, b, a);
    skia_paint.anti_alias = paint.anti_alias;
    skia_paint
}

/// A [`Renderer`] drawing into an owned tiny-skia pixmap
pub struct PixmapRenderer {
    pixmap: Pixmap,
    matrix: Matrix,
    clip: Option<Mask>,
    stack: Vec<(Matrix, Option<Mask>)>,
}

impl PixmapRenderer {
    /// Create a transparent pixmap; `None` for zero-sized or oversized requests
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let pixmap = Pixmap::new(width, height)?;
        Some(Self {
            pixmap,
            matrix: Matrix::IDENTITY,
            clip: None,
            stack: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn clear(&mut self, color: Color) {
        let [r, g, b, a] = color.to_rgba8();
        self.pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    /// Unpremultiplied color of a pixel, `None` outside the pixmap
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let pixel = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color::from_rgba8(
            pixel.red(),
            pixel.green(),
            pixel.blue(),
            pixel.alpha(),
        ))
    }

    fn fill_skia_path(&mut self, path: &tiny_skia::Path, paint: &Paint) {
        let skia_paint = to_skia_paint(paint);
        let transform = to_transform(&self.matrix);
        match paint.style {
            PaintStyle::Fill => self.pixmap.fill_path(
                path,
                &skia_paint,
                FillRule::Winding,
                transform,
                self.clip.as_ref(),
            ),
            PaintStyle::Stroke { width } => {
                let stroke = Stroke {
                    width,
                    ..Default::default()
                };
                self.pixmap
                    .stroke_path(path, &skia_paint, &stroke, transform, self.clip.as_ref());
            }
        }
    }
}

impl Renderer for PixmapRenderer {
    fn save(&mut self) {
        self.stack.push((self.matrix, self.clip.clone()));
    }

    fn restore(&mut self) {
        if let Some((matrix, clip)) = self.stack.pop() {
            self.matrix = matrix;
            self.clip = clip;
        }
    }

    fn matrix(&self) -> Matrix {
        self.matrix
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.matrix = *matrix;
    }

    fn clip_rect(&mut self, rect: Rect) {
        let Some(skia_rect) =
            tiny_skia::Rect::from_xywh(rect.x(), rect.y(), rect.width(), rect.height())
        else {
            // An empty clip rejects everything that follows
            self.clip = Mask::new(self.pixmap.width(), self.pixmap.height());
            return;
        };
        let path = tiny_skia::PathBuilder::from_rect(skia_rect);
        let transform = to_transform(&self.matrix);
        if let Some(mask) = self.clip.as_mut() {
            mask.intersect_path(&path, FillRule::Winding, false, transform);
            return;
        }
        if let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
            mask.fill_path(&path, FillRule::Winding, false, transform);
            self.clip = Some(mask);
        }
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        let Some(skia_rect) =
            tiny_skia::Rect::from_xywh(rect.x(), rect.y(), rect.width(), rect.height())
        else {
            return;
        };
        let path = tiny_skia::PathBuilder::from_rect(skia_rect);
        self.fill_skia_path(&path, paint);
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        if let Some(path) = to_skia_path(path) {
            self.fill_skia_path(&path, paint);
        }
    }

    fn draw_image(&mut self, image: &Image, origin: Point) {
        match image.data() {
            ImageData::Pixels(pixels) => {
                let transform = self
                    .matrix
                    .concat(&Matrix::translation(origin.x, origin.y));
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    pixels.as_ref(),
                    &PixmapPaint::default(),
                    to_transform(&transform),
                    self.clip.as_ref(),
                );
            }
            ImageData::Commands(commands) => {
                self.save();
                self.concat(&Matrix::translation(origin.x, origin.y));
                self.clip_rect(Rect::from_origin_size(Point::ZERO, image.size()));
                replay(commands, self);
                self.restore();
            }
        }
    }
}

/// Offscreen pixmap surface
pub struct PixmapSurface {
    renderer: PixmapRenderer,
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.renderer.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.renderer.pixmap.height()
    }

    fn renderer(&mut self) -> &mut dyn Renderer {
        &mut self.renderer
    }

    fn snapshot(&mut self) -> Image {
        Image::from_pixmap(self.renderer.pixmap.clone())
    }
}

/// Allocates [`PixmapSurface`]s
#[derive(Debug, Default)]
pub struct PixmapSurfaceProvider;

impl SurfaceProvider for PixmapSurfaceProvider {
    fn make_surface(&mut self, width: u32, height: u32) -> Option<Box<dyn Surface>> {
        let renderer = PixmapRenderer::new(width, height)?;
        Some(Box::new(PixmapSurface { renderer }))
    }
}
