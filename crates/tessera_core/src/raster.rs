//! Tile rasterization
//!
//! A [`Rasterizer`] turns the content under a tile cache into a set of
//! [`Tile`]s in device space. The default [`TileRasterizer`] renders a fixed
//! grid of offscreen surfaces and reuses what it can from the previous set.

use rustc_hash::FxHashMap;
use tessera_paint::{Image, Matrix, Rect, Renderer, SurfaceProvider};

use crate::damage::subtract;
use crate::tile_cache::DamageReason;

/// Default edge length of a tile in device pixels
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Rasterized pixels for one device-space rectangle
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub rect: Rect,
    pub image: Image,
    /// Device matrix the pixels were produced under
    pub matrix: Matrix,
}

/// Everything a rasterizer needs to know about one raster pass
#[derive(Clone, Copy, Debug)]
pub struct RasterContext<'a> {
    /// Current content-to-device matrix
    pub matrix: Matrix,
    /// Content bounds in device space
    pub content_bounds: Rect,
    /// Drawable device rectangle
    pub viewport: Rect,
    /// Zoom ladder index, or -1 for continuous scales
    pub level_of_detail: i32,
    pub reason: DamageReason,
    /// Merged device-space damage collected this pass
    pub damage: &'a [Rect],
    /// Matrix the previous tiles were rendered with
    pub previous_matrix: Matrix,
}

/// Result of a raster pass
#[derive(Clone, Debug, Default)]
pub struct RasterOutput {
    pub tiles: Vec<Tile>,
    /// Device matrix the tiles correspond to
    pub matrix: Matrix,
    /// Tiles drawn from scratch
    pub rendered: usize,
    /// Tiles carried over from the previous set
    pub reused: usize,
}

/// Produces tiles for a tile cache
pub trait Rasterizer {
    /// `content` draws the cached subtree into the renderer it is handed,
    /// which must already carry the device matrix for the target tile.
    fn rasterize(
        &mut self,
        ctx: &RasterContext<'_>,
        previous: Vec<Tile>,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> RasterOutput;
}

/// Grid rasterizer over offscreen surfaces
pub struct TileRasterizer {
    tile_size: u32,
    provider: Box<dyn SurfaceProvider>,
}

impl TileRasterizer {
    pub fn new(tile_size: u32, provider: Box<dyn SurfaceProvider>) -> Self {
        Self {
            tile_size: tile_size.max(1),
            provider,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Grid cells covering `area`, keyed by column and row
    fn grid(&self, area: &Rect) -> Vec<((i32, i32), Rect)> {
        let size = self.tile_size as f32;
        let mut cells = Vec::new();
        if area.is_empty() {
            return cells;
        }
        let first_col = (area.left() / size).floor() as i32;
        let first_row = (area.top() / size).floor() as i32;
        let last_col = (area.right() / size).ceil() as i32;
        let last_row = (area.bottom() / size).ceil() as i32;

        for row in first_row..last_row {
            for col in first_col..last_col {
                let cell = Rect::new(col as f32 * size, row as f32 * size, size, size);
                if let Some(clipped) = cell.intersect(area) {
                    cells.push(((col, row), clipped));
                }
            }
        }
        cells
    }

    fn render_tile(
        &mut self,
        rect: Rect,
        matrix: &Matrix,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> Option<Tile> {
        let (width, height) = (rect.width().ceil() as u32, rect.height().ceil() as u32);
        let Some(mut surface) = self.provider.make_surface(width, height) else {
            tracing::debug!("no surface for tile {:?}, skipping", rect);
            return None;
        };
        let renderer = surface.renderer();
        renderer.set_matrix(&Matrix::translation(-rect.x(), -rect.y()).concat(matrix));
        content(renderer);
        Some(Tile {
            rect,
            image: surface.snapshot(),
            matrix: *matrix,
        })
    }

    fn full(
        &mut self,
        ctx: &RasterContext<'_>,
        area: &Rect,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> RasterOutput {
        let mut output = RasterOutput {
            matrix: ctx.matrix,
            ..RasterOutput::default()
        };
        for (_, cell) in self.grid(area) {
            if let Some(tile) = self.render_tile(cell, &ctx.matrix, content) {
                output.tiles.push(tile);
                output.rendered += 1;
            }
        }
        output
    }

    /// Re-render damaged grid cells, keep the rest
    fn partial(
        &mut self,
        ctx: &RasterContext<'_>,
        area: &Rect,
        previous: Vec<Tile>,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> RasterOutput {
        let size = self.tile_size as f32;
        let mut old: FxHashMap<(i32, i32), Tile> = previous
            .into_iter()
            .map(|tile| {
                let key = (
                    (tile.rect.x() / size).floor() as i32,
                    (tile.rect.y() / size).floor() as i32,
                );
                (key, tile)
            })
            .collect();

        let mut output = RasterOutput {
            matrix: ctx.matrix,
            ..RasterOutput::default()
        };
        for (key, cell) in self.grid(area) {
            let damaged = ctx.damage.iter().any(|d| d.intersects(&cell));
            match old.remove(&key) {
                Some(tile) if !damaged && tile.rect == cell => {
                    output.tiles.push(tile);
                    output.reused += 1;
                }
                _ => {
                    if let Some(tile) = self.render_tile(cell, &ctx.matrix, content) {
                        output.tiles.push(tile);
                        output.rendered += 1;
                    }
                }
            }
        }
        output
    }

    /// Shift the previous tiles by a whole-pixel pan and fill the gaps
    fn shifted(
        &mut self,
        ctx: &RasterContext<'_>,
        area: &Rect,
        previous: Vec<Tile>,
        dx: f32,
        dy: f32,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> RasterOutput {
        let mut output = RasterOutput {
            matrix: ctx.matrix,
            ..RasterOutput::default()
        };
        for tile in previous {
            let rect = tile.rect.offset(dx, dy);
            if rect.intersects(area) {
                output.tiles.push(Tile {
                    rect,
                    matrix: ctx.matrix,
                    ..tile
                });
                output.reused += 1;
            }
        }

        let mut missing = vec![*area];
        for tile in &output.tiles {
            missing = missing.iter().flat_map(|piece| subtract(piece, &tile.rect)).collect();
        }
        for piece in missing {
            for (_, cell) in self.grid(&piece) {
                if let Some(tile) = self.render_tile(cell, &ctx.matrix, content) {
                    output.tiles.push(tile);
                    output.rendered += 1;
                }
            }
        }
        output
    }
}

impl Rasterizer for TileRasterizer {
    fn rasterize(
        &mut self,
        ctx: &RasterContext<'_>,
        previous: Vec<Tile>,
        content: &mut dyn FnMut(&mut dyn Renderer),
    ) -> RasterOutput {
        let Some(area) = ctx.content_bounds.intersect(&ctx.viewport).map(|r| r.round_out()) else {
            return RasterOutput {
                matrix: ctx.matrix,
                ..RasterOutput::default()
            };
        };

        if previous.is_empty() {
            return self.full(ctx, &area, content);
        }

        if ctx.reason == DamageReason::CONTENT && ctx.matrix == ctx.previous_matrix && !ctx.damage.is_empty() {
            tracing::debug!("partial raster of {} damage rects", ctx.damage.len());
            return self.partial(ctx, &area, previous, content);
        }

        if ctx.reason == DamageReason::ZOOM_TRANSLATION && ctx.damage.is_empty() {
            let dx = ctx.matrix.translate_x() - ctx.previous_matrix.translate_x();
            let dy = ctx.matrix.translate_y() - ctx.previous_matrix.translate_y();
            if dx.fract() == 0.0 && dy.fract() == 0.0 {
                tracing::debug!("shifting {} tiles by ({}, {})", previous.len(), dx, dy);
                return self.shifted(ctx, &area, previous, dx, dy, content);
            }
        }

        self.full(ctx, &area, content)
    }
}
