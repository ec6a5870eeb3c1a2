//! Command-recording backend
//!
//! [`PictureRecorder`] is a [`Renderer`] that stores every call as a
//! [`PaintCommand`]. It is used to capture pictures for the tile cache and as
//! an inspectable test double. Recorded matrices are relative to the matrix in
//! effect when recording began, so a recording replays correctly under any
//! base transform.

use crate::geometry::{Matrix, Point, Rect};
use crate::image::{Image, ImageData, Surface, SurfaceProvider};
use crate::path::Path;
use crate::picture::RecordedPicture;
use crate::renderer::{Paint, Renderer};

/// A recorded renderer call
#[derive(Clone, Debug, PartialEq)]
pub enum PaintCommand {
    Save,
    Restore,
    SetMatrix(Matrix),
    ClipRect(Rect),
    DrawRect { rect: Rect, paint: Paint },
    DrawPath { path: Path, paint: Paint },
    DrawImage { image: Image, origin: Point },
}

/// Play recorded commands into `renderer`, relative to its current matrix
///
/// Unbalanced `Save`/`Restore` pairs in the recording are tolerated: extra
/// restores are dropped and missing ones are issued at the end.
pub fn replay(commands: &[PaintCommand], renderer: &mut dyn Renderer) {
    let base = renderer.matrix();
    renderer.save();
    let mut depth = 0usize;

    for command in commands {
        match command {
            PaintCommand::Save => {
                renderer.save();
                depth += 1;
            }
            PaintCommand::Restore => {
                if depth > 0 {
                    renderer.restore();
                    depth -= 1;
                }
            }
            PaintCommand::SetMatrix(matrix) => renderer.set_matrix(&base.concat(matrix)),
            PaintCommand::ClipRect(rect) => renderer.clip_rect(*rect),
            PaintCommand::DrawRect { rect, paint } => renderer.draw_rect(*rect, paint),
            PaintCommand::DrawPath { path, paint } => renderer.draw_path(path, paint),
            PaintCommand::DrawImage { image, origin } => renderer.draw_image(image, *origin),
        }
    }

    for _ in 0..depth {
        renderer.restore();
    }
    renderer.restore();
}

/// Records renderer calls and tracks the bounds of everything drawn
pub struct PictureRecorder {
    commands: Vec<PaintCommand>,
    matrix: Matrix,
    /// Clip bounds in recording space
    clip: Option<Rect>,
    stack: Vec<(Matrix, Option<Rect>)>,
    bounds: Rect,
}

impl PictureRecorder {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            matrix: Matrix::IDENTITY,
            clip: None,
            stack: Vec::new(),
            bounds: Rect::EMPTY,
        }
    }

    /// Get all recorded commands
    pub fn commands(&self) -> &[PaintCommand] {
        &self.commands
    }

    /// Take ownership of recorded commands
    pub fn take_commands(&mut self) -> Vec<PaintCommand> {
        self.bounds = Rect::EMPTY;
        std::mem::take(&mut self.commands)
    }

    /// Recording-space bounds of everything drawn so far
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of image draws recorded
    pub fn image_draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, PaintCommand::DrawImage { .. }))
            .count()
    }

    /// Seal the recording into a picture with a fresh content token
    pub fn finish(self) -> RecordedPicture {
        RecordedPicture::new(self.commands, self.bounds)
    }

    fn accumulate(&mut self, local: Rect) {
        let mut mapped = self.matrix.map_rect(&local);
        if let Some(clip) = self.clip {
            mapped = mapped.intersect(&clip).unwrap_or(Rect::EMPTY);
        }
        self.bounds = self.bounds.union(&mapped);
    }

    // === Convenience drawing ===

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: Paint) {
        self.draw_rect(Rect::new(x, y, width, height), &paint);
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.concat(&Matrix::translation(x, y));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.concat(&Matrix::scale(sx, sy));
    }
}

impl Default for PictureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PictureRecorder {
    fn save(&mut self) {
        self.stack.push((self.matrix, self.clip));
        self.commands.push(PaintCommand::Save);
    }

    fn restore(&mut self) {
        if let Some((matrix, clip)) = self.stack.pop() {
            self.matrix = matrix;
            self.clip = clip;
            self.commands.push(PaintCommand::Restore);
        }
    }

    fn matrix(&self) -> Matrix {
        self.matrix
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.matrix = *matrix;
        self.commands.push(PaintCommand::SetMatrix(*matrix));
    }

    fn clip_rect(&mut self, rect: Rect) {
        let mapped = self.matrix.map_rect(&rect);
        self.clip = Some(match self.clip {
            Some(clip) => clip.intersect(&mapped).unwrap_or(Rect::EMPTY),
            None => mapped,
        });
        self.commands.push(PaintCommand::ClipRect(rect));
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        let outset = paint.outset();
        self.accumulate(rect.inset(-outset, -outset));
        self.commands.push(PaintCommand::DrawRect {
            rect,
            paint: *paint,
        });
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        let outset = paint.outset();
        self.accumulate(path.bounds().inset(-outset, -outset));
        self.commands.push(PaintCommand::DrawPath {
            path: path.clone(),
            paint: *paint,
        });
    }

    fn draw_image(&mut self, image: &Image, origin: Point) {
        self.accumulate(image.bounds_at(origin));
        self.commands.push(PaintCommand::DrawImage {
            image: image.clone(),
            origin,
        });
    }
}

/// Offscreen surface that snapshots into command images
pub struct RecordingSurface {
    width: u32,
    height: u32,
    recorder: PictureRecorder,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            recorder: PictureRecorder::new(),
        }
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn renderer(&mut self) -> &mut dyn Renderer {
        &mut self.recorder
    }

    fn snapshot(&mut self) -> Image {
        Image::new(
            self.width,
            self.height,
            ImageData::Commands(self.recorder.commands().to_vec()),
        )
    }
}

/// Allocates [`RecordingSurface`]s and counts allocations
#[derive(Debug, Default)]
pub struct RecordingSurfaceProvider {
    allocated: usize,
    max_dimension: Option<u32>,
}

impl RecordingSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse surfaces larger than `max` in either dimension
    pub fn with_max_dimension(max: u32) -> Self {
        Self {
            allocated: 0,
            max_dimension: Some(max),
        }
    }

    /// Total surfaces handed out so far
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl SurfaceProvider for RecordingSurfaceProvider {
    fn make_surface(&mut self, width: u32, height: u32) -> Option<Box<dyn Surface>> {
        if width == 0 || height == 0 {
            return None;
        }
        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                tracing::debug!("refusing {}x{} recording surface (max {})", width, height, max);
                return None;
            }
        }
        self.allocated += 1;
        Some(Box::new(RecordingSurface::new(width, height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::picture::Picture;

    #[test]
    fn test_recorder_tracks_transformed_bounds() {
        let mut recorder = PictureRecorder::new();
        recorder.translate(10.0, 20.0);
        recorder.fill_rect(0.0, 0.0, 5.0, 5.0, Paint::fill(Color::RED));
        assert_eq!(recorder.bounds(), Rect::new(10.0, 20.0, 5.0, 5.0));
    }

    #[test]
    fn test_clip_limits_bounds() {
        let mut recorder = PictureRecorder::new();
        recorder.clip_rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        recorder.fill_rect(0.0, 0.0, 10.0, 10.0, Paint::default());
        assert_eq!(recorder.bounds(), Rect::new(0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn test_stroke_outset() {
        let mut recorder = PictureRecorder::new();
        recorder.draw_rect(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            &Paint::stroke(Color::BLACK, 2.0),
        );
        assert_eq!(recorder.bounds(), Rect::new(-1.0, -1.0, 12.0, 12.0));
    }

    #[test]
    fn test_path_bounds_are_recorded() {
        let mut recorder = PictureRecorder::new();
        let path = Path::polygon(&[Point::new(2.0, 2.0), Point::new(6.0, 2.0), Point::new(4.0, 8.0)]);
        recorder.draw_path(&path, &Paint::default());
        assert_eq!(recorder.bounds(), Rect::new(2.0, 2.0, 4.0, 6.0));
        assert_eq!(recorder.finish().commands().len(), 1);
    }

    #[test]
    fn test_replay_is_relative_to_base_matrix() {
        let mut source = PictureRecorder::new();
        source.translate(5.0, 0.0);
        source.fill_rect(0.0, 0.0, 1.0, 1.0, Paint::default());
        let picture = source.finish();

        let mut target = PictureRecorder::new();
        target.translate(100.0, 0.0);
        picture.playback(&mut target);
        assert_eq!(target.bounds(), Rect::new(105.0, 0.0, 1.0, 1.0));
        // Replay restores the caller's matrix
        assert_eq!(target.matrix(), Matrix::translation(100.0, 0.0));
    }

    #[test]
    fn test_unbalanced_restore_is_ignored() {
        let mut recorder = PictureRecorder::new();
        recorder.restore();
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_provider_refuses_degenerate_surfaces() {
        let mut provider = RecordingSurfaceProvider::with_max_dimension(64);
        assert!(provider.make_surface(0, 10).is_none());
        assert!(provider.make_surface(128, 10).is_none());
        assert!(provider.make_surface(64, 64).is_some());
        assert_eq!(provider.allocated(), 1);
    }
}
