//! Opaque paintable content
//!
//! The render graph never looks inside a picture. It only needs the local
//! bounds, a [`ContentToken`] that changes exactly when the picture would draw
//! different pixels, and a way to play it back into a [`Renderer`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::{Point, Rect};
use crate::recording::{replay, PaintCommand};
use crate::renderer::Renderer;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of a picture's visual output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentToken(u64);

impl ContentToken {
    /// Allocate a token that has never been handed out before
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Paintable content consumed by the render graph
pub trait Picture {
    /// Local-space bounds of everything the picture draws
    fn bounds(&self) -> Rect;

    /// Identity token; must change whenever the output changes
    fn token(&self) -> ContentToken;

    /// Draw into `renderer` using its current matrix and clip
    fn playback(&self, renderer: &mut dyn Renderer);

    /// Hit test in local coordinates
    fn contains(&self, point: Point) -> bool {
        self.bounds().contains(point)
    }
}

/// A picture backed by a recorded command list
#[derive(Clone, Debug)]
pub struct RecordedPicture {
    token: ContentToken,
    bounds: Rect,
    commands: Vec<PaintCommand>,
}

impl RecordedPicture {
    pub fn new(commands: Vec<PaintCommand>, bounds: Rect) -> Self {
        Self {
            token: ContentToken::next(),
            bounds,
            commands,
        }
    }

    pub fn commands(&self) -> &[PaintCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Picture for RecordedPicture {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn token(&self) -> ContentToken {
        self.token
    }

    fn playback(&self, renderer: &mut dyn Renderer) {
        replay(&self.commands, renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = ContentToken::next();
        let b = ContentToken::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_recorded_pictures_get_fresh_tokens() {
        let a = RecordedPicture::new(Vec::new(), Rect::EMPTY);
        let b = a.clone();
        let c = RecordedPicture::new(Vec::new(), Rect::EMPTY);
        assert_eq!(a.token(), b.token());
        assert_ne!(a.token(), c.token());
    }
}
