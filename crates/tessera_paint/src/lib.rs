//! Tessera Paint
//!
//! The drawing vocabulary shared by the Tessera render graph and its
//! backends:
//!
//! - **Geometry**: points, sizes, rectangles and 3x3 affine matrices
//! - **Pictures**: opaque paintable content with bounds and a content token
//! - **Renderers**: a save/restore canvas interface implemented by backends
//! - **Surfaces**: offscreen targets snapshotted into immutable images
//!
//! Two backends ship with the crate: a command recorder (used for picture
//! capture and as a test double) and a tiny-skia pixmap renderer.

pub mod color;
pub mod geometry;
pub mod image;
pub mod path;
pub mod picture;
pub mod pixmap;
pub mod recording;
pub mod renderer;

pub use color::Color;
pub use geometry::{Matrix, Point, Rect, Size};
pub use image::{Image, ImageData, Surface, SurfaceProvider};
pub use path::{Path, PathCommand};
pub use picture::{ContentToken, Picture, RecordedPicture};
pub use pixmap::{PixmapRenderer, PixmapSurface, PixmapSurfaceProvider};
pub use recording::{replay, PaintCommand, PictureRecorder, RecordingSurface, RecordingSurfaceProvider};
pub use renderer::{Paint, PaintStyle, Renderer};
