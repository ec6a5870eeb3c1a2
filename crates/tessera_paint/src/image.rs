//! Raster images and the surfaces that produce them

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::geometry::{Point, Rect, Size};
use crate::recording::PaintCommand;
use crate::renderer::Renderer;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Backing store of an [`Image`]
pub enum ImageData {
    /// Real pixels produced by the CPU backend
    Pixels(tiny_skia::Pixmap),
    /// A command snapshot produced by the recording backend
    Commands(Vec<PaintCommand>),
}

/// An immutable, cheaply clonable raster image
#[derive(Clone)]
pub struct Image {
    id: u64,
    width: u32,
    height: u32,
    data: Arc<ImageData>,
}

impl Image {
    pub fn new(width: u32, height: u32, data: ImageData) -> Self {
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            data: Arc::new(data),
        }
    }

    pub fn from_pixmap(pixmap: tiny_skia::Pixmap) -> Self {
        let (width, height) = (pixmap.width(), pixmap.height());
        Self::new(width, height, ImageData::Pixels(pixmap))
    }

    /// Unique identity of this snapshot
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    /// Rect covered by the image when drawn at `origin`
    pub fn bounds_at(&self, origin: Point) -> Rect {
        Rect::from_origin_size(origin, self.size())
    }

    pub fn data(&self) -> &ImageData {
        &self.data
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match *self.data {
            ImageData::Pixels(_) => "pixels",
            ImageData::Commands(_) => "commands",
        };
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("kind", &kind)
            .finish()
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// An offscreen render target that can be snapshotted into an [`Image`]
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn renderer(&mut self) -> &mut dyn Renderer;

    /// Capture the current contents
    fn snapshot(&mut self) -> Image;
}

/// Allocates offscreen surfaces for tile rasterization
pub trait SurfaceProvider {
    /// Create a surface, or `None` if one of that size cannot be allocated
    fn make_surface(&mut self, width: u32, height: u32) -> Option<Box<dyn Surface>>;
}
