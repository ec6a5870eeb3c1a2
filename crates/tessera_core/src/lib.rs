//! Tessera Core
//!
//! A retained-mode render graph for a 2D design canvas:
//!
//! - **Ownership**: nodes live in an arena, held by counted strong [`Ref`]s
//!   and observed through generational [`WeakRef`]s
//! - **Invalidation**: changes are pushed up to every observer; damage is
//!   absorbed by the first node that knows where it lands on screen
//! - **Revalidation**: bounds are pulled bottom-up once per frame while
//!   damaged regions collect in a [`DamageAccumulator`]
//! - **Transforms**: plain matrices, composition, device pixel ratio and
//!   pan/zoom, all concatenated into the device transform
//! - **Tile caching**: rasterized tiles survive until content, zoom or the
//!   viewport change, and are reused where possible
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera_core::{render_frame, RenderGraph};
//! use tessera_paint::{Color, Matrix, Paint, PictureRecorder};
//!
//! let mut graph = RenderGraph::new();
//! let mut recorder = PictureRecorder::new();
//! recorder.fill_rect(0.0, 0.0, 10.0, 10.0, Paint::fill(Color::RED));
//!
//! let leaf = graph.create_picture(Some(Arc::new(recorder.finish())));
//! let transform = graph.create_matrix(Matrix::translation(5.0, 5.0));
//! let effect = graph.create_transform_effect(transform, leaf);
//!
//! let mut target = PictureRecorder::new();
//! let report = render_frame(&mut graph, effect.id(), &mut target);
//! assert_eq!(report.bounds.width(), 10.0);
//! graph.release(effect);
//! ```

pub mod config;
pub mod content;
pub mod damage;
pub mod driver;
pub mod effect;
pub mod error;
pub mod frame;
pub mod graph;
pub mod node;
pub mod raster;
pub mod refs;
pub mod tile_cache;
pub mod transform;
pub mod viewport;
pub mod zoomer;

pub use config::{RasterConfig, RenderConfig, SurfaceConfig, ViewportConfig, ZoomConfig};
pub use content::PictureNode;
pub use damage::{merge_rects, subtract, DamageAccumulator};
pub use driver::{render_frame, FrameReport};
pub use effect::TransformEffect;
pub use error::{ConfigError, GraphError, Result};
pub use frame::{Frame, Scene};
pub use graph::RenderGraph;
pub use node::{KindTag, NodeKind, NodeState, NodeTraits};
pub use raster::{RasterContext, RasterOutput, Rasterizer, Tile, TileRasterizer, DEFAULT_TILE_SIZE};
pub use refs::{NodeId, Ref, WeakRef};
pub use tile_cache::{classify, DamageReason, TileCache, TileCacheStats};
pub use transform::{Concat, MatrixTransform};
pub use viewport::Viewport;
pub use zoomer::{ZoomMode, Zoomer, MAX_SCALE, MIN_SCALE, ZOOM_LEVELS};
