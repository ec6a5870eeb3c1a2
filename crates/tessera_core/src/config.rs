//! Renderer configuration (tessera.toml)

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_paint::SurfaceProvider;

use crate::error::ConfigError;
use crate::raster::{TileRasterizer, DEFAULT_TILE_SIZE};
use crate::viewport::Viewport;
use crate::zoomer::{ZoomMode, Zoomer, MAX_SCALE, MIN_SCALE};

/// Top-level renderer configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub raster: RasterConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Initial pan/zoom behaviour
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ZoomConfig {
    #[serde(default)]
    pub mode: ZoomMode,
    #[serde(default = "default_scale")]
    pub initial_scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            mode: ZoomMode::default(),
            initial_scale: default_scale(),
        }
    }
}

/// Drawable surface
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ViewportConfig {
    #[serde(default = "default_ratio")]
    pub device_pixel_ratio: f32,
    /// Width in device pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Height in device pixels
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_ratio() -> f32 {
    1.0
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: default_ratio(),
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RasterConfig {
    /// Tile edge length in device pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
        }
    }
}

/// Offscreen surface hints passed through to backends
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    #[serde(default = "default_stencil_bits")]
    pub stencil_bits: u32,
}

fn default_sample_count() -> u32 {
    1
}

fn default_stencil_bits() -> u32 {
    8
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            stencil_bits: default_stencil_bits(),
        }
    }
}

impl RenderConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale = self.zoom.initial_scale;
        if !scale.is_finite() || scale <= MIN_SCALE || scale >= MAX_SCALE {
            return Err(ConfigError::Invalid {
                field: "zoom.initial_scale",
                reason: format!("{} is outside ({}, {})", scale, MIN_SCALE, MAX_SCALE),
            });
        }
        let ratio = self.viewport.device_pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "viewport.device_pixel_ratio",
                reason: format!("{} is not a positive number", ratio),
            });
        }
        if self.raster.tile_size == 0 {
            return Err(ConfigError::Invalid {
                field: "raster.tile_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Zoomer at the configured mode and initial scale
    pub fn zoomer(&self) -> Zoomer {
        let mut zoomer = Zoomer::new(self.zoom.mode);
        zoomer.set_scale(self.zoom.initial_scale, tessera_paint::Point::ZERO);
        zoomer
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(
            self.viewport.width as f32,
            self.viewport.height as f32,
            self.viewport.device_pixel_ratio,
        )
    }

    pub fn rasterizer(&self, provider: Box<dyn SurfaceProvider>) -> TileRasterizer {
        TileRasterizer::new(self.raster.tile_size, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.raster.tile_size, 256);
    }

    #[test]
    fn test_partial_sections() {
        let config = RenderConfig::from_toml_str(
            r#"
            [zoom]
            mode = "discrete"
            initial_scale = 2.0

            [viewport]
            device_pixel_ratio = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.zoom.mode, ZoomMode::Discrete);
        assert_eq!(config.viewport.width, 800);
        assert_eq!(config.zoomer().scale(), 2.0);
        assert_eq!(config.viewport().matrix(), tessera_paint::Matrix::scale(2.0, 2.0));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RenderConfig::from_toml_str("[zoom]\ninitial_scale = 150.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zoom.initial_scale", .. }));

        let err = RenderConfig::from_toml_str("[raster]\ntile_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "raster.tile_size", .. }));

        let err = RenderConfig::from_toml_str("[viewport\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RenderConfig::load(Path::new("/nonexistent/tessera.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
