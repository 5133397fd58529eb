//! On-demand tile colorization
//!
//! Source tiles are single-band (or RGB) PNGs in a `layer/z/x/y.png` tree.
//! A tile requested with a color ramp other than the layer's own is reduced
//! to intensities, normalized with the layer's configured value range and
//! mapped through the ramp. Anything that goes wrong after the coordinates
//! have been parsed degrades to a transparent placeholder.

use crate::config::AppConfig;
use crate::core::color_ramp::{ColorRamp, ColorRampTable};
use crate::io::{TileInfo, TileStore};
use crate::types::{RasterResult, TileCoord};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::{Array2, Zip};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

/// Zoom range reported for layers without tiles
pub const DEFAULT_ZOOM_RANGE: (u32, u32) = (0, 18);

/// Tile catalog entry for one layer
#[derive(Debug, Clone, Serialize)]
pub struct TileLayerConfig {
    pub name: String,
    pub tile_url: String,
    pub available: bool,
    pub zoom_levels: Vec<u32>,
    pub min_zoom: u32,
    pub max_zoom: u32,
}

/// Renders colorized PNG tiles from the tile store
#[derive(Debug, Clone)]
pub struct TileRenderer {
    store: TileStore,
    ramps: Arc<ColorRampTable>,
    config: AppConfig,
}

impl TileRenderer {
    /// Renderer over `config.tiles_dir` using the built-in ramps
    pub fn new(config: AppConfig) -> Self {
        Self::with_ramps(config, Arc::new(ColorRampTable::builtin()))
    }

    pub fn with_ramps(config: AppConfig, ramps: Arc<ColorRampTable>) -> Self {
        Self {
            store: TileStore::new(&config.tiles_dir),
            ramps,
            config,
        }
    }

    pub fn ramps(&self) -> &ColorRampTable {
        &self.ramps
    }

    /// Render from raw path parameters. Only non-integer coordinates fail.
    pub fn render_str(
        &self,
        layer: &str,
        z: &str,
        x: &str,
        y: &str,
        color_ramp: Option<&str>,
    ) -> RasterResult<Vec<u8>> {
        let coord = TileCoord::parse(z, x, y)?;
        Ok(self.render(layer, &coord, color_ramp))
    }

    /// PNG bytes for a tile; never fails
    pub fn render(&self, layer: &str, coord: &TileCoord, color_ramp: Option<&str>) -> Vec<u8> {
        match self.try_render(layer, coord, color_ramp) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Error serving tile {}/{}: {}", layer, coord, e);
                self.placeholder_png()
            }
        }
    }

    fn try_render(&self, layer: &str, coord: &TileCoord, color_ramp: Option<&str>) -> RasterResult<Vec<u8>> {
        if !coord.in_pyramid() {
            log::debug!("Tile {}/{} is outside the tile pyramid", layer, coord);
            return Ok(self.placeholder_png());
        }
        let path = match self.store.tile_path(self.tile_dir(layer), coord) {
            Some(path) if path.is_file() => path,
            _ => return Ok(self.placeholder_png()),
        };

        let tile = self.store.load(&path)?;

        let ramp_name = self.ramps.resolve(color_ramp, layer);
        let ramp = Some(ramp_name)
            .filter(|name| *name != layer)
            .and_then(|name| self.ramps.get(name));

        match ramp {
            Some(ramp) => {
                let intensity = to_intensity(&tile);
                let (min, max) = self.config.value_range(layer);
                encode_png(&DynamicImage::ImageRgb8(colorize(&intensity, ramp, min, max)))
            }
            None => encode_png(&tile),
        }
    }

    fn placeholder_png(&self) -> Vec<u8> {
        encode_png(&transparent_tile(self.config.tile_size)).unwrap_or_default()
    }

    /// Tile directory of a layer, the layer id itself when not configured
    fn tile_dir<'a>(&'a self, layer: &'a str) -> &'a str {
        self.config
            .layers
            .get(layer)
            .map(|l| l.tile_path.as_str())
            .unwrap_or(layer)
    }

    /// Zoom levels and tile counts available for a layer
    pub fn tile_info(&self, layer: &str) -> TileInfo {
        self.store.tile_info(self.tile_dir(layer))
    }

    /// Tile catalog for every configured layer
    pub fn tile_config(&self) -> BTreeMap<String, TileLayerConfig> {
        self.config
            .layers
            .iter()
            .map(|(id, layer)| {
                let info = self.store.tile_info(&layer.tile_path);
                let entry = TileLayerConfig {
                    name: layer.name.clone(),
                    tile_url: layer.tile_url(),
                    available: info.available,
                    min_zoom: info.min_zoom.unwrap_or(DEFAULT_ZOOM_RANGE.0),
                    max_zoom: info.max_zoom.unwrap_or(DEFAULT_ZOOM_RANGE.1),
                    zoom_levels: info.zoom_levels,
                };
                (id.clone(), entry)
            })
            .collect()
    }
}

/// Fully transparent RGBA square
pub fn transparent_tile(size: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::new(size, size))
}

/// Single-channel intensity grid (rows, cols).
///
/// Gray images are taken as-is; color images are reduced with
/// 0.299 R + 0.587 G + 0.114 B.
pub fn to_intensity(image: &DynamicImage) -> Array2<f64> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    match image {
        DynamicImage::ImageLuma8(gray) => {
            Array2::from_shape_fn((height, width), |(r, c)| gray.get_pixel(c as u32, r as u32)[0] as f64)
        }
        DynamicImage::ImageLumaA8(gray) => {
            Array2::from_shape_fn((height, width), |(r, c)| gray.get_pixel(c as u32, r as u32)[0] as f64)
        }
        DynamicImage::ImageLuma16(gray) => {
            Array2::from_shape_fn((height, width), |(r, c)| gray.get_pixel(c as u32, r as u32)[0] as f64)
        }
        DynamicImage::ImageLumaA16(gray) => {
            Array2::from_shape_fn((height, width), |(r, c)| gray.get_pixel(c as u32, r as u32)[0] as f64)
        }
        _ => {
            let rgb = image.to_rgb8();
            Array2::from_shape_fn((height, width), |(r, c)| {
                let p = rgb.get_pixel(c as u32, r as u32);
                0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
            })
        }
    }
}

/// Map intensities through `ramp` after normalizing `[min, max]` onto `[0, 1]`
pub fn colorize(intensity: &Array2<f64>, ramp: &ColorRamp, min: f64, max: f64) -> RgbImage {
    let span = max - min;
    let normalize = |v: f64| {
        if span > 0.0 {
            ((v - min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    };

    #[cfg(feature = "parallel")]
    let colors = Zip::from(intensity).par_map_collect(|&v| ramp.color_at(normalize(v)));
    #[cfg(not(feature = "parallel"))]
    let colors = Zip::from(intensity).map_collect(|&v| ramp.color_at(normalize(v)));

    let (rows, cols) = colors.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        image::Rgb(colors[[y as usize, x as usize]])
    })
}

/// Encode an image as PNG
pub fn encode_png(image: &DynamicImage) -> RasterResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
