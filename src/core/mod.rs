//! Zonal statistics and tile rendering pipelines

pub mod color_ramp;
pub mod normalize;
pub mod processor;
pub mod rasterize;
pub mod reproject;
pub mod tile_render;
pub mod zonal_stats;

// Re-export main types
pub use color_ramp::{ColorRamp, ColorRampTable, Rgb};
pub use normalize::CoordinateNormalizer;
pub use processor::{AnalysisReport, GeospatialProcessor};
pub use rasterize::{RasterizeOptions, Rasterizer};
pub use reproject::CrsReprojector;
pub use tile_render::{TileLayerConfig, TileRenderer};
pub use zonal_stats::PolygonStatsExtractor;
