//! I/O modules for reading raster layers and tile images

pub mod raster;
pub mod sample_data;
pub mod tiles;

pub use raster::RasterReader;
pub use tiles::{TileInfo, TileStore};
