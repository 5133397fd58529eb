use crate::types::{RasterResult, TileCoord};
use image::DynamicImage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Inventory of the pre-rendered tiles of one layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileInfo {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zoom_levels: Vec<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tile_counts: BTreeMap<u32, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u32>,
}

impl TileInfo {
    fn unavailable(message: String) -> Self {
        Self {
            available: false,
            message: Some(message),
            zoom_levels: Vec::new(),
            tile_counts: BTreeMap::new(),
            min_zoom: None,
            max_zoom: None,
        }
    }
}

/// `layer/z/x/y.png` tile hierarchy on disk
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Expected location of a tile, `None` when the address cannot name a file
    pub fn tile_path(&self, layer: &str, coord: &TileCoord) -> Option<PathBuf> {
        if !is_safe_layer_name(layer) || coord.z < 0 || coord.x < 0 || coord.y < 0 {
            return None;
        }
        Some(
            self.root
                .join(layer)
                .join(coord.z.to_string())
                .join(coord.x.to_string())
                .join(format!("{}.png", coord.y)),
        )
    }

    /// Decode a tile image; the file handle is closed before returning
    pub fn load(&self, path: &Path) -> RasterResult<DynamicImage> {
        Ok(image::open(path)?)
    }

    /// Scan the zoom directories of a layer and count tiles per zoom
    pub fn tile_info(&self, layer: &str) -> TileInfo {
        let layer_dir = self.root.join(layer);
        if !is_safe_layer_name(layer) || !layer_dir.is_dir() {
            return TileInfo::unavailable(format!("No tiles found for layer: {}", layer));
        }

        let mut zoom_levels: Vec<u32> = WalkDir::new(&layer_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().and_then(parse_zoom_dir))
            .collect();

        if zoom_levels.is_empty() {
            return TileInfo::unavailable(format!(
                "No valid tile structure found for layer: {}",
                layer
            ));
        }
        zoom_levels.sort_unstable();

        let tile_counts = zoom_levels
            .iter()
            .map(|&zoom| {
                // zoom/x/y.png
                let count = WalkDir::new(layer_dir.join(zoom.to_string()))
                    .min_depth(2)
                    .max_depth(2)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_name().to_string_lossy().ends_with(".png"))
                    .count();
                (zoom, count)
            })
            .collect();

        log::debug!("Layer '{}' has tiles at zoom levels {:?}", layer, zoom_levels);

        TileInfo {
            available: true,
            message: None,
            min_zoom: zoom_levels.first().copied(),
            max_zoom: zoom_levels.last().copied(),
            zoom_levels,
            tile_counts,
        }
    }
}

/// Zoom directories are named by plain decimal digits
fn parse_zoom_dir(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Layer names map to one directory level below the tile root
fn is_safe_layer_name(layer: &str) -> bool {
    !layer.is_empty()
        && layer != "."
        && layer != ".."
        && !layer.contains(['/', '\\'])
        && !layer.contains("..")
}
