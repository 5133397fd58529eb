//! Layer catalog and data directory configuration

use crate::types::{RasterError, RasterResult, GEOGRAPHIC_CRS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the GeoTIFF directory
pub const GEOTIFF_DIR_ENV: &str = "ENVRASTER_GEOTIFF_DIR";
/// Environment variable overriding the tile directory
pub const TILES_DIR_ENV: &str = "ENVRASTER_TILES_DIR";

/// Value range assumed for layers missing from the catalog
pub const FALLBACK_VALUE_RANGE: (f64, f64) = (0.0, 1.0);

/// Static description of one raster layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub description: String,
    /// File name under `geotiff_dir`
    pub geotiff_file: String,
    /// Directory name under `tiles_dir`
    pub tile_path: String,
    pub color_scheme: String,
    /// Lower bound used when normalizing tile intensities
    pub min_value: f64,
    /// Upper bound used when normalizing tile intensities
    pub max_value: f64,
}

impl LayerConfig {
    fn new(
        name: &str,
        description: &str,
        id: &str,
        color_scheme: &str,
        min_value: f64,
        max_value: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            geotiff_file: format!("{}.tif", id),
            tile_path: id.to_string(),
            color_scheme: color_scheme.to_string(),
            min_value,
            max_value,
        }
    }

    pub fn tile_url(&self) -> String {
        format!("/tiles/{}/{{z}}/{{x}}/{{y}}.png", self.tile_path)
    }
}

/// Public description of a layer, as listed to map clients
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub description: String,
    pub color_scheme: String,
    pub min_value: f64,
    pub max_value: f64,
    pub tile_path: String,
    pub tile_url: String,
}

/// Process-wide configuration, built once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub geotiff_dir: PathBuf,
    pub tiles_dir: PathBuf,
    /// CRS assumed for incoming polygons
    pub default_crs: String,
    pub max_polygon_vertices: usize,
    pub tile_size: u32,
    pub layers: BTreeMap<String, LayerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let layers = [
            ("ndvi", LayerConfig::new("NDVI", "Normalized Difference Vegetation Index", "ndvi", "greens", -1.0, 1.0)),
            ("ndbi", LayerConfig::new("NDBI", "Normalized Difference Built-up Index", "ndbi", "reds", -1.0, 1.0)),
            ("lst", LayerConfig::new("LST", "Land Surface Temperature", "lst", "hot", 20.0, 50.0)),
            ("ntl", LayerConfig::new("NTL", "Night Time Lights", "ntl", "viridis", 0.0, 255.0)),
            (
                "vulnerability",
                LayerConfig::new(
                    "Human Settlement Vulnerability",
                    "Human Settlement Vulnerability Index",
                    "vulnerability",
                    "plasma",
                    0.0,
                    1.0,
                ),
            ),
        ]
        .into_iter()
        .map(|(id, layer)| (id.to_string(), layer))
        .collect();

        Self {
            geotiff_dir: PathBuf::from("data/geotiffs"),
            tiles_dir: PathBuf::from("tiles"),
            default_crs: GEOGRAPHIC_CRS.to_string(),
            max_polygon_vertices: 1000,
            tile_size: 256,
            layers,
        }
    }
}

impl AppConfig {
    /// Default catalog rooted at the given data directories
    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(geotiff_dir: P, tiles_dir: Q) -> Self {
        Self {
            geotiff_dir: geotiff_dir.as_ref().to_path_buf(),
            tiles_dir: tiles_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> RasterResult<Self> {
        log::info!("Loading configuration from: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ENVRASTER_GEOTIFF_DIR` / `ENVRASTER_TILES_DIR` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(GEOTIFF_DIR_ENV) {
            log::debug!("{} overrides geotiff_dir", GEOTIFF_DIR_ENV);
            self.geotiff_dir = PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os(TILES_DIR_ENV) {
            log::debug!("{} overrides tiles_dir", TILES_DIR_ENV);
            self.tiles_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> RasterResult<()> {
        if self.max_polygon_vertices < 4 {
            return Err(RasterError::Config(format!(
                "max_polygon_vertices must be at least 4, got {}",
                self.max_polygon_vertices
            )));
        }
        if self.tile_size == 0 {
            return Err(RasterError::Config("tile_size must be positive".to_string()));
        }
        for (id, layer) in &self.layers {
            if id.trim().is_empty() {
                return Err(RasterError::Config("layer id must not be empty".to_string()));
            }
            if !(layer.max_value > layer.min_value) {
                return Err(RasterError::Config(format!(
                    "layer '{}' has an empty value range [{}, {}]",
                    id, layer.min_value, layer.max_value
                )));
            }
        }
        Ok(())
    }

    /// Known value range of a layer, `(0, 1)` when unknown
    pub fn value_range(&self, layer_id: &str) -> (f64, f64) {
        self.layers
            .get(layer_id)
            .map(|layer| (layer.min_value, layer.max_value))
            .unwrap_or(FALLBACK_VALUE_RANGE)
    }

    pub fn geotiff_path(&self, layer_id: &str) -> Option<PathBuf> {
        self.layers
            .get(layer_id)
            .map(|layer| self.geotiff_dir.join(&layer.geotiff_file))
    }

    pub fn layer_catalog(&self) -> BTreeMap<String, LayerSummary> {
        self.layers
            .iter()
            .map(|(id, layer)| {
                let summary = LayerSummary {
                    name: layer.name.clone(),
                    description: layer.description.clone(),
                    color_scheme: layer.color_scheme.clone(),
                    min_value: layer.min_value,
                    max_value: layer.max_value,
                    tile_path: layer.tile_path.clone(),
                    tile_url: layer.tile_url(),
                };
                (id.clone(), summary)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layers.len(), 5);
        assert_eq!(config.value_range("lst"), (20.0, 50.0));
        assert_eq!(config.value_range("ndvi"), (-1.0, 1.0));
        assert_eq!(config.value_range("ntl"), (0.0, 255.0));
        assert_eq!(config.value_range("unknown"), FALLBACK_VALUE_RANGE);
    }

    #[test]
    fn test_layer_catalog_urls() {
        let catalog = AppConfig::default().layer_catalog();
        assert_eq!(catalog["ndvi"].tile_url, "/tiles/ndvi/{z}/{x}/{y}.png");
        assert_eq!(catalog["vulnerability"].name, "Human Settlement Vulnerability");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"tiles_dir": "/srv/tiles", "max_polygon_vertices": 50}"#).unwrap();
        assert_eq!(config.tiles_dir, PathBuf::from("/srv/tiles"));
        assert_eq!(config.max_polygon_vertices, 50);
        assert_eq!(config.layers.len(), 5);
        assert_eq!(config.default_crs, GEOGRAPHIC_CRS);
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let mut config = AppConfig::default();
        if let Some(layer) = config.layers.get_mut("lst") {
            layer.max_value = layer.min_value;
        }
        assert!(matches!(config.validate(), Err(RasterError::Config(_))));
    }

    #[test]
    fn test_geotiff_path() {
        let config = AppConfig::with_dirs("/data/geotiffs", "/data/tiles");
        assert_eq!(
            config.geotiff_path("ntl"),
            Some(PathBuf::from("/data/geotiffs/ntl.tif"))
        );
        assert_eq!(config.geotiff_path("missing"), None);
    }
}
