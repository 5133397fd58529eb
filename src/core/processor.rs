use crate::config::AppConfig;
use crate::core::rasterize::RasterizeOptions;
use crate::core::zonal_stats::PolygonStatsExtractor;
use crate::io::RasterReader;
use crate::types::{BoundingBox, Crs, Polygon, RasterLayer, RasterResult, SelectionMask, ZonalStats};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of analysing one polygon against every configured layer
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// The polygon as submitted
    pub polygon: Value,
    /// RFC 3339 completion time
    pub timestamp: String,
    pub layers: BTreeMap<String, ZonalStats>,
}

/// Registry of raster layers plus the zonal statistics extractor
pub struct GeospatialProcessor {
    config: AppConfig,
    layers: BTreeMap<String, RasterLayer>,
    extractor: PolygonStatsExtractor,
}

impl GeospatialProcessor {
    /// Register every configured layer whose GeoTIFF can be opened
    pub fn new(config: AppConfig) -> Self {
        let mut layers = BTreeMap::new();
        for id in config.layers.keys() {
            let path = match config.geotiff_path(id) {
                Some(path) => path,
                None => continue,
            };
            if !path.exists() {
                log::warn!("GeoTIFF file not found: {}", path.display());
                continue;
            }
            match RasterReader::open_layer(id, &path) {
                Ok(layer) => {
                    layers.insert(id.clone(), layer);
                }
                Err(e) => log::warn!("Skipping layer '{}': {}", id, e),
            }
        }
        log::info!("Loaded {} of {} raster layers", layers.len(), config.layers.len());

        Self {
            config,
            layers,
            extractor: PolygonStatsExtractor::new(),
        }
    }

    /// Use a different pixel selection rule
    pub fn with_rasterize_options(mut self, options: RasterizeOptions) -> Self {
        self.extractor = PolygonStatsExtractor::with_options(options);
        self
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }

    /// Parse a GeoJSON polygon using the configured vertex limit and default CRS
    pub fn parse_polygon(&self, feature: &Value) -> RasterResult<Polygon> {
        let mut polygon = Polygon::from_geojson(feature, self.config.max_polygon_vertices)?;
        if feature.get("crs").is_none() {
            polygon.crs = Crs::new(self.config.default_crs.as_str());
        }
        Ok(polygon)
    }

    /// Per-layer extraction outcome, one entry per registered layer
    pub fn extract_all(&self, polygon: &Polygon) -> BTreeMap<String, RasterResult<ZonalStats>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.layers
                .par_iter()
                .map(|(id, layer)| (id.clone(), self.extractor.try_extract(layer, polygon)))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.layers
                .iter()
                .map(|(id, layer)| (id.clone(), self.extractor.try_extract(layer, polygon)))
                .collect()
        }
    }

    /// Zonal statistics for every layer; failures become error-annotated null stats
    pub fn process_all_layers(&self, polygon: &Polygon) -> BTreeMap<String, ZonalStats> {
        self.extract_all(polygon)
            .into_iter()
            .map(|(id, result)| {
                let stats = result.unwrap_or_else(|e| {
                    log::warn!("Error processing layer '{}': {}", id, e);
                    ZonalStats::failed(&e)
                });
                (id, stats)
            })
            .collect()
    }

    /// Analyse a GeoJSON polygon. An unparseable polygon fails every layer, not the call.
    pub fn analyze(&self, feature: &Value) -> AnalysisReport {
        let layers = match self.parse_polygon(feature) {
            Ok(polygon) => self.process_all_layers(&polygon),
            Err(e) => {
                log::warn!("Rejected polygon: {}", e);
                self.layers
                    .keys()
                    .map(|id| (id.clone(), ZonalStats::failed(&e)))
                    .collect()
            }
        };

        AnalysisReport {
            polygon: feature.clone(),
            timestamp: Utc::now().to_rfc3339(),
            layers,
        }
    }

    /// Boolean selection grid of `polygon` on the grid of one layer
    pub fn selection_mask(&self, layer_id: &str, polygon: &Polygon) -> Option<RasterResult<SelectionMask>> {
        self.layers
            .get(layer_id)
            .map(|layer| self.extractor.selection_mask(layer, polygon))
    }

    /// West/south/east/north extent of a layer in its own CRS
    pub fn layer_bounds(&self, layer_id: &str) -> Option<BoundingBox> {
        self.layers.get(layer_id).map(RasterLayer::bounds)
    }

    pub fn all_bounds(&self) -> BTreeMap<String, Option<BoundingBox>> {
        self.layers
            .keys()
            .map(|id| (id.clone(), self.layer_bounds(id)))
            .collect()
    }
}
