use crate::core::normalize::CoordinateNormalizer;
use crate::core::rasterize::{RasterizeOptions, Rasterizer};
use crate::core::reproject::CrsReprojector;
use crate::io::RasterReader;
use crate::types::{Polygon, RasterError, RasterGrid, RasterLayer, RasterResult, SelectionMask, ZonalStats};
use ndarray::Zip;

/// Polygon-to-raster zonal statistics extractor
#[derive(Debug, Clone, Default)]
pub struct PolygonStatsExtractor {
    options: RasterizeOptions,
}

impl PolygonStatsExtractor {
    /// Create an extractor selecting pixels by centre
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with a custom selection rule
    pub fn with_options(options: RasterizeOptions) -> Self {
        Self { options }
    }

    /// Statistics of `layer` inside `polygon`.
    ///
    /// Never fails: any error is folded into a null result carrying the message.
    pub fn extract(&self, layer: &RasterLayer, polygon: &Polygon) -> ZonalStats {
        match self.try_extract(layer, polygon) {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("Extraction failed for layer '{}': {}", layer.id, e);
                ZonalStats::failed(&e)
            }
        }
    }

    /// Statistics of `layer` inside `polygon`, surfacing the failure cause
    pub fn try_extract(&self, layer: &RasterLayer, polygon: &Polygon) -> RasterResult<ZonalStats> {
        log::debug!(
            "Processing layer '{}' ({}x{}, CRS {})",
            layer.id,
            layer.rows,
            layer.cols,
            layer.crs
        );

        // an unreadable raster is reported even when the polygon misses it
        let data = RasterReader::read_band(layer)?;

        let mask = self.selection_mask(layer, polygon)?;
        let selected = mask.iter().filter(|&&v| v).count();
        log::debug!("Mask created, {} pixels selected", selected);
        if selected == 0 {
            return Ok(ZonalStats::empty());
        }

        let stats = summarize_masked(&data, &mask, layer)?;
        log::debug!("Layer '{}': {} valid pixels", layer.id, stats.count);
        Ok(stats)
    }

    /// Normalize, reproject and rasterize `polygon` onto the grid of `layer`
    pub fn selection_mask(&self, layer: &RasterLayer, polygon: &Polygon) -> RasterResult<SelectionMask> {
        let mut polygon = CoordinateNormalizer::normalize(polygon);

        if !CrsReprojector::same_crs(&polygon.crs, &layer.crs)? {
            polygon = CrsReprojector::reproject(&polygon, &layer.crs)?;
        }

        Rasterizer::rasterize(&polygon, &layer.transform, layer.shape(), self.options)
    }
}

/// Statistics over the masked cells of `data` that are neither NaN nor nodata
pub fn summarize_masked(
    data: &RasterGrid,
    mask: &SelectionMask,
    layer: &RasterLayer,
) -> RasterResult<ZonalStats> {
    if data.dim() != mask.dim() {
        return Err(RasterError::Processing(format!(
            "mask shape {:?} does not match raster shape {:?}",
            mask.dim(),
            data.dim()
        )));
    }

    let mut values = Vec::new();
    Zip::from(data).and(mask).for_each(|&value, &selected| {
        if selected && layer.is_valid(value) {
            values.push(value);
        }
    });

    Ok(summarize(&values))
}

/// Mean, min, max, population standard deviation and count of `values`
pub fn summarize(values: &[f64]) -> ZonalStats {
    if values.is_empty() {
        return ZonalStats::empty();
    }

    let n = values.len() as f64;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = sum / n;
    // population variance, second pass around the mean
    let variance = values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;

    ZonalStats {
        mean: Some(mean),
        min: Some(min),
        max: Some(max),
        std: Some(variance.sqrt()),
        count: values.len(),
        error: None,
    }
}
