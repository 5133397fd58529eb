//! envraster: polygon zonal statistics and colorized tiles for environmental rasters
//!
//! This library extracts mean/min/max/std/count of GeoTIFF layers inside
//! user-drawn polygons (reprojecting and rasterizing as needed), and serves
//! single-band PNG tiles colorized through piecewise-linear color ramps.

pub mod config;
pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::config::{AppConfig, LayerConfig};
pub use crate::core::{
    AnalysisReport, ColorRamp, ColorRampTable, GeospatialProcessor, PolygonStatsExtractor,
    RasterizeOptions, TileRenderer,
};
pub use crate::io::{RasterReader, TileInfo, TileStore};
pub use crate::types::{
    BoundingBox, Crs, GeoTransform, Polygon, RasterError, RasterLayer, RasterResult,
    SelectionMask, TileCoord, ZonalStats,
};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::prelude::*;
    use pyo3::types::PyBytes;

    fn to_py_err(e: RasterError) -> PyErr {
        match e {
            RasterError::BadTileCoordinate(_) | RasterError::InvalidGeometry(_) => {
                PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
            }
            _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
        }
    }

    fn load_config(config_path: Option<String>) -> PyResult<AppConfig> {
        let config = match config_path {
            Some(path) => AppConfig::from_json_file(path).map_err(to_py_err)?,
            None => AppConfig::default(),
        };
        Ok(config.with_env_overrides())
    }

    fn parse_json(text: &str) -> PyResult<serde_json::Value> {
        serde_json::from_str(text)
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Invalid JSON: {}", e)))
    }

    fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
        serde_json::to_string(value).map_err(|e| to_py_err(e.into()))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyGeospatialProcessor>()?;
        m.add_class::<PyTileServer>()?;
        Ok(())
    }

    /// Python wrapper for GeospatialProcessor
    #[pyclass(name = "GeospatialProcessor")]
    struct PyGeospatialProcessor {
        inner: GeospatialProcessor,
    }

    #[pymethods]
    impl PyGeospatialProcessor {
        #[new]
        #[pyo3(signature = (config_path=None))]
        fn new(config_path: Option<String>) -> PyResult<Self> {
            let config = load_config(config_path)?;
            Ok(PyGeospatialProcessor {
                inner: GeospatialProcessor::new(config),
            })
        }

        /// Zonal statistics of every layer for a GeoJSON polygon, as JSON
        fn analyze_polygon(&self, py: Python, polygon_json: &str) -> PyResult<String> {
            let feature = parse_json(polygon_json)?;
            let report = py.allow_threads(|| self.inner.analyze(&feature));
            to_json(&report)
        }

        fn layer_bounds(&self) -> PyResult<String> {
            to_json(&self.inner.all_bounds())
        }

        fn layer_ids(&self) -> Vec<String> {
            self.inner.layer_ids().into_iter().map(String::from).collect()
        }

        /// Boolean pixel selection of a polygon on one layer's grid
        fn selection_mask(&self, py: Python, layer_id: &str, polygon_json: &str) -> PyResult<Py<PyArray2<bool>>> {
            let feature = parse_json(polygon_json)?;
            let polygon = self.inner.parse_polygon(&feature).map_err(to_py_err)?;
            let mask = self
                .inner
                .selection_mask(layer_id, &polygon)
                .ok_or_else(|| {
                    PyErr::new::<pyo3::exceptions::PyKeyError, _>(format!("Unknown layer: {}", layer_id))
                })?
                .map_err(to_py_err)?;
            Ok(mask.into_pyarray(py).to_owned())
        }
    }

    /// Python wrapper for TileRenderer
    #[pyclass(name = "TileServer")]
    struct PyTileServer {
        inner: TileRenderer,
    }

    #[pymethods]
    impl PyTileServer {
        #[new]
        #[pyo3(signature = (config_path=None))]
        fn new(config_path: Option<String>) -> PyResult<Self> {
            let config = load_config(config_path)?;
            Ok(PyTileServer {
                inner: TileRenderer::new(config),
            })
        }

        /// PNG bytes of a tile; ValueError on non-integer coordinates
        #[pyo3(signature = (layer, z, x, y, color_ramp=None))]
        fn render_tile<'py>(
            &self,
            py: Python<'py>,
            layer: &str,
            z: &PyAny,
            x: &PyAny,
            y: &PyAny,
            color_ramp: Option<&str>,
        ) -> PyResult<&'py PyBytes> {
            let (z, x, y) = (z.str()?.to_str()?, x.str()?.to_str()?, y.str()?.to_str()?);
            let bytes = py
                .allow_threads(|| self.inner.render_str(layer, z, x, y, color_ramp))
                .map_err(to_py_err)?;
            Ok(PyBytes::new(py, &bytes))
        }

        fn tile_info(&self, layer: &str) -> PyResult<String> {
            to_json(&self.inner.tile_info(layer))
        }

        fn tile_config(&self) -> PyResult<String> {
            to_json(&self.inner.tile_config())
        }

        fn color_ramps(&self) -> Vec<String> {
            self.inner.ramps().names().into_iter().map(String::from).collect()
        }
    }
}
