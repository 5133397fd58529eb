use crate::types::{Crs, GeoTransform, RasterError, RasterGrid, RasterLayer, RasterResult};
use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// GeoTIFF reader for single-band raster layers.
///
/// Every call opens its own dataset handle and drops it before returning.
pub struct RasterReader;

impl RasterReader {
    /// Read layer metadata (CRS, geotransform, shape, nodata) without touching pixel data
    pub fn open_layer<P: AsRef<Path>>(id: &str, path: P) -> RasterResult<RasterLayer> {
        let path = path.as_ref();
        log::debug!("Opening raster layer '{}' from: {}", id, path.display());

        let dataset = Self::open_dataset(path)?;
        let geo_transform = dataset
            .geo_transform()
            .map_err(|e| RasterError::RasterRead(format!("{}: no geotransform ({})", path.display(), e)))?;
        let (cols, rows) = dataset.raster_size();

        if dataset.raster_count() < 1 {
            return Err(RasterError::RasterRead(format!("{}: raster has no bands", path.display())));
        }
        let band = dataset.rasterband(1)?;
        let nodata = band.no_data_value();

        let crs = match dataset.spatial_ref() {
            Ok(srs) => crs_from_spatial_ref(&srs)?,
            Err(e) => {
                log::warn!(
                    "{}: no CRS recorded ({}), assuming {}",
                    path.display(),
                    e,
                    Crs::geographic()
                );
                Crs::geographic()
            }
        };

        log::debug!(
            "Layer '{}': {}x{} pixels, CRS {}, nodata {:?}",
            id,
            cols,
            rows,
            crs,
            nodata
        );

        Ok(RasterLayer {
            id: id.to_string(),
            path: path.to_path_buf(),
            crs,
            transform: GeoTransform::from_gdal(&geo_transform),
            rows,
            cols,
            nodata,
        })
    }

    /// Read the first band of a layer into memory
    pub fn read_band(layer: &RasterLayer) -> RasterResult<RasterGrid> {
        let dataset = Self::open_dataset(&layer.path)?;
        let (cols, rows) = dataset.raster_size();
        if (rows, cols) != layer.shape() {
            return Err(RasterError::RasterRead(format!(
                "{}: shape changed from {:?} to {:?} since the layer was loaded",
                layer.path.display(),
                layer.shape(),
                (rows, cols)
            )));
        }

        let rasterband = dataset.rasterband(1)?;
        let band_data = rasterband
            .read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)
            .map_err(|e| RasterError::RasterRead(format!("{}: {}", layer.path.display(), e)))?;

        Array2::from_shape_vec((rows, cols), band_data.data)
            .map_err(|e| RasterError::Processing(format!("Failed to reshape band data: {}", e)))
    }

    fn open_dataset(path: &Path) -> RasterResult<Dataset> {
        if !path.exists() {
            return Err(RasterError::RasterRead(format!("{}: file not found", path.display())));
        }
        Dataset::open(path)
            .map_err(|e| RasterError::RasterRead(format!("{}: {}", path.display(), e)))
    }
}

/// Prefer an `AUTHORITY:CODE` identifier, falling back to WKT
fn crs_from_spatial_ref(srs: &SpatialRef) -> RasterResult<Crs> {
    if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code()) {
        return Ok(Crs::new(format!("{}:{}", name, code)));
    }
    Ok(Crs::new(srs.to_wkt()?))
}
