//! GeoTIFF writing for sample layers and fixtures

use crate::config::AppConfig;
use crate::types::{BoundingBox, Crs, GeoTransform, RasterError, RasterResult};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Footprint of the generated sample layers
pub const SAMPLE_BOUNDS: BoundingBox = BoundingBox {
    min_x: -119.5,
    min_y: 36.0,
    max_x: -119.0,
    max_y: 36.5,
};

/// Sample grid shape (rows, cols)
pub const SAMPLE_SHAPE: (usize, usize) = (100, 100);

/// Write a single-band Float32 GeoTIFF
pub fn write_geotiff<P: AsRef<Path>>(
    output_path: P,
    data: &Array2<f32>,
    transform: &GeoTransform,
    crs: &Crs,
    nodata: Option<f64>,
) -> RasterResult<()> {
    log::debug!("Writing GeoTIFF: {}", output_path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = data.dim();

    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        gdal_dim(width)?,
        gdal_dim(height)?,
        1,
    )?;

    dataset.set_geo_transform(&transform.to_gdal())?;
    let srs = SpatialRef::from_definition(crs.as_str())
        .map_err(|e| RasterError::Reprojection(format!("unknown CRS '{}': {}", crs, e)))?;
    dataset.set_spatial_ref(&srs)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<f32> = data.iter().cloned().collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    if nodata.is_some() {
        rasterband.set_no_data_value(nodata)?;
    }

    Ok(())
}

/// Write one sample GeoTIFF per configured layer into `output_dir`.
///
/// Values sweep the layer's configured range in a smooth, deterministic pattern.
pub fn create_sample_layers<P: AsRef<Path>>(
    output_dir: P,
    config: &AppConfig,
) -> RasterResult<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let (rows, cols) = SAMPLE_SHAPE;
    let transform = GeoTransform::from_bounds(&SAMPLE_BOUNDS, cols, rows);
    let crs = Crs::geographic();

    let mut written = Vec::with_capacity(config.layers.len());
    for (id, layer) in &config.layers {
        let (min_value, max_value) = (layer.min_value, layer.max_value);
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let u = (r as f64 * 0.37).sin() * (c as f64 * 0.23).cos();
            let t = 0.5 + 0.5 * u;
            (min_value + t * (max_value - min_value)) as f32
        });

        let path = output_dir.join(&layer.geotiff_file);
        log::info!("Creating sample layer '{}' at {}", id, path.display());
        write_geotiff(&path, &data, &transform, &crs, None)?;
        written.push(path);
    }

    Ok(written)
}

/// GDAL's raster size parameter type differs between binding versions
fn gdal_dim<T: TryFrom<usize>>(value: usize) -> RasterResult<T> {
    T::try_from(value)
        .map_err(|_| RasterError::Processing(format!("raster dimension {} out of range", value)))
}
