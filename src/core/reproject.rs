use crate::types::{Crs, Polygon, RasterError, RasterResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};

/// Polygon reprojection between coordinate reference systems.
///
/// All CRS math goes through GDAL/PROJ; coordinates are always handled in
/// (x, y) = (easting/lng, northing/lat) order regardless of authority axis order.
pub struct CrsReprojector;

impl CrsReprojector {
    /// Resolve a CRS definition with traditional GIS axis order
    pub fn spatial_ref(crs: &Crs) -> RasterResult<SpatialRef> {
        let srs = SpatialRef::from_definition(crs.as_str())
            .map_err(|e| RasterError::Reprojection(format!("unrecognized CRS '{}': {}", crs, e)))?;
        srs.set_axis_mapping_strategy(
            gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
        );
        Ok(srs)
    }

    /// Whether two definitions name the same CRS
    pub fn same_crs(a: &Crs, b: &Crs) -> RasterResult<bool> {
        if a.same_definition(b) {
            return Ok(true);
        }
        Ok(Self::spatial_ref(a)? == Self::spatial_ref(b)?)
    }

    /// Transform every ring of `polygon` into `target`
    pub fn reproject(polygon: &Polygon, target: &Crs) -> RasterResult<Polygon> {
        log::debug!("Transforming polygon from {} to {}", polygon.crs, target);

        let source_srs = Self::spatial_ref(&polygon.crs)?;
        let target_srs = Self::spatial_ref(target)?;
        let transform = CoordTransform::new(&source_srs, &target_srs).map_err(|e| {
            RasterError::Reprojection(format!(
                "no transform from {} to {}: {}",
                polygon.crs, target, e
            ))
        })?;

        let vertex_count = polygon.vertex_count();
        let mut xs = Vec::with_capacity(vertex_count);
        let mut ys = Vec::with_capacity(vertex_count);
        for &(x, y) in polygon.rings.iter().flatten() {
            xs.push(x);
            ys.push(y);
        }
        let mut zs = vec![0.0; vertex_count];

        transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| RasterError::Reprojection(format!("transform failed: {}", e)))?;

        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(RasterError::Reprojection(format!(
                "polygon falls outside the valid area of {}",
                target
            )));
        }

        let mut offset = 0;
        let mut rings = Vec::with_capacity(polygon.rings.len());
        for ring in &polygon.rings {
            let mut projected: Vec<_> = (offset..offset + ring.len())
                .map(|i| (xs[i], ys[i]))
                .collect();
            // identical inputs project identically, but keep closure exact
            if let Some(&first) = projected.first() {
                if let Some(last) = projected.last_mut() {
                    *last = first;
                }
            }
            offset += ring.len();
            rings.push(projected);
        }

        Ok(Polygon {
            rings,
            crs: target.clone(),
        })
    }
}
