use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// A single (x, y) position; (lng, lat) in degrees for geographic polygons
pub type Coord = (f64, f64);

/// Closed linear ring: first and last positions are identical
pub type Ring = Vec<Coord>;

/// Raster band values read into memory (rows x cols)
pub type RasterGrid = Array2<f64>;

/// Boolean selection grid aligned to a raster (rows x cols)
pub type SelectionMask = Array2<bool>;

/// Identifier of the WGS 84 geographic coordinate system
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

/// Coordinate reference system identifier.
///
/// Holds any definition GDAL understands (`EPSG:xxxx`, PROJ strings, WKT).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into().trim().to_string())
    }

    /// WGS 84 longitude/latitude
    pub fn geographic() -> Self {
        Self::new(GEOGRAPHIC_CRS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cheap textual equality, ignoring case (`epsg:4326` == `EPSG:4326`)
    pub fn same_definition(&self, other: &Crs) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::geographic()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vector polygon: an outer ring followed by zero or more holes
#[derive(Debug, Clone)]
pub struct Polygon {
    pub rings: Vec<Ring>,
    pub crs: Crs,
}

impl Polygon {
    /// Build a polygon, closing any ring whose last position differs from its first
    pub fn new(rings: Vec<Ring>, crs: Crs) -> RasterResult<Self> {
        if rings.is_empty() {
            return Err(RasterError::InvalidGeometry("polygon has no rings".to_string()));
        }

        let mut closed = Vec::with_capacity(rings.len());
        for (i, mut ring) in rings.into_iter().enumerate() {
            if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return Err(RasterError::InvalidGeometry(format!(
                    "ring {} contains non-finite coordinates",
                    i
                )));
            }
            if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
                if first != last {
                    ring.push(first);
                }
            }
            let distinct = distinct_positions(&ring[..ring.len().saturating_sub(1)]);
            if distinct < 3 {
                return Err(RasterError::InvalidGeometry(format!(
                    "ring {} has {} distinct positions, need at least 3",
                    i, distinct
                )));
            }
            closed.push(ring);
        }

        Ok(Self { rings: closed, crs })
    }

    /// Parse a GeoJSON feature (`{"geometry": {...}}`) or a bare Polygon geometry.
    ///
    /// An optional top-level `"crs"` string overrides the geographic default.
    pub fn from_geojson(value: &Value, max_vertices: usize) -> RasterResult<Self> {
        let geometry = match value.get("geometry") {
            Some(g) => g,
            None if value.get("coordinates").is_some() => value,
            None => {
                return Err(RasterError::InvalidGeometry("missing geometry".to_string()));
            }
        };

        let geom_type = geometry.get("type").and_then(Value::as_str).unwrap_or("Polygon");
        if geom_type != "Polygon" {
            return Err(RasterError::InvalidGeometry(format!(
                "unsupported geometry type: {}",
                geom_type
            )));
        }

        let raw_rings = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .ok_or_else(|| RasterError::InvalidGeometry("coordinates must be an array".to_string()))?;

        let mut rings = Vec::with_capacity(raw_rings.len());
        let mut vertex_count = 0usize;
        for (i, raw_ring) in raw_rings.iter().enumerate() {
            let positions = raw_ring.as_array().ok_or_else(|| {
                RasterError::InvalidGeometry(format!("ring {} is not an array", i))
            })?;
            let mut ring = Vec::with_capacity(positions.len());
            for position in positions {
                ring.push(parse_position(position)?);
            }
            vertex_count += ring.len();
            rings.push(ring);
        }

        if vertex_count > max_vertices {
            return Err(RasterError::InvalidGeometry(format!(
                "polygon has {} vertices, limit is {}",
                vertex_count, max_vertices
            )));
        }

        let crs = value
            .get("crs")
            .and_then(Value::as_str)
            .map(|definition| Crs::new(definition))
            .unwrap_or_default();

        Self::new(rings, crs)
    }

    /// Outer ring, `None` for a polygon assembled without rings
    pub fn exterior(&self) -> Option<&Ring> {
        self.rings.first()
    }

    pub fn vertex_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }

    /// Envelope of all rings
    pub fn bounds(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &(x, y) in self.rings.iter().flatten() {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

/// Number of different positions in `ring`, in any order
fn distinct_positions(ring: &[Coord]) -> usize {
    let mut positions = ring.to_vec();
    positions.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    positions.dedup();
    positions.len()
}

fn parse_position(position: &Value) -> RasterResult<Coord> {
    let pair = position
        .as_array()
        .filter(|p| p.len() >= 2)
        .ok_or_else(|| RasterError::InvalidGeometry(format!("invalid position: {}", position)))?;

    match (pair[0].as_f64(), pair[1].as_f64()) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
        _ => Err(RasterError::InvalidGeometry(format!("invalid position: {}", position))),
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "west")]
    pub min_x: f64,
    #[serde(rename = "south")]
    pub min_y: f64,
    #[serde(rename = "east")]
    pub max_x: f64,
    #[serde(rename = "north")]
    pub max_y: f64,
}

/// Affine geotransform (GDAL coefficient order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// North-up transform covering `bounds` with a `width` x `height` grid
    pub fn from_bounds(bounds: &BoundingBox, width: usize, height: usize) -> Self {
        Self {
            top_left_x: bounds.min_x,
            pixel_width: (bounds.max_x - bounds.min_x) / width as f64,
            rotation_x: 0.0,
            top_left_y: bounds.max_y,
            rotation_y: 0.0,
            pixel_height: -(bounds.max_y - bounds.min_y) / height as f64,
        }
    }

    /// Map fractional pixel (col, row) to world (x, y)
    pub fn pixel_to_world(&self, col: f64, row: f64) -> Coord {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Inverse transform, `None` when the transform is singular
    pub fn invert(&self) -> Option<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;

        Some(GeoTransform {
            top_left_x: (self.rotation_x * self.top_left_y - self.pixel_height * self.top_left_x)
                * inv_det,
            pixel_width: self.pixel_height * inv_det,
            rotation_x: -self.rotation_x * inv_det,
            top_left_y: (-self.pixel_width * self.top_left_y + self.rotation_y * self.top_left_x)
                * inv_det,
            rotation_y: -self.rotation_y * inv_det,
            pixel_height: self.pixel_width * inv_det,
        })
    }

    /// Envelope of a `cols` x `rows` grid under this transform
    pub fn bounds(&self, cols: usize, rows: usize) -> BoundingBox {
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(cols as f64, 0.0),
            self.pixel_to_world(0.0, rows as f64),
            self.pixel_to_world(cols as f64, rows as f64),
        ];
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

/// Georeferenced single-band raster on disk.
///
/// Only metadata is held; the band is re-read per query.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    pub id: String,
    pub path: PathBuf,
    pub crs: Crs,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub nodata: Option<f64>,
}

impl RasterLayer {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Whether a cell value counts towards statistics
    pub fn is_valid(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.nodata {
            Some(nodata) if nodata.is_nan() => true,
            Some(nodata) => value != nodata,
            None => true,
        }
    }
}

/// Summary statistics of the valid cells selected by a polygon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonalStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ZonalStats {
    /// No valid cells selected
    pub fn empty() -> Self {
        Self::default()
    }

    /// Null statistics annotated with the failure
    pub fn failed(error: &RasterError) -> Self {
        Self {
            error: Some(format!("{}: {}", error.kind(), error)),
            ..Self::default()
        }
    }
}

/// XYZ tile address. Any integer is accepted; out-of-range tiles are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: i64,
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    pub fn new(z: i64, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }

    /// Parse path parameters; only non-integer text is rejected
    pub fn parse(z: &str, x: &str, y: &str) -> RasterResult<Self> {
        let parse_one = |name: &str, value: &str| {
            value.trim().parse::<i64>().map_err(|_| {
                RasterError::BadTileCoordinate(format!("{} must be an integer, got '{}'", name, value))
            })
        };
        Ok(Self {
            z: parse_one("z", z)?,
            x: parse_one("x", x)?,
            y: parse_one("y", y)?,
        })
    }

    /// Whether the address names a tile of the standard XYZ pyramid
    pub fn in_pyramid(&self) -> bool {
        if !(0..=30).contains(&self.z) {
            return false;
        }
        let n = 1i64 << self.z;
        (0..n).contains(&self.x) && (0..n).contains(&self.y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Error types for raster extraction and tile rendering
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Raster read failed: {0}")]
    RasterRead(String),

    #[error("Bad tile coordinate: {0}")]
    BadTileCoordinate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RasterError {
    /// Stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            RasterError::Io(_) => "Io",
            RasterError::InvalidGeometry(_) => "InvalidGeometry",
            RasterError::Reprojection(_) => "ReprojectionError",
            RasterError::RasterRead(_) => "RasterReadError",
            RasterError::BadTileCoordinate(_) => "BadTileCoordinate",
            RasterError::Config(_) => "Config",
            RasterError::Processing(_) => "Processing",
            RasterError::Gdal(_) => "GdalError",
            RasterError::Image(_) => "ImageError",
            RasterError::Json(_) => "JsonError",
        }
    }
}

/// Result type for raster operations
pub type RasterResult<T> = Result<T, RasterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_polygon_closes_open_ring() {
        let polygon = Polygon::new(
            vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]],
            Crs::geographic(),
        )
        .unwrap();
        let exterior = polygon.exterior().unwrap();
        assert_eq!(exterior.len(), 4);
        assert_eq!(exterior[0], exterior[3]);
    }

    #[test]
    fn test_polygon_from_feature() {
        let feature = json!({
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-119.5, 36.0], [-119.0, 36.0], [-119.0, 36.5], [-119.5, 36.5], [-119.5, 36.0]]]
            }
        });
        let polygon = Polygon::from_geojson(&feature, 1000).unwrap();
        assert_eq!(polygon.rings.len(), 1);
        assert_eq!(polygon.crs.as_str(), GEOGRAPHIC_CRS);
        assert_eq!(polygon.bounds().min_x, -119.5);
        assert_eq!(polygon.bounds().max_y, 36.5);
    }

    #[test]
    fn test_polygon_rejects_bad_input() {
        let not_polygon = json!({"geometry": {"type": "Point", "coordinates": [0.0, 0.0]}});
        assert!(matches!(
            Polygon::from_geojson(&not_polygon, 1000),
            Err(RasterError::InvalidGeometry(_))
        ));

        let missing = json!({"properties": {}});
        assert!(Polygon::from_geojson(&missing, 1000).is_err());

        let short_ring = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 1.0]]]});
        assert!(Polygon::from_geojson(&short_ring, 1000).is_err());

        let bad_position = json!({"type": "Polygon", "coordinates": [[[0.0], [1.0, 1.0], [1.0, 0.0]]]});
        assert!(Polygon::from_geojson(&bad_position, 1000).is_err());

        let repeated = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]});
        assert!(matches!(
            Polygon::from_geojson(&repeated, 1000),
            Err(RasterError::InvalidGeometry(_))
        ));

        let triangle = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]});
        assert!(Polygon::from_geojson(&triangle, 1000).is_ok());
    }

    #[test]
    fn test_polygon_vertex_limit() {
        let ring: Vec<[f64; 2]> = (0..20)
            .map(|i| {
                let a = i as f64 / 20.0 * std::f64::consts::TAU;
                [a.cos(), a.sin()]
            })
            .collect();
        let feature = json!({"type": "Polygon", "coordinates": [ring]});
        assert!(Polygon::from_geojson(&feature, 100).is_ok());
        assert!(Polygon::from_geojson(&feature, 10).is_err());
    }

    #[test]
    fn test_geotransform_inverse() {
        let gt = GeoTransform::from_gdal(&[-119.5, 0.005, 0.0, 36.5, 0.0, -0.005]);
        let inv = gt.invert().unwrap();
        let (x, y) = gt.pixel_to_world(10.5, 20.5);
        let (col, row) = inv.pixel_to_world(x, y);
        assert!((col - 10.5).abs() < 1e-9);
        assert!((row - 20.5).abs() < 1e-9);

        let singular = GeoTransform::from_gdal(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(singular.invert().is_none());
    }

    #[test]
    fn test_geotransform_from_bounds() {
        let bounds = BoundingBox { min_x: -119.5, min_y: 36.0, max_x: -119.0, max_y: 36.5 };
        let gt = GeoTransform::from_bounds(&bounds, 100, 100);
        let back = gt.bounds(100, 100);
        assert!((back.min_x - bounds.min_x).abs() < 1e-12);
        assert!((back.min_y - bounds.min_y).abs() < 1e-12);
        assert!((back.max_x - bounds.max_x).abs() < 1e-12);
        assert!((back.max_y - bounds.max_y).abs() < 1e-12);
    }

    #[test]
    fn test_tile_coord_parse() {
        assert_eq!(TileCoord::parse("5", " 10", "-3").unwrap(), TileCoord::new(5, 10, -3));
        assert!(matches!(
            TileCoord::parse("5", "ten", "3"),
            Err(RasterError::BadTileCoordinate(_))
        ));
        assert!(TileCoord::parse("1.5", "0", "0").is_err());

        assert!(TileCoord::new(2, 3, 3).in_pyramid());
        assert!(!TileCoord::new(2, 4, 0).in_pyramid());
        assert!(!TileCoord::new(5, 10, -3).in_pyramid());
    }

    #[test]
    fn test_zonal_stats_failed_carries_kind() {
        let stats = ZonalStats::failed(&RasterError::RasterRead("missing.tif".to_string()));
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_none());
        assert!(stats.error.unwrap().starts_with("RasterReadError"));
    }
}
