use crate::types::{Coord, GeoTransform, Polygon, RasterError, RasterResult, Ring, SelectionMask};
use ndarray::Array2;

/// Pixel selection rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterizeOptions {
    /// Also select every pixel whose footprint is crossed by a ring edge,
    /// not only pixels whose centre lies inside the polygon
    pub all_touched: bool,
}

/// Burns a polygon into a boolean mask aligned to a raster grid
pub struct Rasterizer;

impl Rasterizer {
    /// Build a `rows` x `cols` mask, true where the pixel is inside `polygon`.
    ///
    /// `polygon` must already be in the raster's CRS. Holes are excluded using the
    /// even-odd rule. Self-intersecting or zero-area outer rings select nothing, as
    /// do holes that self-intersect or meet another ring.
    pub fn rasterize(
        polygon: &Polygon,
        transform: &GeoTransform,
        shape: (usize, usize),
        options: RasterizeOptions,
    ) -> RasterResult<SelectionMask> {
        let (rows, cols) = shape;
        let mut mask = Array2::from_elem((rows, cols), false);
        if rows == 0 || cols == 0 {
            return Ok(mask);
        }

        let exterior = polygon
            .exterior()
            .ok_or_else(|| RasterError::InvalidGeometry("polygon has no rings".to_string()))?;
        if ring_area(exterior).abs() <= f64::EPSILON * bbox_area(exterior) {
            log::warn!("Polygon has zero area, selecting no pixels");
            return Ok(mask);
        }
        if has_self_intersection(exterior) {
            log::warn!("Polygon outer ring self-intersects, selecting no pixels");
            return Ok(mask);
        }
        if has_ring_crossing(&polygon.rings) {
            log::warn!("Polygon hole crosses another ring, selecting no pixels");
            return Ok(mask);
        }

        let inverse = transform.invert().ok_or_else(|| {
            RasterError::RasterRead(format!("geotransform {:?} is not invertible", transform.to_gdal()))
        })?;

        // Work in fractional pixel space: pixel (c, r) covers [c, c+1) x [r, r+1)
        let pixel_rings: Vec<Ring> = polygon
            .rings
            .iter()
            .map(|ring| ring.iter().map(|&(x, y)| inverse.pixel_to_world(x, y)).collect())
            .collect();

        fill_pixel_centres(&pixel_rings, &mut mask);

        if options.all_touched {
            for ring in &pixel_rings {
                for edge in ring.windows(2) {
                    mark_touched(&mut mask, edge[0], edge[1]);
                }
            }
        }

        Ok(mask)
    }
}

/// Scanline fill through pixel centres
fn fill_pixel_centres(rings: &[Ring], mask: &mut SelectionMask) {
    let (rows, cols) = mask.dim();

    let (mut min_row, mut max_row) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, r) in rings.iter().flatten() {
        min_row = min_row.min(r);
        max_row = max_row.max(r);
    }
    let first_row = (min_row - 0.5).ceil().max(0.0);
    let last_row = (max_row - 0.5).floor().min(rows as f64 - 1.0);
    if first_row > last_row {
        return;
    }

    let mut crossings: Vec<f64> = Vec::new();
    for row in first_row as usize..=last_row as usize {
        let yc = row as f64 + 0.5;
        crossings.clear();

        for ring in rings {
            for edge in ring.windows(2) {
                let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                // half-open so a vertex on the scanline is counted once
                if (y0 <= yc) != (y1 <= yc) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            // columns whose centre c + 0.5 lies in [span[0], span[1])
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(cols as f64);
            if start >= end {
                continue;
            }
            for col in start as usize..end as usize {
                mask[[row, col]] = true;
            }
        }
    }
}

/// Select every pixel whose footprint the segment passes through or touches
fn mark_touched(mask: &mut SelectionMask, (x0, y0): Coord, (x1, y1): Coord) {
    let (rows, cols) = mask.dim();
    let (y_lo, y_hi) = (y0.min(y1), y0.max(y1));

    let first_row = y_lo.floor().max(0.0);
    let last_row = y_hi.floor().min(rows as f64 - 1.0);
    if first_row > last_row {
        return;
    }

    for row in first_row as usize..=last_row as usize {
        let band_lo = (row as f64).max(y_lo);
        let band_hi = (row as f64 + 1.0).min(y_hi);
        let (xa, xb) = if y1 == y0 {
            (x0, x1)
        } else {
            (
                x0 + (band_lo - y0) * (x1 - x0) / (y1 - y0),
                x0 + (band_hi - y0) * (x1 - x0) / (y1 - y0),
            )
        };

        let first_col = xa.min(xb).floor().max(0.0);
        let last_col = xa.max(xb).floor().min(cols as f64 - 1.0);
        if first_col > last_col {
            continue;
        }
        for col in first_col as usize..=last_col as usize {
            mask[[row, col]] = true;
        }
    }
}

/// Signed shoelace area
fn ring_area(ring: &[Coord]) -> f64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum::<f64>()
        / 2.0
}

fn bbox_area(ring: &[Coord]) -> f64 {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in ring {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    (max_x - min_x) * (max_y - min_y)
}

/// Any pair of non-adjacent edges meeting
fn has_self_intersection(ring: &[Coord]) -> bool {
    let edges: Vec<(Coord, Coord)> = ring
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|(a, b)| a != b)
        .collect();
    let n = edges.len();

    for i in 0..n {
        for j in (i + 2)..n {
            // first and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_intersect(edges[i], edges[j]) {
                return true;
            }
        }
    }
    false
}

/// Any hole that self-intersects or meets an earlier ring
fn has_ring_crossing(rings: &[Ring]) -> bool {
    for (i, hole) in rings.iter().enumerate().skip(1) {
        if has_self_intersection(hole) {
            return true;
        }
        if rings[..i].iter().any(|other| rings_meet(hole, other)) {
            return true;
        }
    }
    false
}

fn rings_meet(a: &[Coord], b: &[Coord]) -> bool {
    a.windows(2).any(|e| {
        b.windows(2)
            .any(|f| segments_intersect((e[0], e[1]), (f[0], f[1])))
    })
}

fn orientation(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Coord, b: Coord, p: Coord) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect((p1, p2): (Coord, Coord), (q1, q2): (Coord, Coord)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Crs};

    /// 10x10 grid of unit pixels covering (0,0)-(10,10), north up
    fn unit_grid() -> GeoTransform {
        let bounds = BoundingBox { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 };
        GeoTransform::from_bounds(&bounds, 10, 10)
    }

    fn polygon(rings: Vec<Ring>) -> Polygon {
        Polygon::new(rings, Crs::geographic()).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Ring {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
    }

    fn count(mask: &SelectionMask) -> usize {
        mask.iter().filter(|&&v| v).count()
    }

    #[test]
    fn test_full_cover_selects_everything() {
        let mask = Rasterizer::rasterize(
            &polygon(vec![rect(0.0, 0.0, 10.0, 10.0)]),
            &unit_grid(),
            (10, 10),
            RasterizeOptions::default(),
        )
        .unwrap();
        assert_eq!(mask.dim(), (10, 10));
        assert_eq!(count(&mask), 100);
    }

    #[test]
    fn test_centre_rule() {
        // covers centres x in {2.5, 3.5}, y in {6.5, 7.5}; rows counted from the top
        let mask = Rasterizer::rasterize(
            &polygon(vec![rect(2.2, 6.2, 4.2, 8.2)]),
            &unit_grid(),
            (10, 10),
            RasterizeOptions::default(),
        )
        .unwrap();
        assert_eq!(count(&mask), 4);
        assert!(mask[[2, 2]] && mask[[2, 3]] && mask[[3, 2]] && mask[[3, 3]]);
    }

    #[test]
    fn test_hole_excluded() {
        let mask = Rasterizer::rasterize(
            &polygon(vec![rect(0.0, 0.0, 10.0, 10.0), rect(4.0, 4.0, 6.0, 6.0)]),
            &unit_grid(),
            (10, 10),
            RasterizeOptions::default(),
        )
        .unwrap();
        assert_eq!(count(&mask), 96);
        assert!(!mask[[4, 4]] && !mask[[5, 5]]);
    }

    #[test]
    fn test_all_touched_adds_edge_pixels() {
        let shape = polygon(vec![rect(2.2, 6.2, 4.2, 8.2)]);
        let touched = Rasterizer::rasterize(
            &shape,
            &unit_grid(),
            (10, 10),
            RasterizeOptions { all_touched: true },
        )
        .unwrap();
        // x spans pixels 2..=4, y spans rows 1..=3
        assert_eq!(count(&touched), 9);

        let tiny = polygon(vec![rect(5.1, 5.1, 5.3, 5.3)]);
        let centre_only =
            Rasterizer::rasterize(&tiny, &unit_grid(), (10, 10), RasterizeOptions::default()).unwrap();
        assert_eq!(count(&centre_only), 0);
        let touched_tiny = Rasterizer::rasterize(
            &tiny,
            &unit_grid(),
            (10, 10),
            RasterizeOptions { all_touched: true },
        )
        .unwrap();
        assert_eq!(count(&touched_tiny), 1);
        assert!(touched_tiny[[4, 5]]);
    }

    #[test]
    fn test_outside_and_degenerate_select_nothing() {
        let outside = Rasterizer::rasterize(
            &polygon(vec![rect(20.0, 20.0, 30.0, 30.0)]),
            &unit_grid(),
            (10, 10),
            RasterizeOptions::default(),
        )
        .unwrap();
        assert_eq!(count(&outside), 0);

        let flat = polygon(vec![vec![(0.0, 0.0), (5.0, 5.0), (10.0, 10.0), (0.0, 0.0)]]);
        let mask = Rasterizer::rasterize(&flat, &unit_grid(), (10, 10), RasterizeOptions { all_touched: true })
            .unwrap();
        assert_eq!(count(&mask), 0);
    }

    #[test]
    fn test_hole_crossing_exterior_selects_nothing() {
        let shape = polygon(vec![rect(0.0, 0.0, 10.0, 10.0), rect(8.0, 4.0, 12.0, 6.0)]);
        let mask = Rasterizer::rasterize(&shape, &unit_grid(), (10, 10), RasterizeOptions::default()).unwrap();
        assert_eq!(count(&mask), 0);

        let two_holes = polygon(vec![
            rect(0.0, 0.0, 10.0, 10.0),
            rect(2.0, 2.0, 5.0, 5.0),
            rect(4.0, 4.0, 7.0, 7.0),
        ]);
        let mask = Rasterizer::rasterize(&two_holes, &unit_grid(), (10, 10), RasterizeOptions::default()).unwrap();
        assert_eq!(count(&mask), 0);

        assert!(!has_ring_crossing(&[rect(0.0, 0.0, 10.0, 10.0), rect(4.0, 4.0, 6.0, 6.0)]));
    }

    #[test]
    fn test_polygon_without_rings_is_invalid() {
        let empty = Polygon { rings: Vec::new(), crs: Crs::geographic() };
        let result = Rasterizer::rasterize(&empty, &unit_grid(), (10, 10), RasterizeOptions::default());
        assert!(matches!(result, Err(RasterError::InvalidGeometry(_))));
    }

    #[test]
    fn test_bowtie_selects_nothing() {
        let bowtie = polygon(vec![vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)]]);
        let mask =
            Rasterizer::rasterize(&bowtie, &unit_grid(), (10, 10), RasterizeOptions::default()).unwrap();
        assert_eq!(count(&mask), 0);
    }

    #[test]
    fn test_rotated_transform() {
        // 90 degree rotation: column axis runs north, row axis runs east
        let gt = GeoTransform::from_gdal(&[0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let mask = Rasterizer::rasterize(
            &polygon(vec![rect(0.0, 0.0, 2.0, 3.0)]),
            &gt,
            (5, 5),
            RasterizeOptions::default(),
        )
        .unwrap();
        // x in [0,2] -> rows 0..2, y in [0,3] -> cols 0..3
        assert_eq!(count(&mask), 6);
        assert!(mask[[1, 2]]);
        assert!(!mask[[2, 0]]);
    }

    #[test]
    fn test_self_intersection_detection() {
        assert!(!has_self_intersection(&rect(0.0, 0.0, 1.0, 1.0)));
        assert!(has_self_intersection(&[(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]));
        // repeated vertex is not an intersection
        assert!(!has_self_intersection(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]));
    }
}
