use crate::types::{Coord, Polygon};

/// Repairs polygons submitted in (lat, lng) order instead of (lng, lat).
///
/// The decision looks only at the first position of the outer ring and is a
/// magnitude heuristic: positions near the equator or the prime meridian can be
/// misclassified, in which case the polygon is silently misread.
pub struct CoordinateNormalizer;

impl CoordinateNormalizer {
    /// Whether `first` looks like a (lat, lng) pair
    pub fn looks_swapped(first: Coord) -> bool {
        let (a, b) = first;
        (-90.0..=90.0).contains(&a) && (-180.0..=180.0).contains(&b) && a.abs() > b.abs()
    }

    /// Return the polygon in (lng, lat) order, swapping every ring when needed
    pub fn normalize(polygon: &Polygon) -> Polygon {
        let first = match polygon.rings.first().and_then(|ring| ring.first()) {
            Some(&first) => first,
            None => return polygon.clone(),
        };

        if !Self::looks_swapped(first) {
            return polygon.clone();
        }

        log::debug!("Detected [lat, lng] ordering at {:?}, swapping axes", first);
        Polygon {
            rings: polygon
                .rings
                .iter()
                .map(|ring| ring.iter().map(|&(a, b)| (b, a)).collect())
                .collect(),
            crs: polygon.crs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Crs;

    fn square(origin: Coord, size: f64) -> Polygon {
        let (x, y) = origin;
        Polygon::new(
            vec![vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)]],
            Crs::geographic(),
        )
        .unwrap()
    }

    #[test]
    fn test_lng_lat_left_alone() {
        let polygon = square((-119.5, 36.0), 0.5);
        let normalized = CoordinateNormalizer::normalize(&polygon);
        assert_eq!(normalized.rings, polygon.rings);
    }

    #[test]
    fn test_swaps_every_ring() {
        // |a| > |b| with a inside the latitude range
        let outer = vec![(45.0, 10.0), (45.0, 11.0), (46.0, 11.0), (46.0, 10.0), (45.0, 10.0)];
        let hole = vec![(45.2, 10.2), (45.2, 10.4), (45.4, 10.4), (45.2, 10.2)];
        let polygon = Polygon::new(vec![outer, hole], Crs::geographic()).unwrap();

        let normalized = CoordinateNormalizer::normalize(&polygon);
        assert_eq!(normalized.rings[0][0], (10.0, 45.0));
        assert_eq!(normalized.rings[1][1], (10.4, 45.2));
        assert_eq!(normalized.rings[0].first(), normalized.rings[0].last());
    }

    #[test]
    fn test_heuristic_boundaries() {
        assert!(CoordinateNormalizer::looks_swapped((36.0, -19.5)));
        // California in (lat, lng) order is not caught: |36| < |-119.5|
        assert!(!CoordinateNormalizer::looks_swapped((36.0, -119.5)));
        // first value outside the latitude range
        assert!(!CoordinateNormalizer::looks_swapped((120.0, 30.0)));
        // equal magnitudes are ambiguous and left unchanged
        assert!(!CoordinateNormalizer::looks_swapped((10.0, -10.0)));
    }
}
