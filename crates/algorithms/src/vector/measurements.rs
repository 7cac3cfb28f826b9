//! Geometric measurements: area, perimeter, part count

use geo::{Area, LineString, MultiPolygon, Polygon};

/// Euclidean length of a ring or line in CRS units
pub fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

/// Unsigned area in CRS units squared, holes subtracted
pub fn area(geom: &MultiPolygon<f64>) -> f64 {
    geom.unsigned_area()
}

/// Total length of exterior and interior rings
pub fn perimeter(geom: &MultiPolygon<f64>) -> f64 {
    geom.0.iter().map(polygon_perimeter).sum()
}

pub fn polygon_perimeter(p: &Polygon<f64>) -> f64 {
    ring_length(p.exterior()) + p.interiors().iter().map(ring_length).sum::<f64>()
}

/// Number of polygon parts
pub fn part_count(geom: &MultiPolygon<f64>) -> usize {
    geom.0.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn framed() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 8.0, y: 2.0), (x: 8.0, y: 8.0), (x: 2.0, y: 8.0)]],
        )])
    }

    #[test]
    fn test_area_with_hole() {
        assert_relative_eq!(area(&framed()), 64.0);
    }

    #[test]
    fn test_perimeter_with_hole() {
        // exterior 40, interior 24
        assert_relative_eq!(perimeter(&framed()), 64.0);
    }

    #[test]
    fn test_triangle() {
        let t = MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 0.0, y: 4.0)]]);
        assert_relative_eq!(area(&t), 6.0);
        assert_relative_eq!(perimeter(&t), 12.0);
        assert_eq!(part_count(&t), 1);
    }
}
