//! Bounding boxes and dissolve

use geo::{BooleanOps, Coord, MultiPolygon, Polygon};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Envelope of a segment
    pub fn of_segment(a: Coord<f64>, b: Coord<f64>) -> Self {
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    /// Envelope of a set of coordinates, `None` when empty
    pub fn of_coords<'a>(coords: impl IntoIterator<Item = &'a Coord<f64>>) -> Option<Self> {
        coords.into_iter().fold(None, |acc, c| {
            Some(match acc {
                None => Self::new(c.x, c.y, c.x, c.y),
                Some(b) => Self::new(b.min_x.min(c.x), b.min_y.min(c.y), b.max_x.max(c.x), b.max_y.max(c.y)),
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// Dissolve polygons into one multipart geometry with a boolean union.
pub fn dissolve(polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
    polygons.iter().fold(MultiPolygon::new(Vec::new()), |acc, p| {
        if acc.0.is_empty() {
            MultiPolygon::new(vec![p.clone()])
        } else {
            acc.union(&MultiPolygon::new(vec![p.clone()]))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Area};

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains_point(10.0, 0.0));
    }

    #[test]
    fn test_bbox_of_coords() {
        let coords = [Coord { x: 3.0, y: -1.0 }, Coord { x: -2.0, y: 4.0 }];
        let b = BoundingBox::of_coords(coords.iter()).unwrap();
        assert_eq!(b, BoundingBox::new(-2.0, -1.0, 3.0, 4.0));
        assert_eq!(b.width(), 5.0);
        assert!(BoundingBox::of_coords(std::iter::empty()).is_none());
    }

    #[test]
    fn test_dissolve_adjacent_squares() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let b = polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)];
        let merged = dissolve(&[a, b]);
        assert_eq!(merged.0.len(), 1);
        assert_relative_eq!(merged.unsigned_area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dissolve_disjoint() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let b = polygon![(x: 5.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 1.0), (x: 5.0, y: 1.0)];
        assert_eq!(dissolve(&[a, b]).0.len(), 2);
        assert!(dissolve(&[]).0.is_empty());
    }
}
