//! Polygon validity checks and a single repair pass

use crate::classify::split_pinches;
use crate::vector::{dissolve, BoundingBox};
use geo::orient::{Direction, Orient};
use geo::{Area, Coord, LineString, MultiPolygon, Polygon};

struct Segment {
    a: Coord<f64>,
    b: Coord<f64>,
    bbox: BoundingBox,
}

fn orientation(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// True for a proper crossing or a collinear overlap of positive length.
/// Touching at a single point is allowed.
fn conflicts(s: &Segment, t: &Segment) -> bool {
    let o1 = orientation(s.a, s.b, t.a);
    let o2 = orientation(s.a, s.b, t.b);
    let o3 = orientation(t.a, t.b, s.a);
    let o4 = orientation(t.a, t.b, s.b);
    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }
    if o1 == 0.0 && o2 == 0.0 {
        // project on the dominant axis of s
        let (dx, dy) = (s.b.x - s.a.x, s.b.y - s.a.y);
        let key = |c: Coord<f64>| if dx.abs() >= dy.abs() { c.x } else { c.y };
        let (s0, s1) = (key(s.a).min(key(s.b)), key(s.a).max(key(s.b)));
        let (t0, t1) = (key(t.a).min(key(t.b)), key(t.a).max(key(t.b)));
        return s1.min(t1) - s0.max(t0) > 0.0;
    }
    false
}

fn point_in_ring(p: Coord<f64>, ring: &LineString<f64>) -> bool {
    let mut inside = false;
    for l in ring.lines() {
        let (a, b) = (l.start, l.end);
        if (a.y > p.y) != (b.y > p.y) && p.x < a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x) {
            inside = !inside;
        }
    }
    inside
}

fn check_ring(ring: &LineString<f64>, what: &str) -> Result<(), String> {
    if !ring.is_closed() {
        return Err(format!("{what} is not closed"));
    }
    if ring.0.len() < 4 {
        return Err(format!("{what} has {} coordinates", ring.0.len()));
    }
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return Err(format!("{what} has zero area"));
    }
    Ok(())
}

/// Check closed rings, at least four coordinates, non-zero area, no
/// crossing or overlapping edges, and holes inside their shell.
pub fn validate(geom: &MultiPolygon<f64>) -> Result<(), String> {
    let mut segments = Vec::new();
    for (i, polygon) in geom.0.iter().enumerate() {
        check_ring(polygon.exterior(), &format!("exterior of part {i}"))?;
        for (j, hole) in polygon.interiors().iter().enumerate() {
            check_ring(hole, &format!("hole {j} of part {i}"))?;
            let inside = hole.lines().all(|l| {
                let mid = Coord {
                    x: (l.start.x + l.end.x) / 2.0,
                    y: (l.start.y + l.end.y) / 2.0,
                };
                point_in_ring(mid, polygon.exterior())
            });
            if !inside {
                return Err(format!("hole {j} of part {i} lies outside its shell"));
            }
        }
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            segments.extend(ring.lines().map(|l| Segment {
                a: l.start,
                b: l.end,
                bbox: BoundingBox::of_segment(l.start, l.end),
            }));
        }
    }

    // sweep along x
    segments.sort_by(|s, t| s.bbox.min_x.total_cmp(&t.bbox.min_x));
    for (i, s) in segments.iter().enumerate() {
        for t in &segments[i + 1..] {
            if t.bbox.min_x > s.bbox.max_x {
                break;
            }
            if s.bbox.intersects(&t.bbox) && conflicts(s, t) {
                return Err(format!(
                    "edges ({}, {})-({}, {}) and ({}, {})-({}, {}) intersect",
                    s.a.x, s.a.y, s.b.x, s.b.y, t.a.x, t.a.y, t.b.x, t.b.y
                ));
            }
        }
    }
    Ok(())
}

fn coord_key(c: &Coord<f64>) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

/// Open ring without consecutive duplicates, split into simple loops
fn simple_loops(ring: &LineString<f64>) -> Vec<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in &ring.0 {
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    while coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    let keys: Vec<(u64, u64)> = coords.iter().map(coord_key).collect();
    let lookup: std::collections::HashMap<(u64, u64), Coord<f64>> =
        keys.iter().copied().zip(coords.iter().copied()).collect();

    split_pinches(&keys)
        .into_iter()
        .map(|piece| {
            let mut pts: Vec<Coord<f64>> = piece.iter().map(|k| lookup[k]).collect();
            pts.push(pts[0]);
            LineString::new(pts)
        })
        .filter(|ring| Polygon::new(ring.clone(), vec![]).unsigned_area() > 0.0)
        .collect()
}

/// One repair pass: drop duplicate vertices, split pinched rings, drop
/// degenerate rings and re-dissolve with a boolean union.
pub fn repair(geom: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut shells: Vec<LineString<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for polygon in &geom.0 {
        // pieces of an exterior keep their winding: clockwise pieces were
        // pinched-off holes
        let exterior = Polygon::new(polygon.exterior().clone(), vec![]).orient(Direction::Default);
        for piece in simple_loops(exterior.exterior()) {
            if Polygon::new(piece.clone(), vec![]).signed_area() > 0.0 {
                shells.push(piece);
            } else {
                holes.push(piece);
            }
        }
        for hole in polygon.interiors() {
            holes.extend(simple_loops(hole));
        }
    }

    let mut assigned: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for hole in holes {
        let sample = hole.lines().next().map(|l| Coord {
            x: (l.start.x + l.end.x) / 2.0,
            y: (l.start.y + l.end.y) / 2.0,
        });
        // smallest shell containing the hole
        let owner = sample.and_then(|p| {
            shells
                .iter()
                .enumerate()
                .filter(|(_, s)| point_in_ring(p, s))
                .min_by(|(_, a), (_, b)| {
                    let area = |r: &LineString<f64>| Polygon::new(r.clone(), vec![]).unsigned_area();
                    area(a).total_cmp(&area(b))
                })
                .map(|(i, _)| i)
        });
        if let Some(i) = owner {
            assigned[i].push(hole);
        }
    }

    let polygons: Vec<Polygon<f64>> = shells
        .into_iter()
        .zip(assigned)
        .map(|(shell, holes)| Polygon::new(shell, holes).orient(Direction::Default))
        .collect();
    dissolve(&polygons).orient(Direction::Default)
}
