//! Raster mask to polygons by tracing cell-boundary edges
//!
//! Foreground is 4-connected and background 8-connected: where two
//! foreground cells touch only at a corner, the traced rings are split at
//! that vertex. Rings keep only the corners of the cell outline.

use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, Polygon};
use std::collections::{HashMap, VecDeque};
use vbet_core::raster::{GeoTransform, Raster};

const NORTH: usize = 0;
const EAST: usize = 1;
const SOUTH: usize = 2;
const WEST: usize = 3;

/// Vertex position (col, row) on the (rows + 1) x (cols + 1) corner grid
type Vertex = (usize, usize);

fn step((c, r): Vertex, dir: usize) -> Vertex {
    match dir {
        NORTH => (c, r - 1),
        EAST => (c + 1, r),
        SOUTH => (c, r + 1),
        _ => (c - 1, r),
    }
}

fn direction(from: Vertex, to: Vertex) -> usize {
    if to.0 > from.0 {
        EAST
    } else if to.0 < from.0 {
        WEST
    } else if to.1 > from.1 {
        SOUTH
    } else {
        NORTH
    }
}

/// Pixel on the left of a directed boundary edge, always foreground
fn left_pixel((c, r): Vertex, dir: usize) -> (usize, usize) {
    match dir {
        NORTH => (r - 1, c - 1),
        EAST => (r - 1, c),
        SOUTH => (r, c),
        _ => (r, c - 1),
    }
}

/// Pixel on the right of a directed edge as signed (row, col)
fn right_pixel((c, r): Vertex, dir: usize) -> (isize, isize) {
    let (c, r) = (c as isize, r as isize);
    match dir {
        NORTH => (r - 1, c),
        EAST => (r, c),
        SOUTH => (r, c - 1),
        _ => (r - 1, c - 1),
    }
}

/// Directed boundary edges with foreground on the left
struct EdgeSet {
    cols: usize,
    exists: Vec<bool>,
}

impl EdgeSet {
    fn build(fg: &dyn Fn(isize, isize) -> bool, rows: usize, cols: usize) -> Self {
        let mut edges = Self {
            cols,
            exists: vec![false; (rows + 1) * (cols + 1) * 4],
        };
        for r in 0..rows {
            for c in 0..cols {
                if !fg(r as isize, c as isize) {
                    continue;
                }
                let (ri, ci) = (r as isize, c as isize);
                if !fg(ri - 1, ci) {
                    edges.insert((c + 1, r), WEST);
                }
                if !fg(ri, ci - 1) {
                    edges.insert((c, r), SOUTH);
                }
                if !fg(ri + 1, ci) {
                    edges.insert((c, r + 1), EAST);
                }
                if !fg(ri, ci + 1) {
                    edges.insert((c + 1, r + 1), NORTH);
                }
            }
        }
        edges
    }

    fn index(&self, (c, r): Vertex, dir: usize) -> usize {
        (r * (self.cols + 1) + c) * 4 + dir
    }

    fn insert(&mut self, v: Vertex, dir: usize) {
        let i = self.index(v, dir);
        self.exists[i] = true;
    }

    fn contains(&self, v: Vertex, dir: usize) -> bool {
        self.exists[self.index(v, dir)]
    }

    fn decode(&self, index: usize) -> (Vertex, usize) {
        let dir = index % 4;
        let v = index / 4;
        ((v % (self.cols + 1), v / (self.cols + 1)), dir)
    }
}

/// One closed boundary loop in vertex coordinates
struct Ring {
    vertices: Vec<Vertex>,
    /// A foreground pixel on the left of the loop
    left: (usize, usize),
    /// A pixel on the right of the loop, background for holes
    right: (isize, isize),
}

/// Twice the signed area in (col, -row) space; positive for exteriors
fn signed_area2(vertices: &[Vertex]) -> i64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = (vertices[i].0 as i64, -(vertices[i].1 as i64));
            let (x1, y1) = (vertices[(i + 1) % n].0 as i64, -(vertices[(i + 1) % n].1 as i64));
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// Split a closed vertex walk at repeated vertices into simple loops.
pub(crate) fn split_pinches<V: Copy + Eq + std::hash::Hash>(walk: &[V]) -> Vec<Vec<V>> {
    let mut loops = Vec::new();
    let mut stack: Vec<V> = Vec::with_capacity(walk.len());
    let mut position: HashMap<V, usize> = HashMap::new();
    for &v in walk {
        if let Some(&start) = position.get(&v) {
            let piece: Vec<V> = stack.drain(start + 1..).collect();
            for p in &piece {
                position.remove(p);
            }
            let mut ring = Vec::with_capacity(piece.len() + 1);
            ring.push(v);
            ring.extend(piece);
            if ring.len() >= 3 {
                loops.push(ring);
            }
        } else {
            position.insert(v, stack.len());
            stack.push(v);
        }
    }
    if stack.len() >= 3 {
        loops.push(stack);
    }
    loops
}

fn drop_collinear(vertices: &[Vertex]) -> Vec<Vertex> {
    let n = vertices.len();
    (0..n)
        .filter(|&i| {
            let (p, c, q) = (vertices[(i + n - 1) % n], vertices[i], vertices[(i + 1) % n]);
            let cross = (c.0 as i64 - p.0 as i64) * (q.1 as i64 - c.1 as i64)
                - (c.1 as i64 - p.1 as i64) * (q.0 as i64 - c.0 as i64);
            cross != 0
        })
        .map(|i| vertices[i])
        .collect()
}

fn trace_rings(edges: &EdgeSet) -> Vec<Ring> {
    let mut used = vec![false; edges.exists.len()];
    let mut rings = Vec::new();

    for start in 0..edges.exists.len() {
        if !edges.exists[start] || used[start] {
            continue;
        }
        let (start_vertex, start_dir) = edges.decode(start);
        let mut walk = Vec::new();
        let (mut v, mut dir) = (start_vertex, start_dir);
        loop {
            used[edges.index(v, dir)] = true;
            walk.push(v);
            let end = step(v, dir);
            let next = [(dir + 3) % 4, dir, (dir + 1) % 4]
                .into_iter()
                .find(|&d| edges.contains(end, d));
            match next {
                Some(d) if edges.index(end, d) == start => break,
                Some(d) => {
                    v = end;
                    dir = d;
                }
                // every boundary vertex has an outgoing edge; a dead end
                // would mean a corrupted edge set
                None => break,
            }
        }

        for piece in split_pinches(&walk) {
            let d = direction(piece[0], piece[1]);
            rings.push(Ring {
                left: left_pixel(piece[0], d),
                right: right_pixel(piece[0], d),
                vertices: drop_collinear(&piece),
            });
        }
    }
    rings
}

/// Label 4-connected foreground components, 0 for background
fn label_components(fg: &dyn Fn(isize, isize) -> bool, rows: usize, cols: usize) -> Vec<u32> {
    let mut labels = vec![0u32; rows * cols];
    let mut next = 0u32;
    let mut queue = VecDeque::new();
    for r in 0..rows {
        for c in 0..cols {
            if labels[r * cols + c] != 0 || !fg(r as isize, c as isize) {
                continue;
            }
            next += 1;
            labels[r * cols + c] = next;
            queue.push_back((r, c));
            while let Some((r, c)) = queue.pop_front() {
                for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if fg(nr, nc) {
                        let i = nr as usize * cols + nc as usize;
                        if labels[i] == 0 {
                            labels[i] = next;
                            queue.push_back((nr as usize, nc as usize));
                        }
                    }
                }
            }
        }
    }
    labels
}

fn to_map(vertices: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = vertices
        .iter()
        .map(|&(c, r)| {
            let (x, y) = transform.apply(c as f64, r as f64);
            Coord { x, y }
        })
        .collect();
    coords.push(coords[0]);
    LineString::new(coords)
}

/// Even-odd test of a pixel center against a ring in vertex coordinates
fn contains_pixel(vertices: &[Vertex], (row, col): (isize, isize)) -> bool {
    let (px, py) = (col as f64 + 0.5, row as f64 + 0.5);
    let n = vertices.len();
    let mut inside = false;
    for i in 0..n {
        let (x0, y0) = (vertices[i].0 as f64, vertices[i].1 as f64);
        let (x1, y1) = (vertices[(i + 1) % n].0 as f64, vertices[(i + 1) % n].1 as f64);
        if (y0 > py) != (y1 > py) && px < x0 + (py - y0) / (y1 - y0) * (x1 - x0) {
            inside = !inside;
        }
    }
    inside
}

/// Vectorize the non-zero cells of `mask`.
///
/// Returns one polygon per 4-connected component, exteriors
/// counter-clockwise and holes clockwise in map coordinates, ordered by the
/// component's first cell in row-major order.
pub fn polygonize(mask: &Raster<u8>) -> Vec<Polygon<f64>> {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let fg = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && data[[r as usize, c as usize]] != 0
    };

    let labels = label_components(&fg, rows, cols);
    let edges = EdgeSet::build(&fg, rows, cols);
    let rings = trace_rings(&edges);

    let component_count = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut exteriors: Vec<Vec<usize>> = vec![Vec::new(); component_count + 1];
    let mut holes = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        let area = signed_area2(&ring.vertices);
        if area > 0 {
            let label = labels[ring.left.0 * cols + ring.left.1] as usize;
            exteriors[label].push(i);
        } else if area < 0 {
            holes.push(i);
        }
    }

    let mut interiors: HashMap<usize, Vec<usize>> = HashMap::new();
    for h in holes {
        let ring = &rings[h];
        let label = labels[ring.left.0 * cols + ring.left.1] as usize;
        let candidates = &exteriors[label];
        let owner = if candidates.len() == 1 {
            Some(candidates[0])
        } else {
            candidates
                .iter()
                .copied()
                .find(|&e| contains_pixel(&rings[e].vertices, ring.right))
        };
        if let Some(owner) = owner {
            interiors.entry(owner).or_default().push(h);
        }
    }

    let transform = mask.transform();
    exteriors
        .iter()
        .flatten()
        .map(|&e| {
            let holes = interiors
                .get(&e)
                .map(|hs| hs.iter().map(|&h| to_map(&rings[h].vertices, transform)).collect())
                .unwrap_or_default();
            Polygon::new(to_map(&rings[e].vertices, transform), holes).orient(Direction::Default)
        })
        .collect()
}
