//! Euclidean distance from cell centers to the nearest network feature

use crate::maybe_rayon::*;
use crate::network::{rasterize_polygons, FeatureKey, FeatureKind, Network};
use geo::Coord;
use ndarray::Array2;
use std::collections::HashMap;
use vbet_core::raster::{GridSpec, Raster};
use vbet_core::{Error, Result};

/// Distance to the nearest feature together with that feature's key
#[derive(Debug, Clone)]
pub struct DistanceField {
    /// Map-unit distance, `INFINITY` beyond the search radius
    pub distance: Raster<f64>,
    /// Nearest feature, `None` where `distance` is infinite
    pub nearest: Array2<Option<FeatureKey>>,
}

struct Segment {
    key: FeatureKey,
    a: Coord<f64>,
    b: Coord<f64>,
    half_width: f64,
}

/// Uniform bucket index over segment bounding boxes
struct SegmentIndex {
    size: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl SegmentIndex {
    fn build(segments: &[Segment], size: f64) -> Self {
        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, s) in segments.iter().enumerate() {
            let (x0, x1) = (s.a.x.min(s.b.x), s.a.x.max(s.b.x));
            let (y0, y1) = (s.a.y.min(s.b.y), s.a.y.max(s.b.y));
            let (bx0, by0) = (Self::cell(x0, size), Self::cell(y0, size));
            let (bx1, by1) = (Self::cell(x1, size), Self::cell(y1, size));
            for bx in bx0..=bx1 {
                for by in by0..=by1 {
                    buckets.entry((bx, by)).or_default().push(i);
                }
            }
        }
        Self { size, buckets }
    }

    fn cell(v: f64, size: f64) -> i64 {
        (v / size).floor() as i64
    }

    /// Segments in the 3x3 bucket block around a point, ascending
    fn candidates(&self, x: f64, y: f64, out: &mut Vec<usize>) {
        out.clear();
        let (bx, by) = (Self::cell(x, self.size), Self::cell(y, self.size));
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.buckets.get(&(bx + dx, by + dy)) {
                    out.extend_from_slice(ids);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}

fn point_segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Distance from every cell center to the nearest reach or waterbody.
///
/// Reach distances are measured to the centerline minus the reach half
/// width, floored at 0. Cells inside a waterbody are at distance 0. Ties
/// within a millionth of a cell resolve to the smaller [`FeatureKey`], so
/// attribution does not depend on input order.
pub fn distance_to_network(network: &Network, spec: &GridSpec, max_distance: f64) -> Result<DistanceField> {
    distance_to_features(network, spec, max_distance, &[FeatureKind::Reach, FeatureKind::Waterbody])
}

/// Like [`distance_to_network`], restricted to features of one kind
pub fn distance_to_kind(
    network: &Network,
    spec: &GridSpec,
    max_distance: f64,
    kind: FeatureKind,
) -> Result<DistanceField> {
    distance_to_features(network, spec, max_distance, &[kind])
}

fn distance_to_features(
    network: &Network,
    spec: &GridSpec,
    max_distance: f64,
    kinds: &[FeatureKind],
) -> Result<DistanceField> {
    if max_distance.is_nan() || max_distance <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "max_search_distance",
            value: max_distance.to_string(),
            reason: "must be positive".into(),
        });
    }
    let use_reaches = kinds.contains(&FeatureKind::Reach);
    let waterbodies = if kinds.contains(&FeatureKind::Waterbody) {
        network.waterbodies.as_slice()
    } else {
        &[]
    };
    let (rows, cols) = (spec.rows, spec.cols);
    let cell = spec.cell_size();
    let tie = 1e-9 * cell;

    let mut segments = Vec::new();
    for reach in network.reaches.iter().filter(|_| use_reaches) {
        let key = FeatureKey { kind: FeatureKind::Reach, id: reach.id };
        for line in &reach.geometry.0 {
            for l in line.lines() {
                segments.push(Segment { key, a: l.start, b: l.end, half_width: reach.half_width });
            }
        }
    }
    for water in waterbodies {
        let key = FeatureKey { kind: FeatureKind::Waterbody, id: water.id };
        for polygon in &water.geometry.0 {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                for l in ring.lines() {
                    segments.push(Segment { key, a: l.start, b: l.end, half_width: 0.0 });
                }
            }
        }
    }
    segments.sort_by(|s, t| s.key.cmp(&t.key));

    // Smallest waterbody key covering each cell
    let mut interior: Array2<Option<FeatureKey>> = Array2::from_elem((rows, cols), None);
    for water in waterbodies {
        let key = FeatureKey { kind: FeatureKind::Waterbody, id: water.id };
        let polygons: Vec<_> = water.geometry.0.iter().collect();
        let mask = rasterize_polygons(&polygons, spec);
        ndarray::Zip::from(&mut interior).and(mask.data()).for_each(|slot, &m| {
            if m == 1 && slot.map_or(true, |k| key < k) {
                *slot = Some(key);
            }
        });
    }

    let reach = if use_reaches {
        max_distance + network.max_half_width()
    } else {
        max_distance
    };
    let index = SegmentIndex::build(&segments, reach.max(cell));
    let transform = spec.transform;

    let cells: Vec<(f64, Option<FeatureKey>)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut candidates = Vec::new();
            (0..cols)
                .map(|col| {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    let mut best: (f64, Option<FeatureKey>) = match interior[[row, col]] {
                        Some(key) => (0.0, Some(key)),
                        None => (f64::INFINITY, None),
                    };
                    index.candidates(x, y, &mut candidates);
                    for &i in &candidates {
                        let s = &segments[i];
                        let d = (point_segment_distance(Coord { x, y }, s.a, s.b) - s.half_width).max(0.0);
                        if d > max_distance {
                            continue;
                        }
                        let closer = d < best.0 - tie;
                        let tied = (d - best.0).abs() <= tie && best.1.map_or(true, |k| s.key < k);
                        if closer || tied {
                            best = (d.min(best.0), Some(s.key));
                        }
                    }
                    best
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let (distances, keys): (Vec<f64>, Vec<Option<FeatureKey>>) = cells.into_iter().unzip();
    let mut distance = Raster::from_spec(spec);
    *distance.data_mut() = Array2::from_shape_vec((rows, cols), distances)
        .map_err(|e| Error::Other(e.to_string()))?;
    let nearest = Array2::from_shape_vec((rows, cols), keys).map_err(|e| Error::Other(e.to_string()))?;

    Ok(DistanceField { distance, nearest })
}
