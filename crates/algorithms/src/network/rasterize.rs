//! Burn network geometries into the terrain grid

use geo::{LineString, Polygon};
use vbet_core::raster::{GridSpec, Raster};

/// Mark every cell a line passes through.
///
/// Segments are sampled at most half a cell apart in grid space, so no
/// crossed cell is skipped except at exact corner grazes.
pub fn rasterize_lines(lines: &[&LineString<f64>], spec: &GridSpec) -> Raster<u8> {
    let mut mask: Raster<u8> = Raster::from_spec(spec);
    let (rows, cols) = (spec.rows as f64, spec.cols as f64);
    let transform = spec.transform;

    for line in lines {
        for segment in line.lines() {
            let (c0, r0) = transform.geo_to_pixel(segment.start.x, segment.start.y);
            let (c1, r1) = transform.geo_to_pixel(segment.end.x, segment.end.y);
            if !(c0.is_finite() && r0.is_finite() && c1.is_finite() && r1.is_finite()) {
                continue;
            }
            let steps = ((c1 - c0).abs().max((r1 - r0).abs()) * 2.0).ceil().max(1.0) as usize;
            for step in 0..=steps {
                let t = step as f64 / steps as f64;
                let c = c0 + (c1 - c0) * t;
                let r = r0 + (r1 - r0) * t;
                if c < 0.0 || r < 0.0 || c >= cols || r >= rows {
                    continue;
                }
                mask.data_mut()[[r as usize, c as usize]] = 1;
            }
        }
    }
    mask
}

/// Mark every cell whose center falls inside a polygon (even-odd rule,
/// holes excluded).
pub fn rasterize_polygons(polygons: &[&Polygon<f64>], spec: &GridSpec) -> Raster<u8> {
    let mut mask: Raster<u8> = Raster::from_spec(spec);
    let transform = spec.transform;

    for polygon in polygons {
        // Rings in grid coordinates
        let rings: Vec<Vec<(f64, f64)>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors().iter())
            .map(|ring| {
                ring.coords()
                    .map(|c| transform.geo_to_pixel(c.x, c.y))
                    .collect()
            })
            .collect();

        let (min_r, max_r) = rings
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, r)| (lo.min(r), hi.max(r)));
        if !min_r.is_finite() || !max_r.is_finite() {
            continue;
        }
        let first = (min_r - 0.5).ceil().max(0.0) as usize;
        let last = ((max_r - 0.5).floor() as isize).min(spec.rows as isize - 1);
        if last < first as isize {
            continue;
        }

        let mut crossings = Vec::new();
        for row in first..=last as usize {
            let y = row as f64 + 0.5;
            crossings.clear();
            for ring in &rings {
                for pair in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
                    if (y0 <= y) != (y1 <= y) {
                        crossings.push(x0 + (y - y0) / (y1 - y0) * (x1 - x0));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as usize;
                let end = ((span[1] - 0.5).floor() as isize).min(spec.cols as isize - 1);
                for col in start as isize..=end {
                    mask.data_mut()[[row, col as usize]] = 1;
                }
            }
        }
    }
    mask
}
