//! Connected-component filters on binary masks

use std::collections::VecDeque;
use vbet_core::raster::{Connectivity, Raster};

/// Connected components of cells equal to `value`
struct Component {
    cells: Vec<(usize, usize)>,
    touches_border: bool,
}

fn components(mask: &Raster<u8>, value: bool, connectivity: Connectivity) -> Vec<Component> {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let mut seen = vec![false; rows * cols];
    let mut out = Vec::new();
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if seen[r * cols + c] || (data[[r, c]] != 0) != value {
                continue;
            }
            seen[r * cols + c] = true;
            queue.push_back((r, c));
            let mut component = Component {
                cells: Vec::new(),
                touches_border: false,
            };
            while let Some((r, c)) = queue.pop_front() {
                component.cells.push((r, c));
                if r == 0 || c == 0 || r + 1 == rows || c + 1 == cols {
                    component.touches_border = true;
                }
                for (nr, nc) in connectivity.neighbors(r, c, rows, cols) {
                    let i = nr * cols + nc;
                    if !seen[i] && (data[[nr, nc]] != 0) == value {
                        seen[i] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
            out.push(component);
        }
    }
    out
}

/// Fill enclosed background regions with area below `max_area`.
///
/// Background is 8-connected; regions touching the grid border are never
/// filled.
pub fn fill_holes(mask: &Raster<u8>, max_area: f64) -> Raster<u8> {
    let cell_area = mask.transform().cell_area();
    let mut out = mask.clone();
    for hole in components(mask, false, Connectivity::Eight) {
        if !hole.touches_border && (hole.cells.len() as f64) * cell_area < max_area {
            for (r, c) in hole.cells {
                out.data_mut()[[r, c]] = 1;
            }
        }
    }
    out
}

/// Remove 4-connected foreground components with area below `min_area`.
pub fn remove_small(mask: &Raster<u8>, min_area: f64) -> Raster<u8> {
    let cell_area = mask.transform().cell_area();
    let mut out = mask.clone();
    for part in components(mask, true, Connectivity::Four) {
        if (part.cells.len() as f64) * cell_area < min_area {
            for (r, c) in part.cells {
                out.data_mut()[[r, c]] = 0;
            }
        }
    }
    out
}

/// Keep only 4-connected components containing at least one drainage cell.
pub fn keep_touching(mask: &Raster<u8>, drainage: &Raster<u8>) -> Raster<u8> {
    let mut out = mask.clone();
    for part in components(mask, true, Connectivity::Four) {
        if !part.cells.iter().any(|&(r, c)| drainage.data()[[r, c]] != 0) {
            for (r, c) in part.cells {
                out.data_mut()[[r, c]] = 0;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(rows: &[&str]) -> Raster<u8> {
        let data: Vec<u8> = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| (b == b'#') as u8))
            .collect();
        Raster::from_vec(data, rows.len(), rows[0].len()).unwrap()
    }

    fn count(m: &Raster<u8>) -> usize {
        m.data().iter().filter(|&&v| v != 0).count()
    }

    #[test]
    fn test_fill_small_hole_only() {
        let m = mask(&[
            "#######", //
            "#.##..#",
            "####..#",
            "#######",
        ]);
        let filled = fill_holes(&m, 2.0);
        assert_eq!(filled.data()[[1, 1]], 1);
        assert_eq!(filled.data()[[1, 4]], 0);
        assert_eq!(count(&filled), count(&m) + 1);
    }

    #[test]
    fn test_border_background_never_filled() {
        let m = mask(&[".##", "#.#", "###"]);
        // the centre hole is 8-connected to the open corner
        let filled = fill_holes(&m, 100.0);
        assert_eq!(filled.data()[[0, 0]], 0);
        assert_eq!(filled.data()[[1, 1]], 0);
    }

    #[test]
    fn test_remove_small() {
        let m = mask(&["##...", "##..#", "....."]);
        let cleaned = remove_small(&m, 2.0);
        assert_eq!(count(&cleaned), 4);
        assert_eq!(cleaned.data()[[1, 4]], 0);
    }

    #[test]
    fn test_keep_touching() {
        let m = mask(&["##..#", "##..#"]);
        let drainage = mask(&["....#", "....."]);
        let kept = keep_touching(&m, &drainage);
        assert_eq!(count(&kept), 2);
        assert_eq!(kept.data()[[0, 0]], 0);
    }
}
