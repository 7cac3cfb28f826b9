//! HAND: Height Above Nearest Drainage
//!
//! Each cell follows its D8 path downstream until it reaches a drainage
//! cell; HAND is the elevation difference to that cell. Drainage cells come
//! from the rasterized stream network rather than an accumulation threshold.
//!
//! Reference:
//! Nobre, A.D. et al. (2011). HAND, a new terrain descriptor using
//! SRTM-DEM. *Mapping Ecology and Conservation*, 275–287.

use ndarray::Array2;
use vbet_core::raster::{d8, Raster};
use vbet_core::{Error, Result};

/// Compute HAND.
///
/// * `dem` - elevations used for the height difference
/// * `flow_dir` - D8 directions, usually from the filled DEM
/// * `drainage` - non-zero on drainage cells
///
/// Drainage cells get 0. Cells whose path ends in a pit or leaves the grid
/// without meeting drainage are NaN. Negative differences clamp to 0.
pub fn hand(dem: &Raster<f64>, flow_dir: &Raster<u8>, drainage: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    for other in [flow_dir.shape(), drainage.shape()] {
        if other != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: other.0,
                ac: other.1,
            });
        }
    }

    // Drainage elevation reached from each cell, once resolved
    let mut target: Vec<Option<f64>> = vec![None; rows * cols];
    let mut resolved = vec![false; rows * cols];

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { drainage.get_unchecked(row, col) } != 0 {
                let z = unsafe { dem.get_unchecked(row, col) };
                let idx = row * cols + col;
                target[idx] = (!dem.is_nodata(z)).then_some(z);
                resolved[idx] = true;
            }
        }
    }

    let mut path: Vec<usize> = Vec::new();
    for start_row in 0..rows {
        for start_col in 0..cols {
            if resolved[start_row * cols + start_col] {
                continue;
            }

            path.clear();
            let (mut row, mut col) = (start_row, start_col);
            let found = loop {
                let idx = row * cols + col;
                if resolved[idx] {
                    break target[idx];
                }
                // Bounded walk; D8 over a filled surface has no cycles
                if path.len() > rows * cols {
                    break None;
                }
                path.push(idx);

                let dir = unsafe { flow_dir.get_unchecked(row, col) };
                match d8::downstream(row, col, dir, rows, cols) {
                    Some((r, c)) => (row, col) = (r, c),
                    None => break None,
                }
            };

            for &idx in &path {
                target[idx] = found;
                resolved[idx] = true;
            }
        }
    }

    let mut output_data = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    for row in 0..rows {
        for col in 0..cols {
            if let Some(base) = target[row * cols + col] {
                let z = unsafe { dem.get_unchecked(row, col) };
                if !dem.is_nodata(z) {
                    output_data[(row, col)] = (z - base).max(0.0);
                }
            }
        }
    }

    let mut output = dem.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = output_data;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction;
    use vbet_core::GeoTransform;

    /// V-shaped valley draining south along column 5
    fn v_valley() -> Raster<f64> {
        let (rows, cols) = (10, 11);
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                let cross = (col as f64 - 5.0).abs();
                let along = (rows - 1 - row) as f64 * 0.1;
                dem.set(row, col, cross + along).unwrap();
            }
        }
        dem
    }

    fn center_drainage(dem: &Raster<f64>) -> Raster<u8> {
        let mut drainage: Raster<u8> = dem.with_same_meta();
        for row in 0..dem.rows() {
            drainage.set(row, 5, 1).unwrap();
        }
        drainage
    }

    #[test]
    fn test_hand_zero_on_drainage_and_increasing_away() {
        let dem = v_valley();
        let fdir = flow_direction(&dem).unwrap();
        let result = hand(&dem, &fdir, &center_drainage(&dem)).unwrap();

        assert_eq!(result.get(4, 5).unwrap(), 0.0);
        let near = result.get(5, 4).unwrap();
        let far = result.get(5, 2).unwrap();
        assert!(!near.is_nan() && !far.is_nan());
        assert!(far > near);
        assert!(result.data().iter().filter(|v| !v.is_nan()).all(|&v| v >= 0.0));
    }

    #[test]
    fn test_unreached_cells_are_nan() {
        let dem = v_valley();
        let fdir = flow_direction(&dem).unwrap();
        let none: Raster<u8> = dem.with_same_meta();
        let result = hand(&dem, &fdir, &none).unwrap();
        assert!(result.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dem = Raster::<f64>::new(5, 5);
        let fdir = Raster::<u8>::new(3, 3);
        let drainage = Raster::<u8>::new(5, 5);
        assert!(hand(&dem, &fdir, &drainage).is_err());
    }
}
