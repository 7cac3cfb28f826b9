//! Slope in degrees (Horn 1981)

use crate::maybe_rayon::*;
use ndarray::Array2;
use vbet_core::raster::Raster;
use vbet_core::{Algorithm, Error, Result};

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Vertical units per horizontal unit (1.0 for metric DEMs on a metric grid)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self { z_factor: 1.0 }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Slope in degrees from a DEM using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, &params)
    }
}

/// Horn 3x3 gradient at an interior cell, `None` when any neighbor is nodata.
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / 8h,
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / 8h
pub(crate) fn horn_gradient(dem: &Raster<f64>, row: usize, col: usize, eight_h: f64) -> Option<(f64, f64)> {
    let (rows, cols) = dem.shape();
    if row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols {
        return None;
    }

    let mut w = [0.0f64; 9];
    for (k, v) in w.iter_mut().enumerate() {
        let r = row + k / 3 - 1;
        let c = col + k % 3 - 1;
        // SAFETY: interior cell, all neighbors in bounds
        *v = unsafe { dem.get_unchecked(r, c) };
        if dem.is_nodata(*v) {
            return None;
        }
    }
    let [a, b, c, d, _, f, g, h, i] = w;

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_h;
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_h;
    Some((dz_dx, dz_dy))
}

/// Slope in degrees. Edge cells and cells touching nodata are NaN.
pub fn slope(dem: &Raster<f64>, params: &SlopeParams) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let eight_h = 8.0 * dem.cell_size() / params.z_factor;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match horn_gradient(dem, row, col, eight_h) {
                    Some((dx, dy)) => (dx * dx + dy * dy).sqrt().atan().to_degrees(),
                    None => f64::NAN,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
