//! D8 flow direction
//!
//! Encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = pit, flat or nodata (no outflow), 1-8 = steepest downslope neighbor

use crate::maybe_rayon::*;
use ndarray::Array2;
use vbet_core::raster::{d8, Raster};
use vbet_core::{Algorithm, Error, Result};

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "D8 flow direction from a filled DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// D8 flow direction from a (filled) DEM.
///
/// Ties keep the lowest direction code.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.cell_size();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    continue;
                }

                let mut max_drop = 0.0_f64;
                for dir in 1..=8u8 {
                    let Some((nr, nc)) = d8::downstream(row, col, dir, rows, cols) else {
                        continue;
                    };
                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / (d8::DISTANCES[dir as usize] * cell_size);
                    if drop > max_drop {
                        max_drop = drop;
                        *out = dir;
                    }
                }
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>();
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
