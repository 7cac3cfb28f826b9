//! Binary dilation

use crate::maybe_rayon::*;
use ndarray::Array2;
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

use super::element::StructuringElement;

/// How cells outside the grid are treated by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Outside {
    Background,
    Foreground,
}

/// Shared row-parallel kernel: `any == true` is dilation, `false` erosion.
pub(super) fn binary_filter(
    mask: &Raster<u8>,
    element: &StructuringElement,
    any: bool,
    outside: Outside,
) -> Result<Raster<u8>> {
    element.validate()?;

    let (rows, cols) = mask.shape();
    let offsets = element.offsets();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut hits = offsets.iter().map(|&(dr, dc)| {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        outside == Outside::Foreground
                    } else {
                        unsafe { mask.get_unchecked(r as usize, c as usize) != 0 }
                    }
                });
                let set = if any { hits.any(|h| h) } else { hits.all(|h| h) };
                *out = u8::from(set);
            }
            row_data
        })
        .collect();

    let mut output = mask.with_same_meta::<u8>();
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Dilate a 0/1 mask. Cells beyond the grid count as background.
pub fn dilate(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    binary_filter(mask, element, true, Outside::Background)
}
