//! Likelihood thresholds and layer naming

use crate::maybe_rayon::*;
use ndarray::Array2;
use std::collections::HashSet;
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

/// Output layer name for a threshold, `vbet_<round(100 t)>`
pub fn layer_name(threshold: f64) -> String {
    format!("vbet_{}", (threshold * 100.0).round() as i64)
}

/// Thresholds must lie in (0, 1] and map to distinct layer names.
pub fn validate_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        return Err(Error::InvalidParameter {
            name: "thresholds",
            value: "[]".into(),
            reason: "at least one threshold is required".into(),
        });
    }
    let mut names = HashSet::new();
    for &t in thresholds {
        if !(t > 0.0 && t <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "thresholds",
                value: t.to_string(),
                reason: "thresholds must lie in (0, 1]".into(),
            });
        }
        if !names.insert(layer_name(t)) {
            return Err(Error::InvalidParameter {
                name: "thresholds",
                value: t.to_string(),
                reason: format!("duplicate layer {}", layer_name(t)),
            });
        }
    }
    Ok(())
}

/// Cells with `likelihood >= threshold` as 1, everything else 0.
/// Nodata never passes.
pub fn threshold_mask(likelihood: &Raster<f32>, threshold: f64) -> Result<Raster<u8>> {
    let (rows, cols) = likelihood.shape();
    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    // SAFETY: row < rows, col < cols
                    let v = unsafe { likelihood.get_unchecked(row, col) };
                    (!likelihood.is_nodata(v) && v as f64 >= threshold) as u8
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut mask = likelihood.with_same_meta::<u8>();
    *mask.data_mut() = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names() {
        assert_eq!(layer_name(0.5), "vbet_50");
        assert_eq!(layer_name(1.0), "vbet_100");
        assert_eq!(layer_name(0.685), "vbet_69");
    }

    #[test]
    fn test_validate() {
        assert!(validate_thresholds(&[0.5, 0.9, 1.0]).is_ok());
        assert!(validate_thresholds(&[0.0]).is_err());
        assert!(validate_thresholds(&[1.1]).is_err());
        assert!(validate_thresholds(&[0.5, 0.501]).is_err());
        assert!(validate_thresholds(&[]).is_err());
    }

    #[test]
    fn test_mask() {
        let lik = Raster::from_vec(vec![0.2f32, 0.5, 0.9, f32::NAN], 2, 2).unwrap();
        let mask = threshold_mask(&lik, 0.5).unwrap();
        assert_eq!(mask.data().iter().copied().collect::<Vec<_>>(), vec![0, 1, 1, 0]);
    }
}
