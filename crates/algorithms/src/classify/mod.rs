//! Threshold classification
//!
//! Turns the likelihood surface into one mask and raw polygon set per
//! confidence level.

mod polygonize;
mod threshold;

pub use polygonize::polygonize;
pub(crate) use polygonize::split_pinches;
pub use threshold::{layer_name, threshold_mask, validate_thresholds};

use geo::Polygon;
use vbet_core::raster::Raster;
use vbet_core::Result;

/// Mask and raw polygons for one threshold
#[derive(Debug, Clone)]
pub struct ClassifiedLayer {
    pub name: String,
    pub threshold: f64,
    pub mask: Raster<u8>,
    pub polygons: Vec<Polygon<f64>>,
}

/// Classify `likelihood >= threshold` and vectorize the result.
pub fn classify(likelihood: &Raster<f32>, threshold: f64) -> Result<ClassifiedLayer> {
    validate_thresholds(&[threshold])?;
    let mask = threshold_mask(likelihood, threshold)?;
    let polygons = polygonize(&mask);
    Ok(ClassifiedLayer {
        name: layer_name(threshold),
        threshold,
        mask,
        polygons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn test_higher_threshold_is_subset() {
        let values: Vec<f32> = (0..100).map(|i| ((i % 10) as f32) / 9.0).collect();
        let lik = Raster::from_vec(values, 10, 10).unwrap();
        let low = classify(&lik, 0.5).unwrap();
        let high = classify(&lik, 0.8).unwrap();
        assert_eq!(low.name, "vbet_50");
        for (h, l) in high.mask.data().iter().zip(low.mask.data().iter()) {
            assert!(h <= l);
        }
        let area = |layer: &ClassifiedLayer| layer.polygons.iter().map(|p| p.unsigned_area()).sum::<f64>();
        assert!(area(&high) < area(&low));
    }
}
