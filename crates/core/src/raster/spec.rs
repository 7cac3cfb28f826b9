//! Grid alignment checks between co-registered rasters

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Relative tolerance applied to transform coefficients, in cell sizes
const TRANSFORM_TOLERANCE: f64 = 1e-6;

/// Shape, georeferencing and CRS of a raster, without its data.
///
/// Every evidence raster of a run must share one `GridSpec`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Verify that `other` is aligned with `self`.
    ///
    /// Dimensions must match exactly, transform coefficients within
    /// `1e-6 * cell_size`. Two missing CRSs are aligned; exactly one
    /// missing CRS is a mismatch.
    pub fn check_aligned(&self, other: &GridSpec, reference: &str, raster: &str) -> Result<()> {
        let mismatch = |property: &'static str, detail: String| Error::GridMismatch {
            reference: reference.to_string(),
            raster: raster.to_string(),
            property,
            detail,
        };

        if (self.rows, self.cols) != (other.rows, other.cols) {
            return Err(mismatch(
                "dimensions",
                format!(
                    "{}x{} vs {}x{}",
                    self.rows, self.cols, other.rows, other.cols
                ),
            ));
        }

        let tolerance = TRANSFORM_TOLERANCE * self.cell_size().max(f64::MIN_POSITIVE);
        if let Some(coefficient) = self.transform.first_difference(&other.transform, tolerance) {
            return Err(mismatch(
                "transform",
                format!(
                    "{coefficient}: {:?} vs {:?}",
                    self.transform.to_gdal(),
                    other.transform.to_gdal()
                ),
            ));
        }

        match (&self.crs, &other.crs) {
            (None, None) => Ok(()),
            (Some(a), Some(b)) if a.is_equivalent(b) => Ok(()),
            (a, b) => Err(mismatch(
                "crs",
                format!("{} vs {}", describe(a.as_ref()), describe(b.as_ref())),
            )),
        }
    }
}

fn describe(crs: Option<&CRS>) -> String {
    crs.map(CRS::identifier).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(origin_x: f64, crs: Option<CRS>) -> GridSpec {
        GridSpec::new(4, 5, GeoTransform::new(origin_x, 40.0, 10.0, -10.0), crs)
    }

    #[test]
    fn test_aligned_within_tolerance() {
        let a = spec(0.0, Some(CRS::from_epsg(32612)));
        let b = spec(1e-6, Some(CRS::from_epsg(32612)));
        assert!(a.check_aligned(&b, "slope", "hand").is_ok());
    }

    #[test]
    fn test_transform_mismatch() {
        let a = spec(0.0, None);
        let b = spec(10.0, None);
        let err = a.check_aligned(&b, "slope", "hand").unwrap_err();
        match err {
            Error::GridMismatch { raster, property, .. } => {
                assert_eq!(raster, "hand");
                assert_eq!(property, "transform");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_crs_rules() {
        let none = spec(0.0, None);
        let utm = spec(0.0, Some(CRS::from_epsg(32612)));
        let other = spec(0.0, Some(CRS::from_epsg(32613)));

        assert!(none.check_aligned(&none.clone(), "a", "b").is_ok());
        assert!(none.check_aligned(&utm, "a", "b").is_err());
        assert!(utm.check_aligned(&none, "a", "b").is_err());
        assert!(utm.check_aligned(&other, "a", "b").is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = spec(0.0, None);
        let mut b = a.clone();
        b.cols = 6;
        let err = a.check_aligned(&b, "slope", "hillshade").unwrap_err();
        assert!(matches!(err, Error::GridMismatch { property: "dimensions", .. }));
    }
}
