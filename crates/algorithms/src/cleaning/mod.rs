//! Topology cleaning of classified layers
//!
//! Raster-side steps (gap closing, hole filling, sliver removal, network
//! contact) are increasing set operators, so a cleaned layer at a higher
//! threshold stays inside the cleaned layer at a lower one. The surviving
//! mask is re-vectorized, dissolved into one multipart geometry, validated
//! and repaired once if needed.

mod components;
mod validate;

pub use components::{fill_holes, keep_touching, remove_small};
pub use validate::{repair, validate};

use crate::classify::{polygonize, ClassifiedLayer};
use crate::morphology::{closing, StructuringElement};
use crate::vector;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

/// Cleaning options. Areas are in map units squared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanParams {
    /// Disk radius in cells for morphological closing, 0 disables it
    pub close_gaps_cells: usize,
    /// Enclosed gaps smaller than this are filled
    pub min_hole_area: f64,
    /// Parts smaller than this are removed
    pub min_area: f64,
    /// Drop parts that contain no drainage cell
    pub require_network_contact: bool,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            close_gaps_cells: 1,
            min_hole_area: 50_000.0,
            min_area: 0.0,
            require_network_contact: false,
        }
    }
}

impl CleanParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("min_hole_area", self.min_hole_area), ("min_area", self.min_area)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be a non-negative area".into(),
                });
            }
        }
        Ok(())
    }
}

/// Final geometry for one threshold
#[derive(Debug, Clone)]
pub struct CleanedLayer {
    pub name: String,
    pub threshold: f64,
    /// Mask after the raster-side cleaning steps
    pub mask: Raster<u8>,
    pub geometry: MultiPolygon<f64>,
    pub area: f64,
    pub perimeter: f64,
    pub part_count: usize,
    /// Whether the repair pass was needed
    pub repaired: bool,
}

/// Clean a classified layer.
///
/// `drainage` is required when `require_network_contact` is set.
pub fn clean_layer(layer: &ClassifiedLayer, drainage: Option<&Raster<u8>>, params: &CleanParams) -> Result<CleanedLayer> {
    params.validate()?;

    let mut mask = if params.close_gaps_cells > 0 {
        closing(&layer.mask, &StructuringElement::Disk(params.close_gaps_cells))?
    } else {
        layer.mask.clone()
    };
    if params.min_hole_area > 0.0 {
        mask = fill_holes(&mask, params.min_hole_area);
    }
    if params.min_area > 0.0 {
        mask = remove_small(&mask, params.min_area);
    }
    if params.require_network_contact {
        let drainage = drainage.ok_or_else(|| Error::InvalidParameter {
            name: "require_network_contact",
            value: "true".into(),
            reason: "no drainage mask supplied".into(),
        })?;
        mask.grid_spec()
            .check_aligned(&drainage.grid_spec(), &layer.name, "drainage")?;
        mask = keep_touching(&mask, drainage);
    }

    // 4-connected parts never share an edge, so they dissolve by collection
    let mut geometry = MultiPolygon::new(polygonize(&mask));
    let mut repaired = false;
    if let Err(reason) = validate(&geometry) {
        let fixed = repair(&geometry);
        validate(&fixed).map_err(|again| Error::InvalidGeometry {
            layer: layer.name.clone(),
            reason: format!("{reason}; after repair: {again}"),
        })?;
        geometry = fixed;
        repaired = true;
    }

    Ok(CleanedLayer {
        name: layer.name.clone(),
        threshold: layer.threshold,
        area: vector::area(&geometry),
        perimeter: vector::perimeter(&geometry),
        part_count: vector::part_count(&geometry),
        mask,
        geometry,
        repaired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use approx::assert_relative_eq;
    use vbet_core::GeoTransform;

    fn likelihood(rows: &[&str]) -> Raster<f32> {
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|r| {
                r.bytes().map(|b| match b {
                    b'9' => 0.9,
                    b'6' => 0.6,
                    _ => 0.1,
                })
            })
            .collect();
        let mut r = Raster::from_vec(data, rows.len(), rows[0].len()).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows.len() as f64, 1.0, -1.0));
        r
    }

    fn surface() -> Raster<f32> {
        likelihood(&[
            "..........",
            ".66666666.",
            ".69999996.",
            ".69.99996.",
            ".69999996.",
            ".66666666.",
            "..........",
            "........6.",
            "..........",
        ])
    }

    fn params() -> CleanParams {
        CleanParams {
            close_gaps_cells: 0,
            min_hole_area: 2.0,
            min_area: 2.0,
            require_network_contact: false,
        }
    }

    #[test]
    fn test_holes_filled_and_slivers_removed() {
        let layer = classify(&surface(), 0.5).unwrap();
        let cleaned = clean_layer(&layer, None, &params()).unwrap();
        assert_eq!(cleaned.part_count, 1);
        assert_relative_eq!(cleaned.area, 40.0);
        assert_relative_eq!(cleaned.perimeter, 26.0);
        assert!(!cleaned.repaired);
        assert_eq!(cleaned.name, "vbet_50");
    }

    #[test]
    fn test_monotone_across_thresholds() {
        let p = CleanParams {
            close_gaps_cells: 1,
            ..params()
        };
        let low = clean_layer(&classify(&surface(), 0.5).unwrap(), None, &p).unwrap();
        let high = clean_layer(&classify(&surface(), 0.8).unwrap(), None, &p).unwrap();
        for (h, l) in high.mask.data().iter().zip(low.mask.data().iter()) {
            assert!(h <= l);
        }
        assert!(high.area <= low.area);
    }

    #[test]
    fn test_network_contact() {
        let layer = classify(&surface(), 0.5).unwrap();
        let mut drainage: Raster<u8> = layer.mask.with_same_meta();
        drainage.set(7, 8, 1).unwrap();
        let p = CleanParams {
            min_area: 0.0,
            require_network_contact: true,
            ..params()
        };
        let cleaned = clean_layer(&layer, Some(&drainage), &p).unwrap();
        assert_eq!(cleaned.part_count, 1);
        assert_relative_eq!(cleaned.area, 1.0);

        assert!(clean_layer(&layer, None, &p).is_err());
    }

    #[test]
    fn test_empty_layer() {
        let layer = classify(&likelihood(&["...", "..."]), 0.5).unwrap();
        let cleaned = clean_layer(&layer, None, &params()).unwrap();
        assert_eq!(cleaned.part_count, 0);
        assert_eq!(cleaned.area, 0.0);
    }
}
