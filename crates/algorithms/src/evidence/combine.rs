//! Fusion of slope, HAND and network proximity into a likelihood surface

use super::curve::InflectionCurve;
use super::distance::distance_to_kind;
use crate::maybe_rayon::*;
use crate::network::{FeatureKind, Network};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

/// How the normalized evidence values are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionRule {
    /// `(w_s S + w_h H + w_d C) / (w_s + w_h + w_d)`
    #[default]
    WeightedMean,
    /// `max(S * H, C)`: topographic evidence or channel evidence
    TopoChannelMax,
}

/// Weights of the three evidence components for [`FusionRule::WeightedMean`];
/// `distance` weighs the channel evidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub slope: f64,
    pub hand: f64,
    pub distance: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            slope: 1.0,
            hand: 1.0,
            distance: 1.0,
        }
    }
}

/// Evidence combiner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceParams {
    /// Slope (degrees) to likelihood
    pub slope_curve: InflectionCurve,
    /// HAND (vertical units) to likelihood
    pub hand_curve: InflectionCurve,
    /// Distance to the nearest reach (map units) to likelihood; linear
    /// decay to the search radius when unset
    pub distance_curve: Option<InflectionCurve>,
    /// Distance to the nearest waterbody (map units) to likelihood; linear
    /// decay to the search radius when unset
    pub flow_area_curve: Option<InflectionCurve>,
    pub weights: FusionWeights,
    pub fusion: FusionRule,
    /// Cells farther than this from every feature score exactly 0
    pub max_search_distance: f64,
    /// Also return the normalized components and the raw distance
    pub write_components: bool,
}

impl Default for EvidenceParams {
    fn default() -> Self {
        Self {
            slope_curve: InflectionCurve::default_slope(),
            hand_curve: InflectionCurve::default_hand(),
            distance_curve: None,
            flow_area_curve: None,
            weights: FusionWeights::default(),
            fusion: FusionRule::default(),
            max_search_distance: 500.0,
            write_components: false,
        }
    }
}

impl EvidenceParams {
    pub fn validate(&self) -> Result<()> {
        if !self.max_search_distance.is_finite() || self.max_search_distance <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "max_search_distance",
                value: self.max_search_distance.to_string(),
                reason: "must be a positive distance".into(),
            });
        }
        let w = self.weights;
        if self.fusion == FusionRule::WeightedMean {
            let all = [w.slope, w.hand, w.distance];
            if all.iter().any(|v| !v.is_finite() || *v < 0.0) || all.iter().sum::<f64>() <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "weights",
                    value: format!("{w:?}"),
                    reason: "weights must be non-negative with a positive sum".into(),
                });
            }
        }
        Ok(())
    }

    /// Reach distance curve in effect
    pub fn distance_curve(&self) -> InflectionCurve {
        self.distance_curve
            .clone()
            .unwrap_or_else(|| InflectionCurve::default_distance(self.max_search_distance))
    }

    /// Waterbody distance curve in effect
    pub fn flow_area_curve(&self) -> InflectionCurve {
        self.flow_area_curve
            .clone()
            .unwrap_or_else(|| InflectionCurve::default_distance(self.max_search_distance))
    }

    fn fuse(&self, s: f64, h: f64, channel: f64) -> f64 {
        let value = match self.fusion {
            FusionRule::WeightedMean => {
                let w = self.weights;
                (w.slope * s + w.hand * h + w.distance * channel) / (w.slope + w.hand + w.distance)
            }
            FusionRule::TopoChannelMax => (s * h).max(channel),
        };
        value.clamp(0.0, 1.0)
    }
}

/// Normalized evidence rasters, NaN where the input was nodata or the
/// features are beyond the search radius
#[derive(Debug, Clone)]
pub struct EvidenceComponents {
    pub slope: Raster<f32>,
    pub hand: Raster<f32>,
    /// Normalized reach distance
    pub distance: Raster<f32>,
    /// Normalized waterbody distance
    pub flow_area: Raster<f32>,
    /// `S * H`
    pub topo: Raster<f32>,
    /// Larger of the reach and waterbody terms
    pub channel: Raster<f32>,
    /// Map-unit distance to the nearest feature of either kind, NaN beyond
    /// the search radius
    pub raw_distance: Raster<f32>,
}

/// Output of [`compute_likelihood`]
#[derive(Debug, Clone)]
pub struct LikelihoodSurface {
    pub likelihood: Raster<f32>,
    pub components: Option<EvidenceComponents>,
}

/// Likelihood that each cell belongs to the valley bottom.
///
/// `slope` and `hand` must share one grid. Reach and waterbody distances
/// go through their own curves; the channel evidence is the larger of the
/// two. Cells with nodata slope or HAND and cells beyond the search radius
/// of every feature score exactly 0.
pub fn compute_likelihood(
    slope: &Raster<f64>,
    hand: &Raster<f64>,
    network: &Network,
    params: &EvidenceParams,
) -> Result<LikelihoodSurface> {
    params.validate()?;
    let spec = slope.grid_spec();
    spec.check_aligned(&hand.grid_spec(), "slope", "hand")?;

    let radius = params.max_search_distance;
    let reach_distance = distance_to_kind(network, &spec, radius, FeatureKind::Reach)?.distance;
    let area_distance = distance_to_kind(network, &spec, radius, FeatureKind::Waterbody)?.distance;
    let distance_curve = params.distance_curve();
    let flow_area_curve = params.flow_area_curve();
    let (rows, cols) = slope.shape();

    let cells: Vec<[f32; 8]> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    // SAFETY: row < rows, col < cols, all rasters share the grid
                    let (sv, hv, rv, av) = unsafe {
                        (
                            slope.get_unchecked(row, col),
                            hand.get_unchecked(row, col),
                            reach_distance.get_unchecked(row, col),
                            area_distance.get_unchecked(row, col),
                        )
                    };
                    let s = (!slope.is_nodata(sv)).then(|| params.slope_curve.evaluate(sv));
                    let h = (!hand.is_nodata(hv)).then(|| params.hand_curve.evaluate(hv));
                    let d = rv.is_finite().then(|| distance_curve.evaluate(rv));
                    let a = av.is_finite().then(|| flow_area_curve.evaluate(av));
                    let channel = match (d, a) {
                        (Some(d), Some(a)) => Some(d.max(a)),
                        (d, a) => d.or(a),
                    };
                    let topo = s.zip(h).map(|(s, h)| s * h);
                    let likelihood = match (s, h, channel) {
                        (Some(s), Some(h), Some(c)) => params.fuse(s, h, c),
                        _ => 0.0,
                    };
                    let nan = |v: Option<f64>| v.map_or(f32::NAN, |v| v as f32);
                    let raw = rv.min(av);
                    [
                        likelihood as f32,
                        nan(s),
                        nan(h),
                        nan(d),
                        nan(a),
                        nan(topo),
                        nan(channel),
                        nan(raw.is_finite().then_some(raw)),
                    ]
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let layer = |k: usize| -> Result<Raster<f32>> {
        let mut out = slope.with_same_meta::<f32>();
        *out.data_mut() = Array2::from_shape_vec((rows, cols), cells.iter().map(|c| c[k]).collect())
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(out)
    };

    let likelihood = layer(0)?;
    let components = if params.write_components {
        let component = |k: usize| -> Result<Raster<f32>> {
            let mut r = layer(k)?;
            r.set_nodata(Some(f32::NAN));
            Ok(r)
        };
        Some(EvidenceComponents {
            slope: component(1)?,
            hand: component(2)?,
            distance: component(3)?,
            flow_area: component(4)?,
            topo: component(5)?,
            channel: component(6)?,
            raw_distance: component(7)?,
        })
    } else {
        None
    };

    Ok(LikelihoodSurface { likelihood, components })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Reach, Waterbody};
    use approx::assert_relative_eq;
    use geo::{line_string, polygon, MultiLineString, MultiPolygon};
    use vbet_core::GeoTransform;

    fn grid(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(10, 10, value);
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r
    }

    fn centre_line() -> Network {
        Network {
            reaches: vec![Reach {
                id: 1.into(),
                reach_code: "46006".into(),
                geometry: MultiLineString::new(vec![line_string![(x: 5.0, y: 0.0), (x: 5.0, y: 10.0)]]),
                half_width: 0.0,
            }],
            ..Default::default()
        }
    }

    fn params() -> EvidenceParams {
        EvidenceParams {
            max_search_distance: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_decays_from_line() {
        let surface = compute_likelihood(&grid(0.0), &grid(0.0), &centre_line(), &params()).unwrap();
        let l = surface.likelihood.data();
        // 0.5 from the line: D = 0.9
        assert_relative_eq!(l[[5, 4]] as f64, (2.0 + 0.9) / 3.0, epsilon = 1e-6);
        assert!(l[[5, 3]] < l[[5, 4]]);
        assert!(l[[5, 1]] < l[[5, 3]]);
        assert!(l.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_beyond_radius_is_zero() {
        let p = EvidenceParams {
            max_search_distance: 2.0,
            ..Default::default()
        };
        let surface = compute_likelihood(&grid(0.0), &grid(0.0), &centre_line(), &p).unwrap();
        assert_eq!(surface.likelihood.data()[[5, 0]], 0.0);
        assert!(surface.likelihood.data()[[5, 4]] > 0.0);
    }

    #[test]
    fn test_nodata_scores_zero() {
        let mut hand = grid(0.0);
        hand.set(5, 4, f64::NAN).unwrap();
        let surface = compute_likelihood(&grid(0.0), &hand, &centre_line(), &params()).unwrap();
        assert_eq!(surface.likelihood.data()[[5, 4]], 0.0);
    }

    #[test]
    fn test_topo_channel_max() {
        let p = EvidenceParams {
            fusion: FusionRule::TopoChannelMax,
            ..params()
        };
        // steep everywhere: S = 0, so likelihood is the distance term
        let surface = compute_likelihood(&grid(30.0), &grid(0.0), &centre_line(), &p).unwrap();
        assert_relative_eq!(surface.likelihood.data()[[5, 4]] as f64, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_components() {
        let p = EvidenceParams {
            write_components: true,
            ..params()
        };
        let surface = compute_likelihood(&grid(7.5), &grid(0.0), &centre_line(), &p).unwrap();
        let c = surface.components.unwrap();
        assert_relative_eq!(c.slope.data()[[0, 0]] as f64, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.raw_distance.data()[[2, 7]] as f64, 2.5, epsilon = 1e-6);
    }

    fn with_pond(mut network: Network) -> Network {
        network.waterbodies.push(Waterbody {
            id: 1.into(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 10.0), (x: 0.0, y: 10.0)
            ]]),
        });
        network
    }

    #[test]
    fn test_channel_takes_larger_of_reach_and_flow_area() {
        let p = EvidenceParams {
            write_components: true,
            ..params()
        };
        let surface = compute_likelihood(&grid(0.0), &grid(0.0), &with_pond(centre_line()), &p).unwrap();
        let c = surface.components.unwrap();
        // column 2: 2.5 from the reach, 0.5 from the pond
        assert_relative_eq!(c.distance.data()[[5, 2]] as f64, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.flow_area.data()[[5, 2]] as f64, 0.9, epsilon = 1e-6);
        assert_relative_eq!(c.channel.data()[[5, 2]] as f64, 0.9, epsilon = 1e-6);
        // inside the pond
        assert_relative_eq!(c.channel.data()[[5, 1]] as f64, 1.0, epsilon = 1e-6);
        assert_relative_eq!(c.raw_distance.data()[[5, 1]] as f64, 0.0, epsilon = 1e-6);
        assert_relative_eq!(c.topo.data()[[5, 2]] as f64, 1.0, epsilon = 1e-6);
        assert_relative_eq!(surface.likelihood.data()[[5, 2]] as f64, 2.9 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_flow_area_curve_is_separate() {
        let p = EvidenceParams {
            fusion: FusionRule::TopoChannelMax,
            flow_area_curve: Some(InflectionCurve::new(vec![(0.0, 1.0), (1.0, 1.0), (2.0, 0.0)]).unwrap()),
            write_components: true,
            ..params()
        };
        let surface = compute_likelihood(&grid(30.0), &grid(0.0), &with_pond(centre_line()), &p).unwrap();
        let c = surface.components.unwrap();
        // 0.5 from the pond sits on the flat part of its curve
        assert_relative_eq!(c.flow_area.data()[[5, 2]] as f64, 1.0, epsilon = 1e-6);
        assert_relative_eq!(c.topo.data()[[5, 2]] as f64, 0.0, epsilon = 1e-6);
        assert_relative_eq!(surface.likelihood.data()[[5, 2]] as f64, 1.0, epsilon = 1e-6);
        // the reach keeps the default linear decay
        assert_relative_eq!(c.distance.data()[[5, 4]] as f64, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_grid_mismatch() {
        let mut hand = grid(0.0);
        hand.set_transform(GeoTransform::new(0.0, 10.0, 2.0, -2.0));
        let err = compute_likelihood(&grid(0.0), &hand, &centre_line(), &params()).unwrap_err();
        assert!(matches!(err, Error::GridMismatch { .. }));
    }

    #[test]
    fn test_rejects_zero_weights() {
        let p = EvidenceParams {
            weights: FusionWeights {
                slope: 0.0,
                hand: 0.0,
                distance: 0.0,
            },
            ..params()
        };
        assert!(p.validate().is_err());
    }
}
