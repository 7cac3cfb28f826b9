//! Piecewise-linear transforms from a terrain measure to likelihood

use serde::{Deserialize, Serialize};
use vbet_core::{Error, Result};

/// Monotone non-increasing piecewise-linear function.
///
/// Values between breakpoints are interpolated linearly; inputs outside
/// the breakpoint range map to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct InflectionCurve {
    points: Vec<(f64, f64)>,
}

impl InflectionCurve {
    /// Build a curve from `(x, likelihood)` breakpoints.
    ///
    /// Requires at least two points, a first `x <= 0`, strictly increasing
    /// `x`, likelihoods in `[0, 1]` and never increasing.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "inflection_points",
            value: format!("{points:?}"),
            reason: reason.to_string(),
        };
        if points.len() < 2 {
            return Err(invalid("at least two breakpoints are required"));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(invalid("breakpoints must be finite"));
        }
        if points[0].0 > 0.0 {
            return Err(invalid("the first breakpoint must be at or below 0"));
        }
        if points.iter().any(|&(_, y)| !(0.0..=1.0).contains(&y)) {
            return Err(invalid("likelihoods must lie in [0, 1]"));
        }
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(invalid("breakpoints must be strictly increasing"));
            }
            if pair[1].1 > pair[0].1 {
                return Err(invalid("likelihood must not increase with the measure"));
            }
        }
        Ok(Self { points })
    }

    /// Likelihood of `value`
    pub fn evaluate(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        let (first, last) = (self.points[0], self.points[self.points.len() - 1]);
        if value < first.0 || value > last.0 {
            return 0.0;
        }
        if value == first.0 {
            return first.1;
        }
        // first index with x >= value; guaranteed in 1..len
        let i = self.points.partition_point(|&(x, _)| x < value);
        let (x0, y0) = self.points[i - 1];
        let (x1, y1) = self.points[i];
        y0 + (value - x0) / (x1 - x0) * (y1 - y0)
    }

    /// Default slope transform in degrees
    pub fn default_slope() -> Self {
        Self {
            points: vec![(0.0, 1.0), (3.0, 1.0), (12.0, 0.0)],
        }
    }

    /// Default HAND transform in map units
    pub fn default_hand() -> Self {
        Self {
            points: vec![(0.0, 1.0), (5.0, 1.0), (50.0, 0.0)],
        }
    }

    /// Default distance transform: linear decay to 0 at `max_distance`
    pub fn default_distance(max_distance: f64) -> Self {
        Self {
            points: vec![(0.0, 1.0), (max_distance.max(f64::EPSILON), 0.0)],
        }
    }
}

impl TryFrom<Vec<(f64, f64)>> for InflectionCurve {
    type Error = Error;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<InflectionCurve> for Vec<(f64, f64)> {
    fn from(curve: InflectionCurve) -> Self {
        curve.points
    }
}
