//! Hillshade (shaded relief), 0-255

use super::slope::horn_gradient;
use crate::maybe_rayon::*;
use ndarray::Array2;
use std::f64::consts::PI;
use vbet_core::raster::Raster;
use vbet_core::{Error, Result};

/// Illumination geometry
#[derive(Debug, Clone)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees (0 = North, clockwise)
    pub azimuth: f64,
    /// Sun altitude in degrees above horizon
    pub altitude: f64,
    pub z_factor: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
            z_factor: 1.0,
        }
    }
}

/// Shaded relief scaled to 0-255. Edge and nodata cells are NaN.
pub fn hillshade(dem: &Raster<f64>, params: &HillshadeParams) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let eight_h = 8.0 * dem.cell_size() / params.z_factor;

    let azimuth_rad = (360.0 - params.azimuth + 90.0).to_radians();
    let zenith_rad = (90.0 - params.altitude).to_radians();
    let (sin_zenith, cos_zenith) = zenith_rad.sin_cos();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let Some((dz_dx, dz_dy)) = horn_gradient(dem, row, col, eight_h) else {
                        return f64::NAN;
                    };
                    let slope_rad = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
                    let aspect_rad = if dz_dx.abs() < 1e-10 && dz_dy.abs() < 1e-10 {
                        0.0
                    } else {
                        let aspect = dz_dy.atan2(-dz_dx);
                        if aspect < 0.0 {
                            2.0 * PI + aspect
                        } else {
                            aspect
                        }
                    };

                    let shade = cos_zenith * slope_rad.cos()
                        + sin_zenith * slope_rad.sin() * (azimuth_rad - aspect_rad).cos();
                    (shade.clamp(0.0, 1.0) * 255.0).round()
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

#[cfg(test)]
mod tests {
    use super::*;
    use vbet_core::GeoTransform;

    fn dem(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_hillshade_flat_matches_altitude() {
        let result = hillshade(&dem(|_, _| 50.0), &HillshadeParams::default()).unwrap();
        let expected = (45f64.to_radians().sin() * 255.0).round();
        assert_eq!(result.get(5, 5).unwrap(), expected);
    }

    #[test]
    fn test_hillshade_range_and_lighting() {
        let east = hillshade(&dem(|_, c| c as f64 * 2.0), &HillshadeParams::default()).unwrap();
        let west = hillshade(&dem(|_, c| (9 - c) as f64 * 2.0), &HillshadeParams::default()).unwrap();

        for v in east.data().iter().chain(west.data().iter()).filter(|v| !v.is_nan()) {
            assert!((0.0..=255.0).contains(v));
        }
        // Rising to the east means the slope faces west, toward the NW sun
        assert!(east.get(5, 5).unwrap() > west.get(5, 5).unwrap());
    }
}
