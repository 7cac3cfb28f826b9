//! Pure-Rust reprojection between WGS84, Web Mercator and UTM
//! (Snyder 1987, USGS Prof. Paper 1395).
//!
//! Covers EPSG 4326, 3857, 326xx (UTM North) and 327xx (UTM South). Any
//! other pair fails with [`Error::Reprojection`]; hydrography is never
//! silently left in a foreign CRS.

use super::CRS;
use crate::error::{Error, Result};
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Supported projections
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude / latitude in degrees (EPSG:4326)
    Geographic,
    /// Spherical Web Mercator (EPSG:3857)
    WebMercator,
    /// Universal Transverse Mercator zone
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Resolve a CRS into a supported projection.
    pub fn from_crs(crs: &CRS) -> Option<Self> {
        let epsg = crs.epsg()?;
        match epsg {
            4326 => Some(Projection::Geographic),
            3857 | 900913 => Some(Projection::WebMercator),
            _ => parse_utm_epsg(epsg).map(|(zone, north)| Projection::Utm { zone, north }),
        }
    }

    fn to_wgs84(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => {
                let lon = (x / A).to_degrees();
                let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
                (lon, lat)
            }
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_wgs84(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => {
                let x = A * lon.to_radians();
                let y = A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                (x, y)
            }
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Point transformer between two CRSs, pivoting through WGS84.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    source: Projection,
    target: Projection,
}

impl Transformer {
    /// Build a transformer, failing for unsupported CRS pairs.
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let unsupported = |crs: &CRS| Error::Reprojection {
            from: from.identifier(),
            to: to.identifier(),
            reason: format!("unsupported CRS {}", crs.identifier()),
        };
        let source = Projection::from_crs(from).ok_or_else(|| unsupported(from))?;
        let target = Projection::from_crs(to).ok_or_else(|| unsupported(to))?;
        Ok(Self { source, target })
    }

    /// Whether the transformation is the identity
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    /// Transform one coordinate
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.source.to_wgs84(x, y);
        self.target.from_wgs84(lon, lat)
    }

    fn coord(&self, c: &Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = self.transform(c.x, c.y);
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::Reprojection {
                from: format!("{:?}", self.source),
                to: format!("{:?}", self.target),
                reason: format!("coordinate ({}, {}) has no finite image", c.x, c.y),
            });
        }
        Ok(Coord { x, y })
    }

    fn line_string(&self, ls: &LineString<f64>) -> Result<LineString<f64>> {
        ls.0.iter()
            .map(|c| self.coord(c))
            .collect::<Result<Vec<_>>>()
            .map(LineString::new)
    }

    fn polygon(&self, p: &Polygon<f64>) -> Result<Polygon<f64>> {
        let exterior = self.line_string(p.exterior())?;
        let interiors = p
            .interiors()
            .iter()
            .map(|r| self.line_string(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    /// Transform every coordinate of a geometry.
    ///
    /// Points, lines and polygons (single and multi) are supported.
    pub fn transform_geometry(&self, geom: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geom.clone());
        }
        Ok(match geom {
            Geometry::Point(p) => Geometry::Point(Point::from(self.coord(&p.0)?)),
            Geometry::LineString(ls) => Geometry::LineString(self.line_string(ls)?),
            Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
                mls.0
                    .iter()
                    .map(|ls| self.line_string(ls))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::Polygon(p) => Geometry::Polygon(self.polygon(p)?),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
                mp.0.iter().map(|p| self.polygon(p)).collect::<Result<Vec<_>>>()?,
            )),
            other => {
                return Err(Error::Reprojection {
                    from: format!("{:?}", self.source),
                    to: format!("{:?}", self.target),
                    reason: format!("unsupported geometry type {:?}", geometry_name(other)),
                })
            }
        })
    }
}

fn geometry_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// WGS84 (lon, lat) degrees → UTM (easting, northing) metres. Snyder eq. 8-9, 8-10.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north { northing } else { northing + FALSE_NORTHING_SOUTH };
    (easting, northing)
}

/// UTM (easting, northing) metres → WGS84 (lon, lat) degrees. Snyder eq. 8-12 to 8-25.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north { northing } else { northing - FALSE_NORTHING_SOUTH };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi = phi1.sin();
    let cos_phi = phi1.cos();
    let tan_phi = phi1.tan();

    let c1 = E_PRIME2 * cos_phi * cos_phi;
    let t1 = tan_phi * tan_phi;
    let denom = 1.0 - E2 * sin_phi * sin_phi;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);
    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_utm_zones() {
        assert_eq!(parse_utm_epsg(32612), Some((12, true)));
        assert_eq!(parse_utm_epsg(32721), Some((21, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // Reference: pyproj Transformer.from_crs(4326, 32630).transform(-3.7037, 40.4168)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn utm_inverse_roundtrip() {
        for &(lon, lat, zone, north) in &[
            (-111.8, 41.7, 12, true),
            (-58.3816, -34.6037, 21, false),
            (-3.0, 0.5, 30, true),
        ] {
            let (e, n) = wgs84_to_utm(lon, lat, zone, north);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone, north);
            assert_close(lon2, lon, 1e-6, "lon");
            assert_close(lat2, lat, 1e-6, "lat");
        }
    }

    #[test]
    fn web_mercator_roundtrip() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let back = Transformer::new(&CRS::web_mercator(), &CRS::wgs84()).unwrap();
        let (x, y) = t.transform(-111.8, 41.7);
        let (lon, lat) = back.transform(x, y);
        assert_close(lon, -111.8, 1e-9, "lon");
        assert_close(lat, 41.7, 1e-9, "lat");
    }

    #[test]
    fn unsupported_crs_fails() {
        let err = Transformer::new(&CRS::from_epsg(26912), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::Reprojection { .. }));
    }

    #[test]
    fn transform_line_geometry() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32612)).unwrap();
        let line = Geometry::LineString(LineString::from(vec![(-111.8, 41.7), (-111.79, 41.71)]));
        let Geometry::LineString(out) = t.transform_geometry(&line).unwrap() else {
            panic!("expected a line string");
        };
        assert!(out.0[0].x > 100_000.0 && out.0[0].y > 4_000_000.0);
    }
}
