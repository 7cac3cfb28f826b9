//! Drainage network and waterbody loading
//!
//! Filters line features by reach code, assigns stable identifiers,
//! reprojects into the terrain CRS and keeps waterbody polygons as
//! zero-distance anchors.

mod rasterize;

pub use rasterize::{rasterize_lines, rasterize_polygons};

use geo::{Geometry, LineString, MultiLineString, MultiPolygon};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use vbet_core::crs::Transformer;
use vbet_core::raster::{GridSpec, Raster};
use vbet_core::vector::{Feature, FeatureCollection, FeatureId};
use vbet_core::{Error, Result, CRS};

/// Network loading options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// Attribute holding the reach code (NHD `FCode`)
    pub reach_code_field: String,
    /// Allowed reach codes; `None` keeps every feature
    pub reach_codes: Option<Vec<String>>,
    /// Property used as identifier when the GeoJSON id is not numeric
    pub id_field: Option<String>,
    /// Attribute holding the channel width in map units
    pub width_field: Option<String>,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            reach_code_field: "FCode".to_string(),
            reach_codes: None,
            id_field: None,
            width_field: None,
        }
    }
}

/// Kind of anchor feature. Reaches sort before waterbodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Reach,
    Waterbody,
}

/// Identifier of an anchor feature.
///
/// Features carrying an identifier keep it; the rest get a digest of their
/// content, so neither depends on where the feature sits in its layer. The
/// two namespaces never collide and given ids sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnchorId {
    /// Numeric GeoJSON id or the configured id attribute
    Given(i64),
    /// Leading 64 bits of a SHA-256 over geometry and attributes
    Derived(u64),
}

impl From<i64> for AnchorId {
    fn from(id: i64) -> Self {
        AnchorId::Given(id)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorId::Given(id) => write!(f, "{id}"),
            AnchorId::Derived(digest) => write!(f, "#{digest:016x}"),
        }
    }
}

/// Canonical identity of an anchor feature, the tie-break order for
/// nearest-feature attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureKey {
    pub kind: FeatureKind,
    pub id: AnchorId,
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FeatureKind::Reach => write!(f, "reach:{}", self.id),
            FeatureKind::Waterbody => write!(f, "waterbody:{}", self.id),
        }
    }
}

/// A qualifying stream reach
#[derive(Debug, Clone, PartialEq)]
pub struct Reach {
    pub id: AnchorId,
    pub reach_code: String,
    pub geometry: MultiLineString<f64>,
    /// Half the channel width, already floored at half a cell; 0 when
    /// widths are not configured
    pub half_width: f64,
}

/// A waterbody (flow area) polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Waterbody {
    pub id: AnchorId,
    pub geometry: MultiPolygon<f64>,
}

/// Filtered network in the terrain CRS
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub reaches: Vec<Reach>,
    pub waterbodies: Vec<Waterbody>,
    /// Line features read before reach-code filtering
    pub total_lines: usize,
    /// Network features skipped because they are not lines
    pub skipped_geometries: usize,
    /// Features without an identifier dropped as exact copies of another
    pub duplicate_features: usize,
}

impl Network {
    pub fn is_empty(&self) -> bool {
        self.reaches.is_empty() && self.waterbodies.is_empty()
    }

    /// Largest reach half width, the extra reach beyond the search radius
    pub fn max_half_width(&self) -> f64 {
        self.reaches.iter().map(|r| r.half_width).fold(0.0, f64::max)
    }

    /// Mask of drainage cells: cells crossed by a reach or inside a waterbody
    pub fn drainage_mask(&self, spec: &GridSpec) -> Raster<u8> {
        let lines: Vec<&LineString<f64>> = self.reaches.iter().flat_map(|r| r.geometry.0.iter()).collect();
        let mut mask = rasterize_lines(&lines, spec);
        let polygons: Vec<_> = self.waterbodies.iter().flat_map(|w| w.geometry.0.iter()).collect();
        let inside = rasterize_polygons(&polygons, spec);
        mask.data_mut().zip_mut_with(inside.data(), |m, &w| *m |= w);
        mask
    }
}

/// Load and filter the network.
///
/// * `target_crs` - CRS of the terrain grid; `None` leaves coordinates as read
/// * `cell_size` - terrain cell size, the floor for channel half widths
///
/// Sources without a CRS are taken as EPSG:4326. Reach codes compare as
/// strings with integral numbers rendered without a fraction.
pub fn load_network(
    lines: &FeatureCollection,
    waterbodies: &FeatureCollection,
    target_crs: Option<&CRS>,
    cell_size: f64,
    params: &NetworkParams,
) -> Result<Network> {
    let line_transform = transformer_for(lines, target_crs)?;
    let area_transform = transformer_for(waterbodies, target_crs)?;

    let allowed: Option<HashSet<&str>> = params
        .reach_codes
        .as_ref()
        .map(|codes| codes.iter().map(|c| c.trim()).collect());

    let mut network = Network::default();
    let mut seen_ids = HashSet::new();

    for feature in lines.iter() {
        let geometry = match &feature.geometry {
            Some(Geometry::LineString(ls)) => MultiLineString::new(vec![ls.clone()]),
            Some(Geometry::MultiLineString(mls)) => mls.clone(),
            _ => {
                network.skipped_geometries += 1;
                continue;
            }
        };
        network.total_lines += 1;

        let given = given_id(feature, params.id_field.as_deref())?;
        if let Some(id) = given {
            if !seen_ids.insert(id) {
                return Err(Error::format("network", format!("duplicate feature id {id}")));
            }
        }

        let reach_code = feature
            .get_property(&params.reach_code_field)
            .map(|v| v.to_string())
            .unwrap_or_default();
        if let Some(allowed) = &allowed {
            if !allowed.contains(reach_code.as_str()) {
                continue;
            }
        }

        let half_width = match &params.width_field {
            Some(field) => {
                let width = feature
                    .get_property(field)
                    .and_then(|v| v.as_f64())
                    .filter(|w| w.is_finite() && *w > 0.0)
                    .unwrap_or(0.0);
                (width / 2.0).max(cell_size / 2.0)
            }
            None => 0.0,
        };

        let id = match given {
            Some(id) => id,
            None => {
                let id = AnchorId::Derived(line_digest(&geometry, &reach_code, half_width));
                if !seen_ids.insert(id) {
                    network.duplicate_features += 1;
                    continue;
                }
                id
            }
        };

        let geometry = match &line_transform {
            Some(t) => match t.transform_geometry(&Geometry::MultiLineString(geometry))? {
                Geometry::MultiLineString(mls) => mls,
                _ => unreachable!("reprojection preserves geometry type"),
            },
            None => geometry,
        };

        network.reaches.push(Reach {
            id,
            reach_code,
            geometry,
            half_width,
        });
    }

    if network.reaches.is_empty() {
        return Err(Error::EmptyNetwork {
            total: network.total_lines,
            allowed: params
                .reach_codes
                .as_ref()
                .map(|c| c.join(","))
                .unwrap_or_else(|| "<all>".to_string()),
        });
    }

    let mut seen_ids = HashSet::new();
    for feature in waterbodies.iter() {
        let geometry = match &feature.geometry {
            Some(Geometry::Polygon(p)) => MultiPolygon::new(vec![p.clone()]),
            Some(Geometry::MultiPolygon(mp)) => mp.clone(),
            _ => continue,
        };
        let id = match &feature.id {
            Some(FeatureId::Number(n)) => {
                let id = AnchorId::Given(*n);
                if !seen_ids.insert(id) {
                    return Err(Error::format("waterbodies", format!("duplicate feature id {id}")));
                }
                id
            }
            _ => {
                let id = AnchorId::Derived(polygon_digest(&geometry));
                if !seen_ids.insert(id) {
                    network.duplicate_features += 1;
                    continue;
                }
                id
            }
        };
        let geometry = match &area_transform {
            Some(t) => match t.transform_geometry(&Geometry::MultiPolygon(geometry))? {
                Geometry::MultiPolygon(mp) => mp,
                _ => unreachable!("reprojection preserves geometry type"),
            },
            None => geometry,
        };
        network.waterbodies.push(Waterbody { id, geometry });
    }

    network.reaches.sort_by_key(|r| r.id);
    network.waterbodies.sort_by_key(|w| w.id);

    Ok(network)
}

fn transformer_for(layer: &FeatureCollection, target: Option<&CRS>) -> Result<Option<Transformer>> {
    let Some(target) = target else {
        return Ok(None);
    };
    let source = layer.crs.clone().unwrap_or_else(CRS::wgs84);
    if source.is_equivalent(target) {
        return Ok(None);
    }
    Transformer::new(&source, target).map(Some)
}

fn given_id(feature: &Feature, id_field: Option<&str>) -> Result<Option<AnchorId>> {
    if let Some(FeatureId::Number(n)) = &feature.id {
        return Ok(Some(AnchorId::Given(*n)));
    }
    if let Some(field) = id_field {
        if let Some(value) = feature.get_property(field) {
            return value.as_i64().map(|n| Some(AnchorId::Given(n))).ok_or_else(|| {
                Error::format("network", format!("id attribute {field} = {value} is not an integer"))
            });
        }
    }
    Ok(None)
}

fn update_ring(hasher: &mut Sha256, ring: &LineString<f64>) {
    hasher.update((ring.0.len() as u64).to_le_bytes());
    for c in &ring.0 {
        hasher.update(c.x.to_bits().to_le_bytes());
        hasher.update(c.y.to_bits().to_le_bytes());
    }
}

fn leading_u64(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Digest of a reach in its source coordinates
fn line_digest(geometry: &MultiLineString<f64>, reach_code: &str, half_width: f64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"reach");
    hasher.update((reach_code.len() as u64).to_le_bytes());
    hasher.update(reach_code.as_bytes());
    hasher.update(half_width.to_bits().to_le_bytes());
    for line in &geometry.0 {
        update_ring(&mut hasher, line);
    }
    leading_u64(hasher)
}

fn polygon_digest(geometry: &MultiPolygon<f64>) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"waterbody");
    for polygon in &geometry.0 {
        hasher.update((polygon.interiors().len() as u64).to_le_bytes());
        update_ring(&mut hasher, polygon.exterior());
        for ring in polygon.interiors() {
            update_ring(&mut hasher, ring);
        }
    }
    leading_u64(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};
    use vbet_core::vector::AttributeValue;

    fn line_feature(id: i64, code: i64, x: f64) -> Feature {
        Feature::new(line_string![(x: x, y: 0.0), (x: x, y: 10.0)].into())
            .with_id(FeatureId::Number(id))
            .with_property("FCode", AttributeValue::Int(code))
    }

    fn utm_layer(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            features,
            crs: Some(CRS::from_epsg(32612)),
        }
    }

    #[test]
    fn test_filter_by_reach_code() {
        let lines = utm_layer(vec![line_feature(1, 46006, 1.0), line_feature(2, 46003, 2.0)]);
        let params = NetworkParams {
            reach_codes: Some(vec!["46006".into()]),
            ..Default::default()
        };
        let crs = CRS::from_epsg(32612);
        let network = load_network(&lines, &FeatureCollection::new(), Some(&crs), 1.0, &params).unwrap();
        assert_eq!(network.reaches.len(), 1);
        assert_eq!(network.reaches[0].id, AnchorId::Given(1));
        assert_eq!(network.total_lines, 2);
    }

    #[test]
    fn test_no_allow_list_keeps_all() {
        let lines = utm_layer(vec![line_feature(1, 3, 1.0), line_feature(2, 4, 2.0)]);
        let network = load_network(&lines, &FeatureCollection::new(), None, 1.0, &NetworkParams::default()).unwrap();
        assert_eq!(network.reaches.len(), 2);
    }

    #[test]
    fn test_empty_network() {
        let lines = utm_layer(vec![line_feature(1, 3, 1.0), line_feature(2, 3, 2.0)]);
        let params = NetworkParams {
            reach_codes: Some(vec!["1".into(), "2".into()]),
            ..Default::default()
        };
        let err = load_network(&lines, &FeatureCollection::new(), None, 1.0, &params).unwrap_err();
        match err {
            Error::EmptyNetwork { total, allowed } => {
                assert_eq!(total, 2);
                assert_eq!(allowed, "1,2");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let lines = utm_layer(vec![line_feature(5, 3, 1.0), line_feature(5, 3, 2.0)]);
        let err = load_network(&lines, &FeatureCollection::new(), None, 1.0, &NetworkParams::default()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_points_skipped_and_counted() {
        let mut lines = utm_layer(vec![line_feature(1, 3, 1.0)]);
        lines.push(Feature::new(geo::Point::new(0.0, 0.0).into()));
        let network = load_network(&lines, &FeatureCollection::new(), None, 1.0, &NetworkParams::default()).unwrap();
        assert_eq!(network.skipped_geometries, 1);
        assert_eq!(network.reaches.len(), 1);
    }

    #[test]
    fn test_id_fallbacks_and_width_floor() {
        let lines = utm_layer(vec![
            Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into())
                .with_property("ReachID", AttributeValue::Float(42.0))
                .with_property("width", AttributeValue::Float(20.0)),
            Feature::new(line_string![(x: 0.0, y: 5.0), (x: 1.0, y: 5.0)].into())
                .with_property("width", AttributeValue::Float(1.0)),
        ]);
        let params = NetworkParams {
            id_field: Some("ReachID".into()),
            width_field: Some("width".into()),
            ..Default::default()
        };
        let network = load_network(&lines, &FeatureCollection::new(), None, 4.0, &params).unwrap();
        assert_eq!(network.reaches[0].id, AnchorId::Given(42));
        assert!(matches!(network.reaches[1].id, AnchorId::Derived(_)));
        assert_eq!(network.reaches[0].half_width, 10.0);
        assert_eq!(network.reaches[1].half_width, 2.0);
    }

    fn unnamed_line(x: f64) -> Feature {
        Feature::new(line_string![(x: x, y: 0.0), (x: x, y: 10.0)].into())
            .with_property("FCode", AttributeValue::Int(46006))
    }

    #[test]
    fn test_derived_ids_ignore_feature_order() {
        let forward = utm_layer(vec![unnamed_line(2.5), unnamed_line(6.5)]);
        let reverse = utm_layer(vec![unnamed_line(6.5), unnamed_line(2.5)]);
        let params = NetworkParams::default();
        let a = load_network(&forward, &FeatureCollection::new(), None, 1.0, &params).unwrap();
        let b = load_network(&reverse, &FeatureCollection::new(), None, 1.0, &params).unwrap();
        assert_eq!(a.reaches, b.reaches);
        let ids: HashSet<_> = a.reaches.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_given_and_derived_ids_coexist() {
        // the unnamed line sits at position 1, the same number as the given id
        let lines = utm_layer(vec![line_feature(1, 46006, 2.5), unnamed_line(6.5)]);
        let network = load_network(&lines, &FeatureCollection::new(), None, 1.0, &NetworkParams::default()).unwrap();
        assert_eq!(network.reaches.len(), 2);
        assert_eq!(network.reaches[0].id, AnchorId::Given(1));
        assert!(matches!(network.reaches[1].id, AnchorId::Derived(_)));
    }

    #[test]
    fn test_exact_copies_without_id_collapse() {
        let lines = utm_layer(vec![unnamed_line(2.5), unnamed_line(2.5), unnamed_line(6.5)]);
        let network = load_network(&lines, &FeatureCollection::new(), None, 1.0, &NetworkParams::default()).unwrap();
        assert_eq!(network.reaches.len(), 2);
        assert_eq!(network.duplicate_features, 1);
    }

    #[test]
    fn test_waterbody_ids_ignore_feature_order() {
        let pond = |x: f64| -> Feature {
            Feature::new(polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0)].into())
        };
        let lines = utm_layer(vec![line_feature(1, 46006, 0.5)]);
        let forward = utm_layer(vec![pond(2.0), pond(6.0)]);
        let reverse = utm_layer(vec![pond(6.0), pond(2.0)]);
        let params = NetworkParams::default();
        let a = load_network(&lines, &forward, None, 1.0, &params).unwrap();
        let b = load_network(&lines, &reverse, None, 1.0, &params).unwrap();
        assert_eq!(a.waterbodies, b.waterbodies);
        assert_ne!(a.waterbodies[0].id, a.waterbodies[1].id);
    }

    #[test]
    fn test_reprojects_from_wgs84_default() {
        let mut lines = FeatureCollection::new();
        lines.push(
            Feature::new(line_string![(x: -111.80, y: 41.70), (x: -111.79, y: 41.71)].into())
                .with_id(FeatureId::Number(1)),
        );
        let waterbodies = FeatureCollection {
            features: vec![Feature::new(
                polygon![(x: -111.8, y: 41.7), (x: -111.79, y: 41.7), (x: -111.79, y: 41.71)].into(),
            )],
            crs: Some(CRS::wgs84()),
        };
        let crs = CRS::from_epsg(32612);
        let network = load_network(&lines, &waterbodies, Some(&crs), 10.0, &NetworkParams::default()).unwrap();
        let first = network.reaches[0].geometry.0[0].0[0];
        assert!(first.x > 400_000.0 && first.x < 500_000.0);
        assert!(first.y > 4_600_000.0);
        assert_eq!(network.waterbodies.len(), 1);
    }

    #[test]
    fn test_unsupported_crs_is_fatal() {
        let mut lines = utm_layer(vec![line_feature(1, 3, 1.0)]);
        lines.crs = Some(CRS::from_epsg(26912));
        let crs = CRS::from_epsg(32612);
        let err = load_network(&lines, &FeatureCollection::new(), Some(&crs), 1.0, &NetworkParams::default()).unwrap_err();
        assert!(matches!(err, Error::Reprojection { .. }));
    }
}
