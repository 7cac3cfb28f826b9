//! GeoJSON layer reading and writing
//!
//! The layer CRS travels in the legacy `crs` foreign member
//! (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::<code>"}}`).

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection, FeatureId};
use geojson::{GeoJson, JsonObject, JsonValue};
use serde_json::json;
use std::path::Path;

/// Read a GeoJSON FeatureCollection (a lone Feature is accepted too)
pub fn read_layer<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    read_layer_str(&text).map_err(|e| match e {
        Error::Format { reason, .. } => Error::format(path, reason),
        other => other,
    })
}

/// Parse a GeoJSON document held in memory
pub fn read_layer_str(text: &str) -> Result<FeatureCollection> {
    let fail = |reason: String| Error::format("<geojson>", reason);
    let document: GeoJson = text.parse().map_err(|e| fail(format!("{e}")))?;

    let (features, foreign) = match document {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(_) => return Err(fail("expected a FeatureCollection".into())),
    };

    let mut layer = FeatureCollection::with_crs(foreign.as_ref().and_then(parse_crs_member));
    for (index, feature) in features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => Some(
                geo_types::Geometry::<f64>::try_from(g)
                    .map_err(|e| fail(format!("feature {index}: {e}")))?,
            ),
            None => None,
        };
        let properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, attribute_from_json(v)))
            .collect();
        let id = feature.id.map(|id| match id {
            geojson::feature::Id::Number(n) => match n.as_i64() {
                Some(v) => FeatureId::Number(v),
                None => FeatureId::String(n.to_string()),
            },
            geojson::feature::Id::String(s) => FeatureId::String(s),
        });
        layer.push(Feature {
            geometry,
            properties,
            id,
        });
    }
    Ok(layer)
}

fn parse_crs_member(members: &JsonObject) -> Option<CRS> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    Some(CRS::parse(name))
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => json!(b),
        AttributeValue::Int(i) => json!(i),
        AttributeValue::Float(f) => json!(f),
        AttributeValue::String(s) => json!(s),
    }
}

/// Serialize a layer to a GeoJSON string
pub fn write_layer_string(layer: &FeatureCollection) -> String {
    let features = layer
        .iter()
        .map(|f| geojson::Feature {
            bbox: None,
            geometry: f
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: f.id.as_ref().map(|id| match id {
                FeatureId::Number(n) => geojson::feature::Id::Number((*n).into()),
                FeatureId::String(s) => geojson::feature::Id::String(s.clone()),
            }),
            properties: Some(
                f.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = layer.crs.as_ref().and_then(CRS::epsg).map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": format!("urn:ogc:def:crs:EPSG::{code}")}}),
        );
        members
    });

    GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
    .to_string()
}

/// Write a layer as a GeoJSON file
pub fn write_layer<P: AsRef<Path>>(layer: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, write_layer_string(layer)).map_err(|e| Error::io(path, e))
}
