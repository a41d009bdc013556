//! Conversion between layers and GeoJSON feature collections.

use crate::crs::Crs;
use crate::error::{PrepError, Result};
use crate::layer::{AttrValue, FieldDef, FieldKind, Layer, Schema};
use geo_types::MultiLineString;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};

fn geometry_type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Converts a line geometry through the `geo-types` bridge. Positions with
/// fewer than two ordinates are rejected rather than skipped.
fn to_multi_line(feature: usize, geometry: Option<&Geometry>) -> Result<MultiLineString<f64>> {
    let Some(geometry) = geometry else {
        return Err(PrepError::UnsupportedGeometryType {
            found: "null".to_string(),
        });
    };
    let unsupported = || PrepError::UnsupportedGeometryType {
        found: geometry_type_name(&geometry.value).to_string(),
    };

    let positions: Vec<&Vec<f64>> = match &geometry.value {
        Value::LineString(line) => line.iter().collect(),
        Value::MultiLineString(lines) => lines.iter().flatten().collect(),
        _ => return Err(unsupported()),
    };
    if let Some(short) = positions.iter().find(|p| p.len() < 2) {
        return Err(PrepError::MalformedGeometry {
            feature,
            reason: format!("position has {} ordinates, expected at least 2", short.len()),
        });
    }

    match geo_types::Geometry::<f64>::try_from(geometry.value.clone()) {
        Ok(geo_types::Geometry::LineString(line)) => Ok(MultiLineString::new(vec![line])),
        Ok(geo_types::Geometry::MultiLineString(lines)) => Ok(lines),
        Ok(_) => Err(unsupported()),
        Err(e) => Err(PrepError::MalformedGeometry {
            feature,
            reason: e.to_string(),
        }),
    }
}

fn kind_of(value: &JsonValue) -> Option<FieldKind> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) if n.is_i64() => Some(FieldKind::Integer),
        JsonValue::Number(_) => Some(FieldKind::Real),
        _ => Some(FieldKind::Text),
    }
}

fn widen(current: Option<FieldKind>, seen: Option<FieldKind>) -> Option<FieldKind> {
    match (current, seen) {
        (None, k) | (k, None) => k,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldKind::Integer), Some(FieldKind::Real))
        | (Some(FieldKind::Real), Some(FieldKind::Integer)) => Some(FieldKind::Real),
        _ => Some(FieldKind::Text),
    }
}

/// Field definitions for the properties of `features`, in first-seen order.
pub fn infer_schema(features: &[Feature]) -> Result<Schema> {
    let mut fields: Vec<(String, Option<FieldKind>)> = Vec::new();
    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for (key, value) in properties {
            match fields.iter_mut().find(|(name, _)| name == key) {
                Some((_, kind)) => *kind = widen(*kind, kind_of(value)),
                None => fields.push((key.clone(), kind_of(value))),
            }
        }
    }
    Schema::new(
        fields
            .into_iter()
            .map(|(name, kind)| FieldDef::new(name, kind.unwrap_or(FieldKind::Text)))
            .collect(),
    )
}

fn to_attr(value: Option<&JsonValue>, kind: FieldKind) -> AttrValue {
    match (value, kind) {
        (None | Some(JsonValue::Null), _) => AttrValue::Null,
        (Some(JsonValue::String(s)), FieldKind::Text) => AttrValue::Text(s.clone()),
        (Some(other), FieldKind::Text) => AttrValue::Text(other.to_string()),
        (Some(v), FieldKind::Integer) => v.as_i64().map(AttrValue::Integer).unwrap_or(AttrValue::Null),
        (Some(v), FieldKind::Real) => v.as_f64().map(AttrValue::Real).unwrap_or(AttrValue::Null),
    }
}

fn to_json(value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::Null => JsonValue::Null,
        AttrValue::Text(s) => JsonValue::String(s.clone()),
        AttrValue::Integer(i) => JsonValue::from(*i),
        AttrValue::Real(r) => serde_json::Number::from_f64(*r)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
    }
}

/// Builds a layer from line features. Any other geometry type is rejected.
pub fn layer_from_geojson(name: &str, crs: Crs, collection: &FeatureCollection) -> Result<Layer> {
    let schema = infer_schema(&collection.features)?;
    let mut layer = Layer::new(name, crs, schema.clone());
    for (index, feature) in collection.features.iter().enumerate() {
        let geometry = to_multi_line(index, feature.geometry.as_ref())?;
        let attributes = schema
            .fields()
            .iter()
            .map(|field| {
                to_attr(
                    feature.properties.as_ref().and_then(|p| p.get(&field.name)),
                    field.kind,
                )
            })
            .collect();
        layer.add_feature(geometry, attributes)?;
    }
    Ok(layer)
}

pub fn layer_to_geojson(layer: &Layer) -> FeatureCollection {
    let features = layer
        .features()
        .iter()
        .map(|feature| {
            let value = match feature.geometry.0.as_slice() {
                [single] => Value::from(single),
                _ => Value::from(&feature.geometry),
            };

            let properties: JsonObject = layer
                .schema()
                .fields()
                .iter()
                .zip(feature.attributes())
                .map(|(field, value)| (field.name.clone(), to_json(value)))
                .collect();

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(value)),
                id: Some(geojson::feature::Id::Number(feature.id.into())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;
    use geojson::GeoJson;

    fn collection(text: &str) -> FeatureCollection {
        match text.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            other => panic!("expected a feature collection, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_inference() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "Elm", "width": 4, "lanes": null},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]}},
                {"type": "Feature", "properties": {"width": 4.5, "name": 3, "oneway": true},
                 "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]}}
            ]}"#,
        );
        let layer = layer_from_geojson("roads", Crs::WEB_MERCATOR, &fc).unwrap();
        let mut fields: Vec<_> = layer
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect();
        fields.sort_by_key(|(name, _)| *name);
        assert_eq!(
            fields,
            vec![
                ("lanes", FieldKind::Text),
                ("name", FieldKind::Text),
                ("oneway", FieldKind::Text),
                ("width", FieldKind::Real),
            ]
        );
        assert_eq!(layer.feature_count(), 2);
        assert_eq!(layer.features()[1].geometry.0.len(), 2);
        assert_eq!(layer.values("name").unwrap()[1], &AttrValue::Text("3".into()));
        assert_eq!(layer.values("width").unwrap()[0], &AttrValue::Real(4.0));
    }

    #[test]
    fn test_rejects_polygons() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}
            ]}"#,
        );
        let err = layer_from_geojson("areas", Crs::WGS84, &fc).unwrap_err();
        assert!(matches!(err, PrepError::UnsupportedGeometryType { found } if found == "Polygon"));
    }

    #[test]
    fn test_rejects_short_positions() {
        let feature = Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                vec![0.0, 0.0],
                vec![5.0],
                vec![10.0, 0.0],
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        let fc = FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        };
        let err = layer_from_geojson("roads", Crs::WEB_MERCATOR, &fc).unwrap_err();
        assert!(matches!(err, PrepError::MalformedGeometry { feature: 0, .. }));
    }

    #[test]
    fn test_export_multi_part_geometry() {
        let mut layer = Layer::new("roads", Crs::WGS84, Schema::default());
        let geometry = MultiLineString::new(vec![
            geo_types::line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            geo_types::line_string![(x: 2.0, y: 2.0), (x: 3.0, y: 3.0)],
        ]);
        layer.add_feature(geometry, vec![]).unwrap();
        let exported = layer_to_geojson(&layer);
        match exported.features[0].geometry.as_ref().map(|g| &g.value) {
            Some(Value::MultiLineString(lines)) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[1][1], vec![3.0, 3.0]);
            }
            other => panic!("expected a MultiLineString, got {other:?}"),
        }
    }

    #[test]
    fn test_export_properties_and_geometry() {
        let fc = collection(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"route": "Route A", "segLength": 12.5},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]}}
            ]}"#,
        );
        let layer = layer_from_geojson("roads", Crs::WGS84, &fc).unwrap();
        let exported = layer_to_geojson(&layer);
        let feature = &exported.features[0];
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["route"], JsonValue::from("Route A"));
        assert_eq!(properties["segLength"], JsonValue::from(12.5));
        assert!(matches!(
            feature.geometry.as_ref().map(|g| &g.value),
            Some(Value::LineString(coords)) if coords.len() == 2
        ));
    }
}
