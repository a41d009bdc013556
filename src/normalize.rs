//! Attribute normalization for the upload attribute set.
//!
//! `route` and `group` follow the same three-way decision: copy from a
//! misnamed alternate, derive from scratch, or fill nulls in place. `segment`
//! gets a per-feature ordinal label and the numeric attributes are clamped
//! to their defaults.

use crate::config::PrepConfig;
use crate::engine::GeometryEngine;
use crate::error::Result;
use crate::fields::is_missing;
use crate::layer::{AttrValue, FieldDef, FieldKind, Layer};
use log::{debug, info};

pub const ROUTE_FIELD: &str = "route";
pub const GROUP_FIELD: &str = "group";
pub const SEGMENT_FIELD: &str = "segment";
pub const ROAD_WIDTH_FIELD: &str = "roadwidth";
pub const PASS_COUNT_FIELD: &str = "passcount";
pub const SEG_LENGTH_FIELD: &str = "segLength";

pub const ROUTE_NULL: &str = "Route NULL";
pub const ZONE_NULL: &str = "Zone NULL";
pub const ROUTE_FIRST_HALF: &str = "Route A";
pub const ROUTE_SECOND_HALF: &str = "Route B";

/// Temporary field carrying the grid cell id during group derivation.
pub const GROUP_JOIN_FIELD: &str = "grouptool_id";

pub const UPLOAD_FIELDS: [&str; 6] = [
    ROUTE_FIELD,
    GROUP_FIELD,
    SEGMENT_FIELD,
    ROAD_WIDTH_FIELD,
    PASS_COUNT_FIELD,
    SEG_LENGTH_FIELD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldResolution {
    /// Target missing, alternate present.
    CopyFromAlternate,
    /// Target and alternate both missing.
    Derive,
    /// Target present, whatever the alternate.
    FillNulls,
}

pub fn resolve(layer: &Layer, target: &str, alternate: &str) -> FieldResolution {
    match (is_missing(layer.schema(), target), is_missing(layer.schema(), alternate)) {
        (true, false) => FieldResolution::CopyFromAlternate,
        (true, true) => FieldResolution::Derive,
        (false, _) => FieldResolution::FillNulls,
    }
}

/// Rewrites `field` as a text field when it exists with another kind. Values
/// keep their label; nulls stay null.
fn ensure_text(layer: Layer, field: &str) -> Result<Layer> {
    let (index, def) = layer.schema().require(field)?;
    if def.kind == FieldKind::Text {
        return Ok(layer);
    }
    debug!("Converting {:?} field '{}' to text", def.kind, def.name);
    let name = def.name.clone();
    let labels: Vec<AttrValue> = layer
        .features()
        .iter()
        .map(|f| match f.attribute(index) {
            AttrValue::Null => AttrValue::Null,
            other => AttrValue::Text(other.label()),
        })
        .collect();

    let mut edit = layer.start_editing();
    edit.delete_field(&name)?;
    edit.add_field(FieldDef::new(name.clone(), FieldKind::Text))?;
    edit.assign(&name, |position, _| labels[position].clone())?;
    edit.commit(layer)
}

/// Rewrites `field` as a numeric field when it exists as text. Values that
/// parse as numbers keep them, the rest become null. The field is Integer
/// unless a parsed value has a fractional part.
fn ensure_numeric(layer: Layer, field: &str) -> Result<Layer> {
    let (index, def) = layer.schema().require(field)?;
    if def.kind.is_numeric() {
        return Ok(layer);
    }
    let name = def.name.clone();
    let numbers: Vec<Option<f64>> = layer
        .features()
        .iter()
        .map(|f| f.attribute(index).as_f64())
        .collect();
    let kind = if numbers
        .iter()
        .flatten()
        .all(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
    {
        FieldKind::Integer
    } else {
        FieldKind::Real
    };
    debug!("Converting text field '{}' to {:?}", name, kind);

    let mut edit = layer.start_editing();
    edit.delete_field(&name)?;
    edit.add_field(FieldDef::new(name.clone(), kind))?;
    edit.assign(&name, |position, _| match (numbers[position], kind) {
        (None, _) => AttrValue::Null,
        (Some(v), FieldKind::Integer) => AttrValue::Integer(v as i64),
        (Some(v), _) => AttrValue::Real(v),
    })?;
    edit.commit(layer)
}

/// Sets every null `field` value to `replacement`. Running it twice changes nothing the second time.
pub fn replace_nulls(layer: Layer, field: &str, replacement: &str) -> Result<Layer> {
    let layer = ensure_text(layer, field)?;
    let mut edit = layer.start_editing();
    let changed = edit.replace_where(field, AttrValue::is_null, replacement.into())?;
    debug!("Filled {} null '{}' values with '{}'", changed, field, replacement);
    edit.commit(layer)
}

/// Adds text field `target` holding each feature's `source` value.
pub fn copy_field(layer: Layer, source: &str, target: &str) -> Result<Layer> {
    let (source_index, _) = layer.schema().require(source)?;
    let mut edit = layer.start_editing();
    edit.add_field(FieldDef::new(target, FieldKind::Text))?;
    edit.assign(target, |_, feature| match feature.attribute(source_index) {
        AttrValue::Null => AttrValue::Null,
        AttrValue::Text(s) => AttrValue::Text(s.clone()),
        other => AttrValue::Text(other.label()),
    })?;
    edit.commit(layer)
}

/// Labels the first half of the features (rounded down) `Route A` and the rest `Route B`.
pub fn assign_route_halves(layer: Layer) -> Result<Layer> {
    let half = layer.feature_count() / 2;
    let mut edit = layer.start_editing();
    edit.add_field(FieldDef::new(ROUTE_FIELD, FieldKind::Text))?;
    edit.assign(ROUTE_FIELD, |position, _| {
        if position < half {
            ROUTE_FIRST_HALF.into()
        } else {
            ROUTE_SECOND_HALF.into()
        }
    })?;
    edit.commit(layer)
}

pub fn normalize_route(layer: Layer, config: &PrepConfig) -> Result<Layer> {
    match resolve(&layer, ROUTE_FIELD, &config.route_alternate) {
        FieldResolution::CopyFromAlternate => {
            info!(
                "No '{}' field; copying it from '{}'",
                ROUTE_FIELD, config.route_alternate
            );
            let layer = copy_field(layer, &config.route_alternate, ROUTE_FIELD)?;
            replace_nulls(layer, ROUTE_FIELD, ROUTE_NULL)
        }
        FieldResolution::Derive => {
            info!(
                "No '{}' field; splitting {} features into two routes",
                ROUTE_FIELD,
                layer.feature_count()
            );
            assign_route_halves(layer)
        }
        FieldResolution::FillNulls => replace_nulls(layer, ROUTE_FIELD, ROUTE_NULL),
    }
}

/// Labels every feature `Zone {id}` after the grid cell it overlaps most.
pub fn derive_group_zones<E: GeometryEngine>(
    layer: Layer,
    engine: &E,
    config: &PrepConfig,
) -> Result<Layer> {
    let Some(extent) = layer.extent() else {
        let mut edit = layer.start_editing();
        edit.add_field(FieldDef::new(GROUP_FIELD, FieldKind::Text))?;
        return edit.commit(layer);
    };

    let grid = engine.make_grid(extent, config.grid_columns, config.grid_rows, layer.crs())?;
    let joined = engine.spatial_join(&layer, &grid, GROUP_JOIN_FIELD)?;
    let (join_index, _) = joined.schema().require(GROUP_JOIN_FIELD)?;

    let mut edit = joined.start_editing();
    edit.add_field(FieldDef::new(GROUP_FIELD, FieldKind::Text))?;
    edit.assign(GROUP_FIELD, |_, feature| match feature.attribute(join_index) {
        AttrValue::Null => ZONE_NULL.into(),
        id => AttrValue::Text(format!("Zone {}", id.label())),
    })?;
    edit.delete_field(GROUP_JOIN_FIELD)?;
    edit.commit(joined)
}

pub fn normalize_group<E: GeometryEngine>(
    layer: Layer,
    engine: &E,
    config: &PrepConfig,
) -> Result<Layer> {
    match resolve(&layer, GROUP_FIELD, &config.group_alternate) {
        FieldResolution::CopyFromAlternate => {
            info!(
                "No '{}' field; copying it from '{}'",
                GROUP_FIELD, config.group_alternate
            );
            let layer = copy_field(layer, &config.group_alternate, GROUP_FIELD)?;
            replace_nulls(layer, GROUP_FIELD, ZONE_NULL)
        }
        FieldResolution::Derive => {
            info!(
                "No '{}' field; deriving zones from a {}x{} grid",
                GROUP_FIELD, config.grid_columns, config.grid_rows
            );
            derive_group_zones(layer, engine, config)
        }
        FieldResolution::FillNulls => replace_nulls(layer, GROUP_FIELD, ZONE_NULL),
    }
}

/// Sets `segment` to `{base}_{ordinal}` with a 1-based ordinal in iteration
/// order. The base is the `source` attribute when it exists, otherwise the
/// current `segment` value (`None` when the field is new or null).
pub fn assign_segment_labels(layer: Layer, source: Option<&str>) -> Result<Layer> {
    let base_field = source
        .filter(|name| !is_missing(layer.schema(), name))
        .or_else(|| (!is_missing(layer.schema(), SEGMENT_FIELD)).then_some(SEGMENT_FIELD));

    let labels: Vec<String> = match base_field {
        Some(name) => {
            let (index, _) = layer.schema().require(name)?;
            layer
                .features()
                .iter()
                .enumerate()
                .map(|(position, f)| format!("{}_{}", f.attribute(index).label(), position + 1))
                .collect()
        }
        None => (1..=layer.feature_count())
            .map(|ordinal| format!("{}_{}", AttrValue::Null.label(), ordinal))
            .collect(),
    };

    let existing = layer.schema().field(SEGMENT_FIELD).map(|f| (f.name.clone(), f.kind));
    let mut edit = layer.start_editing();
    let target = match existing {
        Some((name, FieldKind::Text)) => name,
        Some((name, _)) => {
            edit.delete_field(&name)?;
            edit.add_field(FieldDef::new(name.clone(), FieldKind::Text))?;
            name
        }
        None => {
            edit.add_field(FieldDef::new(SEGMENT_FIELD, FieldKind::Text))?;
            SEGMENT_FIELD.to_string()
        }
    };
    edit.assign(&target, |position, _| AttrValue::Text(labels[position].clone()))?;
    edit.commit(layer)
}

/// Replaces null, non-numeric, or below-`minimum` values of `field` with
/// `default`. A layer without `field` is returned untouched.
pub fn apply_bounded_default(layer: Layer, field: &str, default: i64, minimum: f64) -> Result<Layer> {
    if layer.schema().field(field).is_none() {
        debug!("No '{}' field; leaving the layer unchanged", field);
        return Ok(layer);
    }
    let layer = ensure_numeric(layer, field)?;

    let mut edit = layer.start_editing();
    let changed = edit.replace_where(
        field,
        |value| value.as_f64().is_none_or(|v| v < minimum),
        AttrValue::Integer(default),
    )?;
    debug!("Reset {} '{}' values to {}", changed, field, default);
    edit.commit(layer)
}

/// Applies the road width and pass count defaults, first creating the fields
/// when `materialize_missing_defaults` is set.
pub fn normalize_numeric_defaults(layer: Layer, config: &PrepConfig) -> Result<Layer> {
    let mut layer = layer;
    for (field, default) in [
        (ROAD_WIDTH_FIELD, config.road_width_default),
        (PASS_COUNT_FIELD, config.pass_count_default),
    ] {
        if config.materialize_missing_defaults && is_missing(layer.schema(), field) {
            info!("No '{}' field; creating it with default {}", field, default);
            let mut edit = layer.start_editing();
            edit.add_field(FieldDef::new(field, FieldKind::Integer))?;
            layer = edit.commit(layer)?;
        }
        layer = apply_bounded_default(layer, field, default, config.min_valid_value)?;
    }
    Ok(layer)
}

/// Stores each feature's length in the layer's current frame as `segLength`.
pub fn compute_segment_length<E: GeometryEngine>(layer: Layer, engine: &E) -> Result<Layer> {
    let crs = layer.crs();
    let existing = layer.schema().field(SEG_LENGTH_FIELD).map(|f| (f.name.clone(), f.kind));

    let mut edit = layer.start_editing();
    let target = match existing {
        Some((name, FieldKind::Real)) => name,
        Some((name, _)) => {
            edit.delete_field(&name)?;
            edit.add_field(FieldDef::new(name.clone(), FieldKind::Real))?;
            name
        }
        None => {
            edit.add_field(FieldDef::new(SEG_LENGTH_FIELD, FieldKind::Real))?;
            SEG_LENGTH_FIELD.to_string()
        }
    };
    edit.assign(&target, |_, feature| {
        AttrValue::Real(engine.measure_length(&feature.geometry, crs))
    })?;
    edit.commit(layer)
}

/// Drops every field outside the upload attribute set.
pub fn restrict_to_upload_fields(layer: Layer) -> Result<Layer> {
    let extra: Vec<String> = layer
        .schema()
        .fields()
        .iter()
        .filter(|f| !UPLOAD_FIELDS.iter().any(|u| f.name.eq_ignore_ascii_case(u)))
        .map(|f| f.name.clone())
        .collect();
    if extra.is_empty() {
        return Ok(layer);
    }

    debug!("Dropping fields outside the upload set: {:?}", extra);
    let mut edit = layer.start_editing();
    for name in &extra {
        edit.delete_field(name)?;
    }
    edit.commit(layer)
}
