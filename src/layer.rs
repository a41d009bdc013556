use crate::crs::Crs;
use crate::error::{PrepError, Result};
use geo::BoundingRect;
use geo_types::{MultiLineString, Rect};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);
static NULL_VALUE: AttrValue = AttrValue::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    fn next() -> Self {
        LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Real)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Numeric reading of the value. Text is parsed, so `" 4 "` reads as 4.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Null => None,
            AttrValue::Integer(i) => Some(*i as f64),
            AttrValue::Real(r) => Some(*r).filter(|r| !r.is_nan()),
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|r| !r.is_nan()),
        }
    }

    /// String form used when building labels. Null prints as `None`.
    pub fn label(&self) -> String {
        match self {
            AttrValue::Null => "None".to_string(),
            AttrValue::Text(s) => s.clone(),
            AttrValue::Integer(i) => i.to_string(),
            AttrValue::Real(r) if r.is_finite() && r.fract() == 0.0 => format!("{:.1}", r),
            AttrValue::Real(r) => r.to_string(),
        }
    }

    /// Converts the value so it can be stored in a field of `kind`, if possible.
    pub fn coerce(&self, kind: FieldKind) -> Option<AttrValue> {
        match (kind, self) {
            (_, AttrValue::Null) => Some(AttrValue::Null),
            (FieldKind::Text, AttrValue::Text(_)) => Some(self.clone()),
            (FieldKind::Integer, AttrValue::Integer(_)) => Some(self.clone()),
            (FieldKind::Integer, AttrValue::Real(r)) if r.fract() == 0.0 => {
                Some(AttrValue::Integer(*r as i64))
            }
            (FieldKind::Real, AttrValue::Real(_)) => Some(self.clone()),
            (FieldKind::Real, AttrValue::Integer(i)) => Some(AttrValue::Real(*i as f64)),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Integer(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Real(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttrValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field definitions. `version` changes whenever a field is added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<FieldDef>,
    version: u32,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Result<Self> {
        let mut schema = Schema::default();
        for field in fields {
            schema.push(field)?;
        }
        schema.version = 0;
        Ok(schema)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Exact match first, then the first case-insensitive match.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn require(&self, name: &str) -> Result<(usize, &FieldDef)> {
        self.index_of(name)
            .map(|i| (i, &self.fields[i]))
            .ok_or_else(|| PrepError::UnknownField(name.to_string()))
    }

    pub(crate) fn push(&mut self, field: FieldDef) -> Result<usize> {
        if self.index_of(&field.name).is_some() {
            return Err(PrepError::DuplicateField(field.name));
        }
        self.fields.push(field);
        self.version += 1;
        Ok(self.fields.len() - 1)
    }

    pub(crate) fn remove(&mut self, index: usize) -> FieldDef {
        self.version += 1;
        self.fields.remove(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub geometry: MultiLineString<f64>,
    attributes: Vec<AttrValue>,
}

impl Feature {
    pub fn attributes(&self) -> &[AttrValue] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> &AttrValue {
        self.attributes.get(index).unwrap_or(&NULL_VALUE)
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Vec<AttrValue> {
        &mut self.attributes
    }
}

/// A named set of line features sharing one schema and reference frame.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    crs: Crs,
    schema: Schema,
    features: Vec<Feature>,
    revision: u64,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: Crs, schema: Schema) -> Self {
        Layer {
            id: LayerId::next(),
            name: name.into(),
            crs,
            schema,
            features: Vec::new(),
            revision: 0,
        }
    }

    /// Appends a feature while the layer is being loaded.
    pub fn add_feature(
        &mut self,
        geometry: MultiLineString<f64>,
        attributes: Vec<AttrValue>,
    ) -> Result<u64> {
        if attributes.len() > self.schema.len() {
            return Err(PrepError::InvalidParameter(format!(
                "feature carries {} attributes but the schema has {} fields",
                attributes.len(),
                self.schema.len()
            )));
        }

        let mut stored = Vec::with_capacity(self.schema.len());
        for (field, value) in self.schema.fields().iter().zip(attributes) {
            let coerced = value
                .coerce(field.kind)
                .ok_or_else(|| PrepError::FieldTypeMismatch {
                    field: field.name.clone(),
                    kind: field.kind,
                    value: value.clone(),
                })?;
            stored.push(coerced);
        }
        stored.resize(self.schema.len(), AttrValue::Null);

        // Ids grow with insertion order, so the last feature holds the largest.
        let id = self.features.last().map_or(1, |f| f.id + 1);
        self.features.push(Feature {
            id,
            geometry,
            attributes: stored,
        });
        Ok(id)
    }

    /// A new layer with the same name, frame and schema holding `features`.
    pub fn derive(&self, features: Vec<Feature>) -> Layer {
        self.derive_as(self.crs, self.schema.clone(), features)
    }

    pub(crate) fn derive_as(&self, crs: Crs, schema: Schema, features: Vec<Feature>) -> Layer {
        let features = features
            .into_iter()
            .enumerate()
            .map(|(i, mut f)| {
                f.id = i as u64 + 1;
                f.attributes.resize(schema.len(), AttrValue::Null);
                f
            })
            .collect();
        Layer {
            id: LayerId::next(),
            name: self.name.clone(),
            crs,
            schema,
            features,
            revision: 0,
        }
    }

    /// Builds a derived feature carrying `geometry` and the attributes of `source`.
    pub fn feature_like(source: &Feature, geometry: MultiLineString<f64>) -> Feature {
        Feature {
            id: source.id,
            geometry,
            attributes: source.attributes.clone(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Value of `name` for every feature in iteration order.
    pub fn values(&self, name: &str) -> Result<Vec<&AttrValue>> {
        let (index, _) = self.schema.require(name)?;
        Ok(self.features.iter().map(|f| f.attribute(index)).collect())
    }

    /// Bounding rectangle of all feature geometry, `None` for an empty layer.
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    geo_types::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    geo_types::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }

    pub(crate) fn into_parts(self) -> (Schema, Vec<Feature>) {
        (self.schema, self.features)
    }

    pub(crate) fn replace_contents(&mut self, schema: Schema, features: Vec<Feature>) {
        self.schema = schema;
        self.features = features;
        self.revision += 1;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo_types::{LineString, coord};

    pub(crate) fn line(points: &[(f64, f64)]) -> MultiLineString<f64> {
        MultiLineString::new(vec![LineString::new(
            points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect(),
        )])
    }

    #[test]
    fn test_schema_lookup_is_case_insensitive() {
        let schema = Schema::new(vec![
            FieldDef::new("Route", FieldKind::Text),
            FieldDef::new("route_", FieldKind::Text),
        ])
        .unwrap();
        assert_eq!(schema.index_of("route"), Some(0));
        assert_eq!(schema.index_of("ROUTE_"), Some(1));
        assert_eq!(schema.index_of("rout"), None);
        assert_eq!(schema.version(), 0);
    }

    #[test]
    fn test_schema_exact_match_wins() {
        let schema = Schema::new(vec![
            FieldDef::new("NAME", FieldKind::Text),
            FieldDef::new("name_", FieldKind::Text),
        ])
        .unwrap();
        assert_eq!(schema.index_of("name_"), Some(1));
        assert!(
            Schema::new(vec![
                FieldDef::new("a", FieldKind::Text),
                FieldDef::new("A", FieldKind::Integer),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_add_feature_coerces_and_pads() {
        let schema = Schema::new(vec![
            FieldDef::new("width", FieldKind::Real),
            FieldDef::new("name", FieldKind::Text),
        ])
        .unwrap();
        let mut layer = Layer::new("roads", Crs::WEB_MERCATOR, schema);
        layer
            .add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]), vec![AttrValue::Integer(4)])
            .unwrap();
        assert_eq!(layer.features()[0].attribute(0), &AttrValue::Real(4.0));
        assert_eq!(layer.features()[0].attribute(1), &AttrValue::Null);

        let err = layer
            .add_feature(line(&[(0.0, 0.0), (1.0, 0.0)]), vec!["wide".into()])
            .unwrap_err();
        assert!(matches!(err, PrepError::FieldTypeMismatch { .. }));
    }

    #[test]
    fn test_feature_ids_follow_insertion_order() {
        let mut layer = Layer::new("roads", Crs::WEB_MERCATOR, Schema::default());
        for i in 0..20_000 {
            let x = i as f64;
            let id = layer.add_feature(line(&[(x, 0.0), (x + 1.0, 0.0)]), vec![]).unwrap();
            assert_eq!(id, i + 1);
        }

        let mut derived = layer.derive(layer.features()[..3].to_vec());
        let id = derived.add_feature(line(&[(0.0, 1.0), (1.0, 1.0)]), vec![]).unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_labels() {
        assert_eq!(AttrValue::Null.label(), "None");
        assert_eq!(AttrValue::Real(12.0).label(), "12.0");
        assert_eq!(AttrValue::Real(2.5).label(), "2.5");
        assert_eq!(AttrValue::Integer(7).label(), "7");
        assert_eq!(AttrValue::Text(" 3 ".into()).as_f64(), Some(3.0));
    }

    #[test]
    fn test_extent_and_derive() {
        let mut layer = Layer::new("roads", Crs::WEB_MERCATOR, Schema::default());
        assert!(layer.extent().is_none());
        layer.add_feature(line(&[(0.0, 0.0), (10.0, 5.0)]), vec![]).unwrap();
        layer.add_feature(line(&[(-3.0, 2.0), (4.0, 8.0)]), vec![]).unwrap();
        let extent = layer.extent().unwrap();
        assert_eq!(extent.min(), coord! { x: -3.0, y: 0.0 });
        assert_eq!(extent.max(), coord! { x: 10.0, y: 8.0 });

        let derived = layer.derive(layer.features().to_vec());
        assert_ne!(derived.id(), layer.id());
        assert_eq!(derived.feature_count(), 2);
        assert_eq!(derived.features()[1].id, 2);
    }
}
