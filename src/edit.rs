//! Scoped edit sessions over a [`Layer`].
//!
//! A session works on a staged copy of the layer's schema and features. Nothing
//! reaches the layer until [`EditSession::commit`] succeeds; dropping the
//! session discards every staged change.

use crate::error::{PrepError, Result};
use crate::layer::{AttrValue, Feature, FieldDef, Layer, LayerId, Schema};
use log::debug;

#[must_use = "an edit session does nothing unless committed"]
#[derive(Debug)]
pub struct EditSession {
    layer_id: LayerId,
    base_revision: u64,
    schema: Schema,
    features: Vec<Feature>,
}

impl Layer {
    pub fn start_editing(&self) -> EditSession {
        EditSession {
            layer_id: self.id(),
            base_revision: self.revision(),
            schema: self.schema().clone(),
            features: self.features().to_vec(),
        }
    }
}

impl EditSession {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Adds a field holding null for every feature and returns its index.
    pub fn add_field(&mut self, field: FieldDef) -> Result<usize> {
        let index = self.schema.push(field)?;
        for feature in &mut self.features {
            feature.attributes_mut().push(AttrValue::Null);
        }
        Ok(index)
    }

    pub fn delete_field(&mut self, name: &str) -> Result<FieldDef> {
        let (index, _) = self.schema.require(name)?;
        for feature in &mut self.features {
            let attributes = feature.attributes_mut();
            if index < attributes.len() {
                attributes.remove(index);
            }
        }
        Ok(self.schema.remove(index))
    }

    pub fn set_value(&mut self, feature: usize, field: &str, value: AttrValue) -> Result<()> {
        let (index, def) = self.schema.require(field)?;
        let coerced = coerce_for(def, value)?;
        let target = self.features.get_mut(feature).ok_or_else(|| {
            PrepError::InvalidParameter(format!("feature index {feature} is out of range"))
        })?;
        target.attributes_mut()[index] = coerced;
        Ok(())
    }

    /// Writes `value(position, feature)` into `field` for every feature.
    pub fn assign<F>(&mut self, field: &str, mut value: F) -> Result<()>
    where
        F: FnMut(usize, &Feature) -> AttrValue,
    {
        let (index, def) = self.schema.require(field)?;
        let def = def.clone();
        for (position, feature) in self.features.iter_mut().enumerate() {
            let coerced = coerce_for(&def, value(position, feature))?;
            feature.attributes_mut()[index] = coerced;
        }
        Ok(())
    }

    /// Selects features whose `field` value matches `predicate` and overwrites
    /// that value with `replacement`. Returns the number of features changed.
    pub fn replace_where<P>(
        &mut self,
        field: &str,
        predicate: P,
        replacement: AttrValue,
    ) -> Result<usize>
    where
        P: Fn(&AttrValue) -> bool,
    {
        let (index, def) = self.schema.require(field)?;
        let replacement = coerce_for(def, replacement)?;
        let mut changed = 0;
        for feature in &mut self.features {
            let attributes = feature.attributes_mut();
            if predicate(&attributes[index]) {
                attributes[index] = replacement.clone();
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Applies the staged changes to `layer`, which must be the layer this
    /// session was started on, still at the same revision.
    pub fn commit(self, mut layer: Layer) -> Result<Layer> {
        if layer.id() != self.layer_id || layer.revision() != self.base_revision {
            return Err(PrepError::EditSessionConflict {
                session_layer: self.layer_id,
                session_revision: self.base_revision,
                layer: layer.id(),
                revision: layer.revision(),
            });
        }
        debug!(
            "Committing edit session on layer {} (schema version {})",
            self.layer_id,
            self.schema.version()
        );
        layer.replace_contents(self.schema, self.features);
        Ok(layer)
    }
}

fn coerce_for(def: &FieldDef, value: AttrValue) -> Result<AttrValue> {
    value
        .coerce(def.kind)
        .ok_or_else(|| PrepError::FieldTypeMismatch {
            field: def.name.clone(),
            kind: def.kind,
            value,
        })
}
