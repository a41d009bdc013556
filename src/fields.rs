use crate::layer::{FieldDef, Schema};

/// Returns the field whose name equals `name` ignoring ASCII case.
pub fn find_field<'a>(schema: &'a Schema, name: &str) -> Option<&'a FieldDef> {
    schema
        .fields()
        .iter()
        .find(|field| field.name.eq_ignore_ascii_case(name))
}

/// True when no field matches `name` case-insensitively. An empty name is always missing.
pub fn is_missing(schema: &Schema, name: &str) -> bool {
    name.is_empty() || find_field(schema, name).is_none()
}
