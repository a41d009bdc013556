use crate::layer::{AttrValue, FieldKind, LayerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("No active layer is selected in the host application")]
    NoActiveLayer,
    #[error("Unsupported geometry type '{found}', expected LineString or MultiLineString")]
    UnsupportedGeometryType { found: String },
    #[error("Feature {feature} has malformed geometry: {reason}")]
    MalformedGeometry { feature: usize, reason: String },
    #[error(
        "Edit session on layer {session_layer} (revision {session_revision}) cannot be committed to layer {layer} (revision {revision})"
    )]
    EditSessionConflict {
        session_layer: LayerId,
        session_revision: u64,
        layer: LayerId,
        revision: u64,
    },
    #[error("Invalid reference frame: {0}")]
    InvalidReferenceFrame(String),
    #[error("Field '{0}' does not exist in the layer schema")]
    UnknownField(String),
    #[error("Field '{0}' already exists in the layer schema")]
    DuplicateField(String),
    #[error("Value {value:?} cannot be stored in {kind:?} field '{field}'")]
    FieldTypeMismatch {
        field: String,
        kind: FieldKind,
        value: AttrValue,
    },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;
