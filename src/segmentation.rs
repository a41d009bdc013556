use crate::engine::GeometryEngine;
use crate::error::{PrepError, Result};
use crate::layer::Layer;
use log::info;

/// Splits every line to at most `max_length`, cuts the pieces at their mutual
/// intersections, then flattens multi-part results into single-part features.
/// The order is fixed: intersection splitting expects length-bounded input and
/// decomposition expects a flat geometry set.
pub fn segment_lines<E: GeometryEngine>(layer: &Layer, engine: &E, max_length: f64) -> Result<Layer> {
    if !max_length.is_finite() || max_length <= 0.0 {
        return Err(PrepError::InvalidParameter(format!(
            "maximum segment length must be positive, got {max_length}"
        )));
    }

    let by_length = engine.split_by_length(layer, max_length)?;
    let by_crossing = engine.split_against(&by_length, &by_length)?;
    let single_part = engine.explode_multipart(&by_crossing)?;

    info!(
        "Segmented {} features into {} (max length {})",
        layer.feature_count(),
        single_part.feature_count(),
        max_length
    );
    Ok(single_part)
}
