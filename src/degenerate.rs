use crate::engine::GeometryEngine;
use crate::error::{PrepError, Result};
use crate::layer::Layer;
use log::{info, warn};

/// Drops features whose length, measured again in the layer's own frame, is
/// below `min_length`. Geographic frames are measured in metres.
pub fn drop_degenerate<E: GeometryEngine>(layer: Layer, engine: &E, min_length: f64) -> Result<Layer> {
    if !min_length.is_finite() || min_length < 0.0 {
        return Err(PrepError::InvalidParameter(format!(
            "minimum segment length must be non-negative, got {min_length}"
        )));
    }

    let crs = layer.crs();
    let before = layer.feature_count();
    let kept: Vec<_> = layer
        .features()
        .iter()
        .filter(|f| engine.measure_length(&f.geometry, crs) >= min_length)
        .cloned()
        .collect();

    let dropped = before - kept.len();
    if dropped == 0 {
        return Ok(layer);
    }
    if kept.is_empty() {
        warn!("Every one of the {} features is shorter than {}", before, min_length);
    } else {
        info!("Dropped {} degenerate features shorter than {}", dropped, min_length);
    }
    Ok(layer.derive(kept))
}
