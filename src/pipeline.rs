//! The route layer preparation pipeline.
//!
//! Each stage takes the previous stage's layer by value and returns a new
//! one. Only the final layer is handed to the host.

use crate::config::PrepConfig;
use crate::degenerate::drop_degenerate;
use crate::engine::GeometryEngine;
use crate::error::{PrepError, Result};
use crate::fields::is_missing;
use crate::host::Host;
use crate::layer::{Layer, LayerId};
use crate::normalize::{
    UPLOAD_FIELDS, assign_segment_labels, compute_segment_length, normalize_group,
    normalize_numeric_defaults, normalize_route, restrict_to_upload_fields,
};
use crate::segmentation::segment_lines;
use log::{info, warn};

/// Runs every preparation stage on `input` and returns the publishable layer.
pub fn prepare_layer<E: GeometryEngine>(input: &Layer, engine: &E, config: &PrepConfig) -> Result<Layer> {
    if config.working_crs.is_geographic() {
        warn!(
            "Working frame {} is geographic; segment lengths are measured in its units",
            config.working_crs
        );
    }
    info!(
        "Preparing layer '{}' ({} features, {})",
        input.name(),
        input.feature_count(),
        input.crs()
    );

    let layer = engine.reproject(input, config.working_crs)?;
    let layer = normalize_route(layer, config)?;
    let layer = if config.update_geometry {
        segment_lines(&layer, engine, config.max_segment_length)?
    } else {
        layer
    };
    let layer = normalize_group(layer, engine, config)?;
    let layer = assign_segment_labels(layer, config.segment_source.as_deref())?;
    let layer = normalize_numeric_defaults(layer, config)?;
    let layer = compute_segment_length(layer, engine)?;

    let layer = engine.reproject(&layer, config.publish_crs)?;
    let layer = drop_degenerate(layer, engine, config.min_segment_length)?;
    let layer = if config.retain_extra_fields {
        layer
    } else {
        restrict_to_upload_fields(layer)?
    };

    for field in UPLOAD_FIELDS {
        if is_missing(layer.schema(), field) {
            warn!("Prepared layer has no '{}' field", field);
        }
    }
    Ok(layer)
}

/// Prepares the host's active layer and registers the result with the host.
pub fn prepare_active_layer<H, E>(host: &mut H, engine: &E, config: &PrepConfig) -> Result<LayerId>
where
    H: Host,
    E: GeometryEngine,
{
    let input = host.active_layer().ok_or(PrepError::NoActiveLayer)?;
    let prepared = prepare_layer(input, engine, config)?;
    let count = prepared.feature_count();
    let id = host.add_map_layer(prepared);
    info!("Route layer preparation finished: {} features in layer {}", count, id);
    Ok(id)
}
