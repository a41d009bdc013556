use crate::crs::Crs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Misnamed field that stands in for `route` when `route` is absent.
    pub route_alternate: String,
    /// Misnamed field that stands in for `group` when `group` is absent.
    pub group_alternate: String,
    /// Attribute used as the base of `segment` labels. Unset uses the existing `segment` value.
    pub segment_source: Option<String>,
    /// Projected frame the layer is processed in. Units drive `max_segment_length`.
    pub working_crs: Crs,
    pub publish_crs: Crs,
    pub update_geometry: bool,
    pub max_segment_length: f64,
    pub road_width_default: i64,
    pub pass_count_default: i64,
    /// Numeric attributes below this are replaced with their default.
    pub min_valid_value: f64,
    /// Features shorter than this in the publishing frame are dropped (metres
    /// for geographic frames).
    pub min_segment_length: f64,
    pub grid_columns: usize,
    pub grid_rows: usize,
    /// Create `roadwidth`/`passcount` when the input lacks them.
    pub materialize_missing_defaults: bool,
    /// Keep input attributes that are not part of the upload set.
    pub retain_extra_fields: bool,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            route_alternate: "route_".to_string(),
            group_alternate: "group_".to_string(),
            segment_source: None,
            working_crs: Crs::WEB_MERCATOR,
            publish_crs: Crs::WGS84,
            update_geometry: true,
            max_segment_length: 300.0,
            road_width_default: 10,
            pass_count_default: 2,
            min_valid_value: 1.0,
            min_segment_length: 1.0,
            grid_columns: 2,
            grid_rows: 2,
            materialize_missing_defaults: true,
            retain_extra_fields: false,
        }
    }
}
