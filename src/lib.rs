// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Prepares line layers (road and route networks) for upload to a
//! fleet-routing system: normalizes the `route`, `group`, `segment`,
//! `roadwidth` and `passcount` attributes, splits long lines, measures
//! segments and publishes the result in WGS 84.

pub mod config;
pub mod crs;
pub mod degenerate;
pub mod edit;
pub mod engine;
pub mod error;
pub mod fields;
pub mod geojson_io;
pub mod host;
pub mod layer;
pub mod normalize;
pub mod pipeline;
pub mod planar;
pub mod segmentation;

pub use config::PrepConfig;
pub use crs::Crs;
pub use engine::{GeometryEngine, Grid, GridCell};
pub use error::PrepError;
pub use host::{Host, Project};
pub use layer::{AttrValue, Feature, FieldDef, FieldKind, Layer, LayerId, Schema};
pub use pipeline::{prepare_active_layer, prepare_layer};
pub use planar::PlanarEngine;

pub const WGS_84_SRID: u32 = 4326;
