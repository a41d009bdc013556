//! The geometry capabilities the preparation pipeline consumes.
//!
//! Every operation returns a new layer; the input is never modified. A host
//! application can put its own geoprocessing toolbox behind this trait, and
//! [`crate::planar::PlanarEngine`] provides a self-contained implementation.

use crate::crs::Crs;
use crate::error::Result;
use crate::layer::Layer;
use geo_types::{MultiLineString, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub id: i64,
    pub bounds: Rect<f64>,
}

/// Rectangular cells covering an extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub crs: Crs,
    pub cells: Vec<GridCell>,
}

pub trait GeometryEngine {
    /// Reprojects every feature into `target`.
    fn reproject(&self, layer: &Layer, target: Crs) -> Result<Layer>;

    /// Splits every line into pieces no longer than `max_length` (frame units).
    fn split_by_length(&self, layer: &Layer, max_length: f64) -> Result<Layer>;

    /// Splits every line of `layer` where it crosses or overlaps a line of
    /// `blades`. When both are the same layer a feature never cuts itself.
    fn split_against(&self, layer: &Layer, blades: &Layer) -> Result<Layer>;

    /// One output feature per part of every multi-part input feature.
    fn explode_multipart(&self, layer: &Layer) -> Result<Layer>;

    fn make_grid(&self, extent: Rect<f64>, columns: usize, rows: usize, crs: Crs) -> Result<Grid>;

    /// Adds integer field `join_field` holding the id of the grid cell each
    /// feature overlaps most, or null when it touches no cell.
    fn spatial_join(&self, layer: &Layer, grid: &Grid, join_field: &str) -> Result<Layer>;

    /// Length of `geometry` in metres for geographic frames, frame units otherwise.
    fn measure_length(&self, geometry: &MultiLineString<f64>, crs: Crs) -> f64;
}
