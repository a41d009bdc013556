//! A self-contained [`GeometryEngine`] over planar line geometry.
//!
//! Reprojection covers WGS 84 and spherical Web Mercator. Intersection tests
//! for line splitting are prefiltered through an R-tree of segment envelopes.

pub mod grid;
pub mod polyline;

use crate::crs::{Crs, lat_lng_to_web_merc, web_merc_to_lat_lng};
use crate::engine::{GeometryEngine, Grid};
use crate::error::{PrepError, Result};
use crate::layer::{AttrValue, FieldDef, FieldKind, Layer};
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo_types::{Coord, Line, LineString, MultiLineString, Rect};
use log::debug;
use polyline::{
    cut_at_distances, normalize_cuts, polyline_length_haversine, polyline_length_metric,
    segment_length, split_by_max_length,
};
use rstar::primitives::{GeomWithData, Line as TreeLine};
use rstar::{AABB, RTree};

type SegmentTree = RTree<GeomWithData<TreeLine<[f64; 2]>, usize>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarEngine;

impl PlanarEngine {
    pub fn new() -> Self {
        PlanarEngine
    }
}

fn map_coords<F>(geometry: &MultiLineString<f64>, mut f: F) -> Result<MultiLineString<f64>>
where
    F: FnMut(Coord<f64>) -> Result<Coord<f64>>,
{
    let mut parts = Vec::with_capacity(geometry.0.len());
    for line in &geometry.0 {
        let coords = line.0.iter().map(|c| f(*c)).collect::<Result<Vec<_>>>()?;
        parts.push(LineString::new(coords));
    }
    Ok(MultiLineString::new(parts))
}

fn transform(source: Crs, target: Crs) -> Result<fn(Coord<f64>) -> Result<Coord<f64>>> {
    fn identity(c: Coord<f64>) -> Result<Coord<f64>> {
        Ok(c)
    }
    fn to_web_merc(c: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = lat_lng_to_web_merc(c.x, c.y)?;
        Ok(Coord { x, y })
    }
    fn to_lat_lng(c: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = web_merc_to_lat_lng(c.x, c.y);
        Ok(Coord { x, y })
    }

    match (source, target) {
        (s, t) if s == t => Ok(identity),
        (Crs::WGS84, Crs::WEB_MERCATOR) => Ok(to_web_merc),
        (Crs::WEB_MERCATOR, Crs::WGS84) => Ok(to_lat_lng),
        _ => Err(PrepError::InvalidReferenceFrame(format!(
            "no transformation from {source} to {target}"
        ))),
    }
}

fn segment_tree(layer: &Layer) -> SegmentTree {
    let items = layer
        .features()
        .iter()
        .enumerate()
        .flat_map(|(index, feature)| {
            feature.geometry.0.iter().flat_map(move |line| {
                line.lines().map(move |segment| {
                    GeomWithData::new(
                        TreeLine::new(
                            [segment.start.x, segment.start.y],
                            [segment.end.x, segment.end.y],
                        ),
                        index,
                    )
                })
            })
        })
        .collect();
    RTree::bulk_load(items)
}

/// Distances along `line` at which it meets any segment in `tree` other than
/// those belonging to feature `skip`.
fn crossing_distances(line: &LineString<f64>, tree: &SegmentTree, skip: Option<usize>) -> Vec<f64> {
    let mut cuts = Vec::new();
    let mut offset = 0.0;

    for segment in line.lines() {
        let envelope = AABB::from_corners(
            [segment.start.x.min(segment.end.x), segment.start.y.min(segment.end.y)],
            [segment.start.x.max(segment.end.x), segment.start.y.max(segment.end.y)],
        );
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            if Some(candidate.data) == skip {
                continue;
            }
            let blade = candidate.geom();
            let blade = Line::new(
                Coord { x: blade.from[0], y: blade.from[1] },
                Coord { x: blade.to[0], y: blade.to[1] },
            );
            match line_intersection(segment, blade) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    cuts.push(offset + segment_length(segment.start, intersection));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    cuts.push(offset + segment_length(segment.start, intersection.start));
                    cuts.push(offset + segment_length(segment.start, intersection.end));
                }
                None => {}
            }
        }
        offset += segment_length(segment.start, segment.end);
    }
    cuts
}

impl GeometryEngine for PlanarEngine {
    fn reproject(&self, layer: &Layer, target: Crs) -> Result<Layer> {
        let convert = transform(layer.crs(), target)?;
        let features = layer
            .features()
            .iter()
            .map(|feature| {
                let geometry = map_coords(&feature.geometry, convert)?;
                Ok(Layer::feature_like(feature, geometry))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Reprojected {} features from {} to {}",
            features.len(),
            layer.crs(),
            target
        );
        Ok(layer.derive_as(target, layer.schema().clone(), features))
    }

    fn split_by_length(&self, layer: &Layer, max_length: f64) -> Result<Layer> {
        if !max_length.is_finite() || max_length <= 0.0 {
            return Err(PrepError::InvalidParameter(format!(
                "maximum segment length must be positive, got {max_length}"
            )));
        }
        let mut features = Vec::with_capacity(layer.feature_count());
        for feature in layer.features() {
            for line in &feature.geometry.0 {
                for piece in split_by_max_length(line, max_length) {
                    features.push(Layer::feature_like(feature, MultiLineString::new(vec![piece])));
                }
            }
        }
        Ok(layer.derive(features))
    }

    fn split_against(&self, layer: &Layer, blades: &Layer) -> Result<Layer> {
        let tree = segment_tree(blades);
        let same_layer = layer.id() == blades.id();

        let features = layer
            .features()
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let skip = same_layer.then_some(index);
                let parts = feature
                    .geometry
                    .0
                    .iter()
                    .flat_map(|line| {
                        let total = polyline_length_metric(line);
                        let cuts = normalize_cuts(crossing_distances(line, &tree, skip), total);
                        cut_at_distances(line, &cuts)
                    })
                    .collect();
                Layer::feature_like(feature, MultiLineString::new(parts))
            })
            .collect();
        Ok(layer.derive(features))
    }

    fn explode_multipart(&self, layer: &Layer) -> Result<Layer> {
        let features = layer
            .features()
            .iter()
            .flat_map(|feature| {
                feature
                    .geometry
                    .0
                    .iter()
                    .map(move |part| Layer::feature_like(feature, MultiLineString::new(vec![part.clone()])))
            })
            .collect();
        Ok(layer.derive(features))
    }

    fn make_grid(&self, extent: Rect<f64>, columns: usize, rows: usize, crs: Crs) -> Result<Grid> {
        if columns == 0 || rows == 0 {
            return Err(PrepError::InvalidParameter(format!(
                "grid needs at least one column and one row, got {columns}x{rows}"
            )));
        }
        Ok(Grid {
            crs,
            cells: grid::rectangle_cells(extent, columns, rows),
        })
    }

    fn spatial_join(&self, layer: &Layer, grid: &Grid, join_field: &str) -> Result<Layer> {
        if grid.crs != layer.crs() {
            return Err(PrepError::InvalidReferenceFrame(format!(
                "grid is in {} but layer is in {}",
                grid.crs,
                layer.crs()
            )));
        }
        let joined = layer.derive(layer.features().to_vec());
        let mut edit = joined.start_editing();
        edit.add_field(FieldDef::new(join_field, FieldKind::Integer))?;
        edit.assign(join_field, |_, feature| {
            grid::best_cell(&feature.geometry, &grid.cells)
                .map(|cell| AttrValue::Integer(cell.id))
                .unwrap_or(AttrValue::Null)
        })?;
        edit.commit(joined)
    }

    fn measure_length(&self, geometry: &MultiLineString<f64>, crs: Crs) -> f64 {
        if crs.is_geographic() {
            geometry.0.iter().map(polyline_length_haversine).sum()
        } else {
            geometry.0.iter().map(polyline_length_metric).sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Schema;
    use crate::layer::tests::line;
    use geo_types::coord;

    fn layer_of(lines: &[&[(f64, f64)]]) -> Layer {
        let schema = Schema::new(vec![FieldDef::new("name", FieldKind::Text)]).unwrap();
        let mut layer = Layer::new("roads", Crs::WEB_MERCATOR, schema);
        for (i, points) in lines.iter().enumerate() {
            layer
                .add_feature(line(points), vec![format!("road {i}").into()])
                .unwrap();
        }
        layer
    }

    #[test]
    fn test_reproject_roundtrip() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[&[(0.0, 0.0), (1000.0, 2000.0)]]);
        let geographic = engine.reproject(&layer, Crs::WGS84).unwrap();
        assert_eq!(geographic.crs(), Crs::WGS84);
        assert_ne!(geographic.id(), layer.id());

        let back = engine.reproject(&geographic, Crs::WEB_MERCATOR).unwrap();
        let end = back.features()[0].geometry.0[0].0[1];
        assert!((end.x - 1000.0).abs() < 1e-6);
        assert!((end.y - 2000.0).abs() < 1e-6);
        assert_eq!(back.values("name").unwrap()[0], &AttrValue::Text("road 0".into()));
    }

    #[test]
    fn test_reproject_unknown_frame() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[&[(0.0, 0.0), (1.0, 1.0)]]);
        let err = engine.reproject(&layer, Crs::from_epsg(2958)).unwrap_err();
        assert!(matches!(err, PrepError::InvalidReferenceFrame(_)));
    }

    #[test]
    fn test_split_by_length_copies_attributes() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[&[(0.0, 0.0), (500.0, 0.0)], &[(0.0, 10.0), (100.0, 10.0)]]);
        let split = engine.split_by_length(&layer, 300.0).unwrap();
        assert_eq!(split.feature_count(), 3);
        let names: Vec<_> = split.values("name").unwrap().into_iter().map(|v| v.label()).collect();
        assert_eq!(names, vec!["road 0", "road 0", "road 1"]);
        assert!(engine.split_by_length(&layer, 0.0).is_err());
    }

    #[test]
    fn test_split_against_crossing_lines() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[
            &[(0.0, 50.0), (100.0, 50.0)],
            &[(50.0, 0.0), (50.0, 100.0)],
            &[(200.0, 0.0), (300.0, 0.0)],
        ]);
        let split = engine.split_against(&layer, &layer).unwrap();
        assert_eq!(split.feature_count(), 3);
        assert_eq!(split.features()[0].geometry.0.len(), 2);
        assert_eq!(split.features()[1].geometry.0.len(), 2);
        assert_eq!(split.features()[2].geometry.0.len(), 1);
        assert_eq!(split.features()[0].geometry.0[0].0[1], coord! { x: 50.0, y: 50.0 });

        let exploded = engine.explode_multipart(&split).unwrap();
        assert_eq!(exploded.feature_count(), 5);
        assert!(exploded.features().iter().all(|f| f.geometry.0.len() == 1));
    }

    #[test]
    fn test_split_against_ignores_shared_endpoints() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[&[(0.0, 0.0), (100.0, 0.0)], &[(100.0, 0.0), (200.0, 0.0)]]);
        let split = engine.split_against(&layer, &layer).unwrap();
        assert!(split.features().iter().all(|f| f.geometry.0.len() == 1));
    }

    #[test]
    fn test_spatial_join_adds_cell_ids() {
        let engine = PlanarEngine::new();
        let layer = layer_of(&[&[(0.0, 0.0), (100.0, 0.0)], &[(300.0, 250.0), (500.0, 300.0)]]);
        let extent = layer.extent().unwrap();
        let grid = engine.make_grid(extent, 2, 2, layer.crs()).unwrap();
        let joined = engine.spatial_join(&layer, &grid, "cell_id").unwrap();
        let ids = joined.values("cell_id").unwrap();
        assert_eq!(ids, vec![&AttrValue::Integer(2), &AttrValue::Integer(3)]);
        assert!(engine.make_grid(extent, 0, 2, layer.crs()).is_err());
    }

    #[test]
    fn test_measure_length_units() {
        let engine = PlanarEngine::new();
        let geometry = line(&[(0.0, 0.0), (3.0, 4.0)]);
        assert_eq!(engine.measure_length(&geometry, Crs::WEB_MERCATOR), 5.0);
        // Degrees are measured as metres on the sphere.
        assert!(engine.measure_length(&geometry, Crs::WGS84) > 500_000.0);
    }
}
