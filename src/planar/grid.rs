use crate::engine::GridCell;
use geo_types::{Coord, MultiLineString, Rect, coord};

use super::polyline::segment_length;

/// Rectangular cells over `extent`, numbered from 1 column by column starting
/// at the top-left cell.
pub fn rectangle_cells(extent: Rect<f64>, columns: usize, rows: usize) -> Vec<GridCell> {
    let width = extent.width() / columns as f64;
    let height = extent.height() / rows as f64;
    let (min, max) = (extent.min(), extent.max());

    let mut cells = Vec::with_capacity(columns * rows);
    for column in 0..columns {
        for row in 0..rows {
            let x0 = min.x + column as f64 * width;
            let y1 = max.y - row as f64 * height;
            // Last column and row end exactly on the extent edge.
            let x1 = if column + 1 == columns { max.x } else { x0 + width };
            let y0 = if row + 1 == rows { min.y } else { y1 - height };
            cells.push(GridCell {
                id: (column * rows + row + 1) as i64,
                bounds: Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }),
            });
        }
    }
    cells
}

/// Liang-Barsky clip of segment `a`-`b` against `rect`, boundary inclusive.
pub fn clip_segment(a: Coord<f64>, b: Coord<f64>, rect: &Rect<f64>) -> Option<(Coord<f64>, Coord<f64>)> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (min, max) = (rect.min(), rect.max());
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;

    for (p, q) in [
        (-dx, a.x - min.x),
        (dx, max.x - a.x),
        (-dy, a.y - min.y),
        (dy, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| coord! { x: a.x + dx * t, y: a.y + dy * t };
    Some((at(t0), at(t1)))
}

/// Length of `geometry` inside `rect`, or `None` when the two do not touch.
pub fn overlap_length(geometry: &MultiLineString<f64>, rect: &Rect<f64>) -> Option<f64> {
    let mut touched = false;
    let mut total = 0.0;
    for line in &geometry.0 {
        if line.0.len() == 1 {
            let c = line.0[0];
            touched |= c.x >= rect.min().x
                && c.x <= rect.max().x
                && c.y >= rect.min().y
                && c.y <= rect.max().y;
            continue;
        }
        for segment in line.lines() {
            if let Some((start, end)) = clip_segment(segment.start, segment.end, rect) {
                touched = true;
                total += segment_length(start, end);
            }
        }
    }
    touched.then_some(total)
}

/// The cell `geometry` overlaps most. Ties go to the lower id; a geometry
/// that only touches cell boundaries joins the first cell it touches.
pub fn best_cell<'a>(geometry: &MultiLineString<f64>, cells: &'a [GridCell]) -> Option<&'a GridCell> {
    let mut best: Option<(&GridCell, f64)> = None;
    for cell in cells {
        if let Some(overlap) = overlap_length(geometry, &cell.bounds) {
            let better = match best {
                None => true,
                Some((current, current_overlap)) => {
                    overlap > current_overlap || (overlap == current_overlap && cell.id < current.id)
                }
            };
            if better {
                best = Some((cell, overlap));
            }
        }
    }
    best.map(|(cell, _)| cell)
}
