use geo::{Distance, Euclidean, Haversine};
use geo_types::{Coord, LineString, Point};

/// Cut positions closer than this to each other or to a line end are merged.
pub const CUT_EPSILON: f64 = 1e-9;

pub fn segment_length(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(Point::from(a), Point::from(b))
}

/// Calculate Euclidean length of a polyline in frame units.
pub fn polyline_length_metric(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| segment_length(l.start, l.end)).sum()
}

/// Calculate length of a lon/lat polyline in metres (Haversine).
pub fn polyline_length_haversine(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|l| Haversine.distance(Point::from(l.start), Point::from(l.end)))
        .sum()
}

fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

fn push_distinct(coords: &mut Vec<Coord<f64>>, c: Coord<f64>) {
    if coords.last() != Some(&c) {
        coords.push(c);
    }
}

/// Sorts cut distances, drops the ones at or beyond the line ends and merges near-duplicates.
pub fn normalize_cuts(mut cuts: Vec<f64>, total: f64) -> Vec<f64> {
    cuts.retain(|d| d.is_finite() && *d > CUT_EPSILON && *d < total - CUT_EPSILON);
    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup_by(|a, b| (*a - *b).abs() <= CUT_EPSILON);
    cuts
}

/// Splits a polyline at the given distances along it. `cuts` must be sorted.
pub fn cut_at_distances(line: &LineString<f64>, cuts: &[f64]) -> Vec<LineString<f64>> {
    let coords = &line.0;
    if coords.len() < 2 || cuts.is_empty() {
        return vec![line.clone()];
    }

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut current = vec![coords[0]];
    let mut pending = cuts.iter().copied().peekable();
    let mut walked = 0.0;

    for window in coords.windows(2) {
        let (a, b) = (window[0], window[1]);
        let seg_len = segment_length(a, b);

        while let Some(&cut) = pending.peek() {
            if cut > walked + seg_len {
                break;
            }
            let t = if seg_len > 0.0 {
                ((cut - walked) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let at = lerp(a, b, t);
            push_distinct(&mut current, at);
            if current.len() >= 2 {
                pieces.push(LineString::new(std::mem::replace(&mut current, vec![at])));
            }
            pending.next();
        }

        push_distinct(&mut current, b);
        walked += seg_len;
    }

    if current.len() >= 2 {
        pieces.push(LineString::new(current));
    }
    pieces
}

/// Splits a polyline into consecutive pieces of `max_length`; the last piece keeps the remainder.
pub fn split_by_max_length(line: &LineString<f64>, max_length: f64) -> Vec<LineString<f64>> {
    let total = polyline_length_metric(line);
    if total <= max_length {
        return vec![line.clone()];
    }

    let count = (total / max_length).ceil() as usize;
    let cuts = normalize_cuts((1..count).map(|k| k as f64 * max_length).collect(), total);
    cut_at_distances(line, &cuts)
}
