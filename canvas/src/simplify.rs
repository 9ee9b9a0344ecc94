//! Ramer-Douglas-Peucker path simplification for completed freehand strokes.
//!
//! Operates on the flat `[x0, y0, x1, y1, ...]` coordinate lists stored on
//! polyline shapes. Runs once per completed stroke, never per point.

#[cfg(test)]
#[path = "simplify_test.rs"]
mod simplify_test;

use crate::consts::MIN_VALUES_FOR_SIMPLIFICATION;

/// Reduce a polyline's point count while preserving its visual shape.
///
/// Keeps every point whose perpendicular distance from the chord of its span
/// exceeds `tolerance`; the first and last points always survive. Inputs with
/// fewer than 2 points are returned unchanged.
#[must_use]
pub fn simplify(points: &[f64], tolerance: f64) -> Vec<f64> {
    if points.len() < MIN_VALUES_FOR_SIMPLIFICATION {
        return points.to_vec();
    }

    let sq_tolerance = tolerance * tolerance;
    let last = points.len() / 2 - 1;

    let mut simplified = vec![points[0], points[1]];
    douglas_peucker(points, 0, last, sq_tolerance, &mut simplified);
    simplified.push(points[last * 2]);
    simplified.push(points[last * 2 + 1]);
    simplified
}

/// Recursively keep the farthest interior point of each span that exceeds the
/// tolerance, emitting kept points in path order.
fn douglas_peucker(points: &[f64], first: usize, last: usize, sq_tolerance: f64, out: &mut Vec<f64>) {
    let x1 = points[first * 2];
    let y1 = points[first * 2 + 1];
    let x2 = points[last * 2];
    let y2 = points[last * 2 + 1];

    let mut max_sq_dist = sq_tolerance;
    let mut index = 0;
    for i in first + 1..last {
        let sq_dist = sq_segment_distance(points[i * 2], points[i * 2 + 1], x1, y1, x2, y2);
        if sq_dist > max_sq_dist {
            index = i;
            max_sq_dist = sq_dist;
        }
    }

    if max_sq_dist > sq_tolerance {
        if index - first > 1 {
            douglas_peucker(points, first, index, sq_tolerance, out);
        }
        out.push(points[index * 2]);
        out.push(points[index * 2 + 1]);
        if last - index > 1 {
            douglas_peucker(points, index, last, sq_tolerance, out);
        }
    }
}

/// Squared distance from `(px, py)` to the segment `(x1, y1)-(x2, y2)`.
fn sq_segment_distance(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let mut x = x1;
    let mut y = y1;
    let mut dx = x2 - x1;
    let mut dy = y2 - y1;

    if dx != 0.0 || dy != 0.0 {
        let t = ((px - x1) * dx + (py - y1) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = x2;
            y = y2;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    dx = px - x;
    dy = py - y;
    dx * dx + dy * dy
}
