//! Axis-aligned bounds and marquee selection.
//!
//! DESIGN
//! ======
//! Bounds are exact for rectangles, ellipses, and polylines. Text bounds use
//! the wrap heuristic from the renderer (characters-per-line estimated from
//! the font size), not real glyph metrics; selection around text is therefore
//! approximate by contract.
//!
//! The overlap test is closed on every edge: a shape exactly touching the
//! marquee boundary counts as selected.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use crate::consts::{DEFAULT_TEXT_WIDTH, TEXT_CHAR_WIDTH_RATIO, TEXT_LINE_HEIGHT};
use crate::shape::{Shape, ShapeId, ShapeKind};

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Aabb {
    /// Build a box from two arbitrary corners (any orientation).
    #[must_use]
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Closed-interval overlap test on all four edges.
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min_x <= other.max_x && self.max_x >= other.min_x && self.min_y <= other.max_y && self.max_y >= other.min_y
    }
}

/// Compute the axis-aligned bounding box of a shape.
#[must_use]
pub fn bounds(shape: &Shape) -> Aabb {
    match shape.kind {
        ShapeKind::Rectangle => Aabb {
            min_x: shape.x,
            min_y: shape.y,
            max_x: shape.x + shape.width.unwrap_or(0.0),
            max_y: shape.y + shape.height.unwrap_or(0.0),
        },
        ShapeKind::Ellipse => {
            let r = shape.radius.unwrap_or(0.0);
            Aabb {
                min_x: shape.x - r,
                min_y: shape.y - r,
                max_x: shape.x + r,
                max_y: shape.y + r,
            }
        }
        ShapeKind::Polyline => polyline_bounds(shape),
        ShapeKind::Text => text_bounds(shape),
    }
}

fn polyline_bounds(shape: &Shape) -> Aabb {
    let points = shape.points.as_deref().unwrap_or(&[]);
    if points.len() < 2 {
        return Aabb {
            min_x: shape.x,
            min_y: shape.y,
            max_x: shape.x,
            max_y: shape.y,
        };
    }

    let mut aabb = Aabb {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    for pair in points.chunks_exact(2) {
        let px = shape.x + pair[0];
        let py = shape.y + pair[1];
        aabb.min_x = aabb.min_x.min(px);
        aabb.min_y = aabb.min_y.min(py);
        aabb.max_x = aabb.max_x.max(px);
        aabb.max_y = aabb.max_y.max(py);
    }
    aabb
}

/// Estimated bounds for wrapped text: characters-per-line from the average
/// glyph width, line count from the text length, standard line height.
fn text_bounds(shape: &Shape) -> Aabb {
    let font_size = shape.font_size.unwrap_or(crate::consts::DEFAULT_FONT_SIZE);
    let width = shape.width.unwrap_or(DEFAULT_TEXT_WIDTH);
    let text = shape.text.as_deref().unwrap_or("");

    let chars_per_line = (width / (font_size * TEXT_CHAR_WIDTH_RATIO)).floor().max(1.0);
    #[allow(clippy::cast_precision_loss)]
    let lines = if text.is_empty() {
        1.0
    } else {
        (text.chars().count() as f64 / chars_per_line).ceil().max(1.0)
    };
    let height = lines * font_size * TEXT_LINE_HEIGHT;

    Aabb {
        min_x: shape.x,
        min_y: shape.y,
        max_x: shape.x + width,
        max_y: shape.y + height,
    }
}

/// Return the ids of every shape whose bounding box overlaps `region`.
#[must_use]
pub fn marquee_select<'a>(region: &Aabb, shapes: impl IntoIterator<Item = &'a Shape>) -> Vec<ShapeId> {
    shapes
        .into_iter()
        .filter(|shape| bounds(shape).overlaps(region))
        .map(|shape| shape.id.clone())
        .collect()
}
