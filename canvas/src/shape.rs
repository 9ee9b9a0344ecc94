//! Shape records: the drawable objects stored in a replicated document.
//!
//! DESIGN
//! ======
//! A `Shape` is one flat struct for all kinds, with kind-specific geometry in
//! optional fields (the record travels as JSON, and a closed enum per kind
//! would force every writer to agree on every field). `validate` is the
//! gatekeeper: the reconciler never merges a record that fails it, so every
//! record present in a document has a valid geometry for its kind.
//!
//! Scale is transient. A resize applies the accumulated scale to the real
//! dimensions and writes the record back with `scale_x == scale_y == 1.0`;
//! a non-unit scale never persists past the write that resolved it.

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_FONT_SIZE, DEFAULT_RADIUS, DEFAULT_RECT_SIZE};

/// Unique identifier for a shape within one document.
pub type ShapeId = String;

/// The kind of a drawable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle positioned at its top-left corner.
    Rectangle,
    /// Circle/ellipse positioned at its center.
    Ellipse,
    /// Freehand polyline; `points` are offsets from the shape position.
    Polyline,
    /// Wrapped text block positioned at its top-left corner.
    Text,
}

/// Validation failure for a shape record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("shape id must not be empty")]
    EmptyId,
    #[error("shape position must be finite")]
    NonFinitePosition,
    #[error("rectangle requires finite width and height > 0")]
    BadRectangle,
    #[error("ellipse requires a finite radius > 0")]
    BadEllipse,
    #[error("polyline requires an even-length, non-empty, finite point list")]
    BadPolyline,
    #[error("text requires non-empty text and a font size > 0")]
    BadText,
}

/// One drawable object as stored in the document and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    /// World-space x of the shape's anchor point.
    pub x: f64,
    /// World-space y of the shape's anchor point.
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Flat `[x0, y0, x1, y1, ...]` offsets for polylines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Fill/stroke color as a CSS color string.
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Clockwise rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Applied horizontal scale. Always written back as 1.0 after a resize.
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    /// Applied vertical scale. Always written back as 1.0 after a resize.
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl Shape {
    fn base(id: impl Into<ShapeId>, kind: ShapeKind, x: f64, y: f64, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            width: None,
            height: None,
            radius: None,
            points: None,
            text: None,
            font_size: None,
            color: color.into(),
            stroke_width: None,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// A default-sized rectangle at `(x, y)`.
    #[must_use]
    pub fn rectangle(id: impl Into<ShapeId>, x: f64, y: f64, color: impl Into<String>) -> Self {
        let mut shape = Self::base(id, ShapeKind::Rectangle, x, y, color);
        shape.width = Some(DEFAULT_RECT_SIZE);
        shape.height = Some(DEFAULT_RECT_SIZE);
        shape
    }

    /// A default-radius ellipse centered at `(x, y)`.
    #[must_use]
    pub fn ellipse(id: impl Into<ShapeId>, x: f64, y: f64, color: impl Into<String>) -> Self {
        let mut shape = Self::base(id, ShapeKind::Ellipse, x, y, color);
        shape.radius = Some(DEFAULT_RADIUS);
        shape
    }

    /// A polyline anchored at the origin, starting with a single point.
    #[must_use]
    pub fn polyline(id: impl Into<ShapeId>, x: f64, y: f64, color: impl Into<String>) -> Self {
        let mut shape = Self::base(id, ShapeKind::Polyline, 0.0, 0.0, color);
        shape.points = Some(vec![x, y]);
        shape
    }

    /// A text block at `(x, y)` with the default font size.
    #[must_use]
    pub fn text(id: impl Into<ShapeId>, x: f64, y: f64, text: impl Into<String>, color: impl Into<String>) -> Self {
        let mut shape = Self::base(id, ShapeKind::Text, x, y, color);
        shape.text = Some(text.into());
        shape.font_size = Some(DEFAULT_FONT_SIZE);
        shape
    }

    /// Check that this record is well-formed for its kind.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint. Records that fail validation
    /// must never be written into a replicated document.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.id.is_empty() {
            return Err(ShapeError::EmptyId);
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(ShapeError::NonFinitePosition);
        }
        match self.kind {
            ShapeKind::Rectangle => {
                let ok = matches!((self.width, self.height), (Some(w), Some(h)) if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0);
                if !ok {
                    return Err(ShapeError::BadRectangle);
                }
            }
            ShapeKind::Ellipse => {
                let ok = matches!(self.radius, Some(r) if r.is_finite() && r > 0.0);
                if !ok {
                    return Err(ShapeError::BadEllipse);
                }
            }
            ShapeKind::Polyline => {
                let ok = self
                    .points
                    .as_ref()
                    .is_some_and(|p| !p.is_empty() && p.len() % 2 == 0 && p.iter().all(|v| v.is_finite()));
                if !ok {
                    return Err(ShapeError::BadPolyline);
                }
            }
            ShapeKind::Text => {
                let text_ok = self.text.as_ref().is_some_and(|t| !t.is_empty());
                let font_ok = matches!(self.font_size, Some(f) if f.is_finite() && f > 0.0);
                if !text_ok || !font_ok {
                    return Err(ShapeError::BadText);
                }
            }
        }
        Ok(())
    }
}
