//! Shared numeric constants for the canvas crate.

// ── Shape defaults ──────────────────────────────────────────────

/// Default side length for a newly created rectangle, in world units.
pub const DEFAULT_RECT_SIZE: f64 = 100.0;

/// Default radius for a newly created ellipse.
pub const DEFAULT_RADIUS: f64 = 50.0;

/// Default font size for a newly created text object.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Default wrap width for a text object without an explicit width.
pub const DEFAULT_TEXT_WIDTH: f64 = 200.0;

/// Smallest width/height/radius a resize may produce.
pub const MIN_SHAPE_SIZE: f64 = 5.0;

/// Smallest wrap width a text resize may produce.
pub const MIN_TEXT_WIDTH: f64 = 50.0;

// ── Text measurement heuristic ──────────────────────────────────

/// Approximate glyph width as a fraction of the font size.
pub const TEXT_CHAR_WIDTH_RATIO: f64 = 0.6;

/// Line height as a multiple of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.2;

// ── Freehand strokes ────────────────────────────────────────────

/// Default Ramer-Douglas-Peucker tolerance for completed strokes.
pub const SIMPLIFY_TOLERANCE: f64 = 2.0;

/// Flat coordinate lists shorter than this (fewer than 2 points) are
/// returned from simplification unchanged.
pub const MIN_VALUES_FOR_SIMPLIFICATION: usize = 4;

// ── Interaction ─────────────────────────────────────────────────

/// Distance moved by one arrow-key nudge, in world units.
pub const ARROW_NUDGE: f64 = 10.0;

// ── Presence ────────────────────────────────────────────────────

/// Cursor colors assigned to remote peers, keyed by session id hash.
pub const USER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
];
